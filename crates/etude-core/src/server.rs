//! HTTP/1.1 accept loop.
//!
//! ```text
//! TcpListener::accept
//!   → TCP_NODELAY
//!     → tokio::spawn per connection
//!       → hyper http1 (keep-alive, header read timeout)
//!         → Tracked (idle bookkeeping)
//!           → RouterService::call
//! ```
//!
//! A client that disconnects mid-request drops its connection task, which
//! drops the in-flight handler future with it.
//!
//! The idle timer only runs while no request is in flight. It restarts
//! whenever a request begins or finishes, and on expiry the connection is
//! shut down gracefully, so a response already being written still goes out.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{EtudeError, EtudeResult};
use crate::handler::BoxFuture;
use crate::http::Response;
use crate::router::RouterService;

/// Request activity on one connection.
struct Activity {
    opened: Instant,
    last_ms: AtomicU64,
    in_flight: AtomicUsize,
}

impl Activity {
    fn new() -> Arc<Self> {
        Arc::new(Activity {
            opened: Instant::now(),
            last_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        })
    }

    fn touch(&self) {
        let ms = self.opened.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(ms, Ordering::AcqRel);
    }

    /// When the connection becomes idle if nothing else happens. `None`
    /// while a request is in flight.
    fn idle_at(&self, limit: Duration) -> Option<Instant> {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return None;
        }
        Some(self.opened + Duration::from_millis(self.last_ms.load(Ordering::Acquire)) + limit)
    }
}

struct InFlight(Arc<Activity>);

impl InFlight {
    fn enter(activity: Arc<Activity>) -> Self {
        activity.in_flight.fetch_add(1, Ordering::AcqRel);
        activity.touch();
        InFlight(activity)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Connection-local wrapper that records activity around each request.
struct Tracked {
    service: RouterService,
    activity: Arc<Activity>,
}

impl Service<Request<Incoming>> for Tracked {
    type Response = Response;
    type Error = EtudeError;
    type Future = BoxFuture<'static, Result<Response, EtudeError>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let guard = InFlight::enter(self.activity.clone());
        let response = self.service.call(req);
        Box::pin(async move {
            let result = response.await;
            drop(guard);
            result
        })
    }
}

fn http1_builder(config: &Config) -> http1::Builder {
    let mut builder = http1::Builder::new();
    builder.keep_alive(true).half_close(false).timer(TokioTimer::new());
    if let Some(read_timeout) = config.read_timeout {
        builder.header_read_timeout(read_timeout);
    }
    builder
}

/// Serve `service` on `listener` until `shutdown` resolves.
///
/// Connections already accepted keep running on their own tasks after the
/// loop stops.
pub async fn serve(
    listener: TcpListener,
    service: RouterService,
    shutdown: impl Future<Output = ()>,
) -> EtudeResult<()> {
    let http_builder = http1_builder(service.config());
    let idle_timeout = service.config().idle_timeout;
    tokio::pin!(shutdown);

    tracing::info!(addr = %listener.local_addr()?, "etude server listening");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutting down etude server");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let _ = stream.set_nodelay(true);
                        let io = TokioIo::new(stream);
                        let svc = service.clone();
                        let builder = http_builder.clone();

                        tokio::spawn(async move {
                            let activity = Activity::new();
                            let conn = builder.serve_connection(io, Tracked {
                                service: svc,
                                activity: activity.clone(),
                            });
                            tokio::pin!(conn);

                            let result = match idle_timeout {
                                None => conn.await,
                                Some(limit) => {
                                    let mut closing = false;
                                    loop {
                                        let wake = activity
                                            .idle_at(limit)
                                            .unwrap_or_else(|| Instant::now() + limit);
                                        tokio::select! {
                                            result = conn.as_mut() => break result,
                                            _ = tokio::time::sleep_until(wake), if !closing => {
                                                if activity.idle_at(limit).is_some_and(|at| at <= Instant::now()) {
                                                    tracing::debug!(%peer, ?limit, "closing idle connection");
                                                    conn.as_mut().graceful_shutdown();
                                                    closing = true;
                                                }
                                            }
                                        }
                                    }
                                }
                            };
                            if let Err(e) = result {
                                if !e.is_incomplete_message() && !e.is_canceled() && !e.is_closed() {
                                    tracing::debug!(%peer, "connection error: {}", e);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("TCP accept error: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
