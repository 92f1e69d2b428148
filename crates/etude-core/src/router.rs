//! Router builder and the frozen request service.
//!
//! ```text
//! Router (mutable, setup time)
//!   handle / get / post / group / static_files / use_middleware
//!        │
//!        ▼ build()
//! RouterService (Arc, shared by every connection)
//!   body cap → Context → composed chain → matcher → handler
//! ```
//!
//! `build` consumes the router, so nothing can be registered once requests
//! are being served.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::service::Service;
use hyper::Request;

use crate::config::Config;
use crate::context::Context;
use crate::error::{EtudeError, EtudeResult};
use crate::handler::{handler, BoxFuture, Handler, HandlerResult};
use crate::http::{self, header, HeaderValue, Method, Response, STANDARD_METHODS};
use crate::middleware::{from_fn, Chain, Interceptor};
use crate::route::RouteKind;
use crate::static_files::{static_handler, StaticConfig};
use crate::table::RouteTable;
use crate::template::TemplateEngine;

/// Registers one method per verb, each taking a handler closure.
macro_rules! verb_methods {
    ($($(#[$doc:meta])* $name:ident => $method:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name<F>(&mut self, pattern: &str, f: F) -> &mut Self
            where
                F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
            {
                self.handle(Method::$method, pattern, handler(f))
            }
        )*

        /// Register a handler under every standard verb.
        pub fn all<F>(&mut self, pattern: &str, f: F) -> &mut Self
        where
            F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
        {
            let h = handler(f);
            for method in STANDARD_METHODS {
                self.handle(method, pattern, h.clone());
            }
            self
        }
    };
}

/// Route and middleware registration.
///
/// ```rust,ignore
/// let mut router = Router::new(Config::default());
/// router.get("/api/users/:id", |ctx| Box::pin(async move {
///     let id = ctx.param("id").to_string();
///     ctx.send_string(format!("User ID: {}", id))
/// }));
/// router.listen("127.0.0.1:3000").await?;
/// ```
pub struct Router {
    table: RouteTable,
    chain: Chain,
    config: Arc<Config>,
    views: Option<Arc<dyn TemplateEngine>>,
}

impl Default for Router {
    fn default() -> Self {
        Router::new(Config::default())
    }
}

impl Router {
    pub fn new(config: Config) -> Self {
        Router {
            table: RouteTable::new((&config).into()),
            chain: Chain::new(),
            config: Arc::new(config),
            views: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a prebuilt handler. Registering the same method and pattern
    /// again replaces the handler.
    pub fn handle(&mut self, method: Method, pattern: &str, handler: Handler) -> &mut Self {
        self.table.register(method, pattern, handler);
        self
    }

    verb_methods! {
        get => GET,
        head => HEAD,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        connect => CONNECT,
        options => OPTIONS,
        trace => TRACE,
    }

    /// Append an interceptor. The first one registered runs outermost.
    pub fn use_middleware(&mut self, interceptor: Interceptor) -> &mut Self {
        self.chain.push(interceptor);
        self
    }

    /// Append a `(ctx, next)` middleware function.
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, Handler) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.use_middleware(from_fn(f))
    }

    /// Routes registered through the group are prefixed with `prefix`.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            router: self,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Serve files under `root` at `prefix/*` for `GET`.
    pub fn static_files(&mut self, prefix: &str, root: impl Into<PathBuf>, config: StaticConfig) -> &mut Self {
        let prefix = prefix.trim_end_matches('/');
        let pattern = if prefix.starts_with('/') {
            format!("{}/*", prefix)
        } else {
            format!("/{}/*", prefix)
        };
        self.handle(Method::GET, &pattern, static_handler(root.into(), config))
    }

    /// Register a template engine. The engine loads its templates here, so a
    /// broken template fails at startup rather than on first render.
    pub fn views(&mut self, engine: impl TemplateEngine + 'static) -> EtudeResult<&mut Self> {
        engine.load()?;
        self.views = Some(Arc::new(engine));
        Ok(self)
    }

    /// Every registration as (method, normalized pattern, kind).
    pub fn routes(&self) -> Vec<(Method, String, RouteKind)> {
        self.table.routes()
    }

    /// Freeze the router: compose the middleware chain around the matcher
    /// once and share the result.
    pub fn build(self) -> RouterService {
        if self.config.print_routes {
            for (method, pattern, kind) in self.table.routes() {
                tracing::info!(%method, %pattern, %kind, "route registered");
            }
        }

        let server_header = self.config.server_header.as_deref().and_then(|value| {
            HeaderValue::from_str(value)
                .map_err(|_| tracing::warn!(value, "ignoring invalid server header"))
                .ok()
        });

        let table = Arc::new(self.table);
        let pipeline = self.chain.compose(matcher(table.clone()));

        RouterService {
            inner: Arc::new(Inner {
                table,
                pipeline,
                config: self.config,
                views: self.views,
                server_header,
            }),
        }
    }

    /// Build the router and serve it on `addr` until Ctrl+C.
    pub async fn listen(self, addr: impl tokio::net::ToSocketAddrs) -> EtudeResult<()> {
        let service = self.build();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        crate::server::serve(listener, service, crate::server::shutdown_signal()).await
    }
}

/// Registration scope sharing a path prefix. Groups nest.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
}

impl Group<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn handle(&mut self, method: Method, pattern: &str, handler: Handler) -> &mut Self {
        let full = join(&self.prefix, pattern);
        self.router.handle(method, &full, handler);
        self
    }

    verb_methods! {
        get => GET,
        head => HEAD,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        connect => CONNECT,
        options => OPTIONS,
        trace => TRACE,
    }

    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: join(&self.prefix, prefix).trim_end_matches('/').to_string(),
            router: &mut *self.router,
        }
    }
}

fn join(prefix: &str, pattern: &str) -> String {
    if pattern.starts_with('/') {
        format!("{}{}", prefix, pattern)
    } else {
        format!("{}/{}", prefix, pattern)
    }
}

// Innermost handler of the chain: route lookup, then the route's handler.
fn matcher(table: Arc<RouteTable>) -> Handler {
    handler(move |ctx| {
        let table = table.clone();
        Box::pin(async move {
            let Some(found) = table.find(ctx.method(), ctx.path()) else {
                ctx.response_headers_mut()
                    .insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
                return ctx.status(404).send_string("Not Found");
            };
            ctx.set_route(found.params, found.residual);
            (found.handler)(ctx).await
        })
    })
}

struct Inner {
    table: Arc<RouteTable>,
    pipeline: Handler,
    config: Arc<Config>,
    views: Option<Arc<dyn TemplateEngine>>,
    server_header: Option<HeaderValue>,
}

/// The frozen router. Cheap to clone; every clone shares the same table
/// and chain.
#[derive(Clone)]
pub struct RouterService {
    inner: Arc<Inner>,
}

impl RouterService {
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn routes(&self) -> Vec<(Method, String, RouteKind)> {
        self.inner.table.routes()
    }

    /// Run one request through the body cap, the middleware chain and the
    /// matcher. Always produces a response.
    pub async fn dispatch<B>(&self, req: Request<B>) -> Response
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let limit = self.inner.config.max_request_body_size;

        if limit > 0 && declared_length(&parts.headers).is_some_and(|len| len > limit as u64) {
            tracing::warn!(method = %parts.method, path = parts.uri.path(), limit, "request body over limit");
            return self.stamp(http::payload_too_large());
        }

        let collected = if limit > 0 {
            Limited::new(body, limit).collect().await
        } else {
            body.collect().await.map_err(Into::into)
        };
        let body = match collected {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                tracing::warn!(method = %parts.method, path = parts.uri.path(), limit, "request body over limit");
                return self.stamp(http::payload_too_large());
            }
            Err(e) => {
                tracing::debug!(error = %e, "failed to read request body");
                return self.stamp(http::bad_request());
            }
        };

        self.run(Context::new(parts, body, self.inner.config.clone()), started)
            .await
    }

    async fn run(&self, ctx: Context, started: Instant) -> Response {
        let mut ctx = ctx.with_views(self.inner.views.clone());
        if let Some(server) = &self.inner.server_header {
            ctx.response_headers_mut().insert(header::SERVER, server.clone());
        }

        let method = ctx.method().clone();
        let path = ctx.path().to_string();

        let response = match (self.inner.pipeline)(&mut ctx).await {
            Ok(()) => ctx.into_response(),
            Err(err) if ctx.written() => {
                tracing::error!(%method, %path, error = %err, "handler failed after writing response");
                ctx.into_response()
            }
            Err(err) => {
                tracing::error!(%method, %path, error = %err, "handler failed");
                self.stamp(http::internal_error(err.to_string()))
            }
        };

        tracing::debug!(
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed = ?started.elapsed(),
            "request"
        );
        response
    }

    fn stamp(&self, mut res: Response) -> Response {
        if let Some(server) = &self.inner.server_header {
            res.headers_mut().insert(header::SERVER, server.clone());
        }
        res
    }
}

fn declared_length(headers: &http::HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl Service<Request<Incoming>> for RouterService {
    type Response = Response;
    type Error = EtudeError;
    type Future = BoxFuture<'static, Result<Response, EtudeError>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let Some(limit) = service.inner.config.write_timeout else {
                return Ok(service.dispatch(req).await);
            };
            let path = req.uri().path().to_string();
            tokio::time::timeout(limit, service.dispatch(req)).await.map_err(|_| {
                tracing::warn!(%path, ?limit, "response timed out, closing connection");
                EtudeError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "response timed out"))
            })
        })
    }
}

impl std::fmt::Debug for RouterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterService")
            .field("routes", &self.inner.table.routes().len())
            .field("config", &self.inner.config)
            .finish()
    }
}
