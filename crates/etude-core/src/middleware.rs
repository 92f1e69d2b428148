//! Interceptor chain.
//!
//! An interceptor turns the next handler into a new handler. The chain is
//! folded from the last registration to the first, so the first registered
//! interceptor sees the request first and the response last:
//!
//! ```text
//! use(A); use(B);
//!
//! A-before → B-before → handler → B-after → A-after
//! ```
//!
//! An interceptor may return without calling `next` to short-circuit the
//! chain, e.g. to answer a preflight request.

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{handler, BoxFuture, Handler, HandlerResult};

/// A function from "next handler" to "handler".
pub type Interceptor = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Build an [`Interceptor`] from a wrapping function.
pub fn interceptor<F>(f: F) -> Interceptor
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build an [`Interceptor`] from a `(ctx, next)` function, the usual way to
/// write middleware:
///
/// ```rust,ignore
/// let timing = from_fn(|ctx, next| Box::pin(async move {
///     let start = std::time::Instant::now();
///     let result = next(ctx).await;
///     tracing::info!(elapsed = ?start.elapsed(), "request finished");
///     result
/// }));
/// ```
pub fn from_fn<F>(f: F) -> Interceptor
where
    F: for<'a> Fn(&'a mut Context, Handler) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |next: Handler| {
        let f = f.clone();
        handler(move |ctx| f(ctx, next.clone()))
    })
}

/// Ordered list of interceptors.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Interceptor>,
}

impl Chain {
    pub fn new() -> Self {
        Chain::default()
    }

    pub fn push(&mut self, interceptor: Interceptor) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap `terminal` with every interceptor, last registered innermost.
    pub fn compose(&self, terminal: Handler) -> Handler {
        self.interceptors
            .iter()
            .rev()
            .fold(terminal, |next, wrap| wrap(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_layer(trace: Trace, n: usize) -> Interceptor {
        from_fn(move |ctx, next| {
            let trace = trace.clone();
            Box::pin(async move {
                trace.lock().unwrap().push(format!("enter-{}", n));
                let result = next(ctx).await;
                trace.lock().unwrap().push(format!("exit-{}", n));
                result
            })
        })
    }

    fn test_context() -> Context {
        let req = hyper::Request::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        Context::new(parts, bytes::Bytes::new(), Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn test_onion_order() {
        let trace: Trace = Arc::default();
        let mut chain = Chain::new();
        for n in 1..=3 {
            chain.push(tracing_layer(trace.clone(), n));
        }

        let inner = trace.clone();
        let terminal = handler(move |ctx| {
            let inner = inner.clone();
            Box::pin(async move {
                inner.lock().unwrap().push("handler".to_string());
                ctx.send_string("ok")
            })
        });

        let mut ctx = test_context();
        chain.compose(terminal)(&mut ctx).await.unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["enter-1", "enter-2", "enter-3", "handler", "exit-3", "exit-2", "exit-1"]
        );
        assert_eq!(ctx.response_body(), b"ok");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner() {
        let reached = Arc::new(Mutex::new(false));
        let mut chain = Chain::new();
        chain.push(from_fn(|ctx, _next| {
            Box::pin(async move { ctx.status(204).send_string("") })
        }));

        let flag = reached.clone();
        let terminal = handler(move |_ctx| {
            let flag = flag.clone();
            Box::pin(async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
        });

        let mut ctx = test_context();
        chain.compose(terminal)(&mut ctx).await.unwrap();
        assert!(!*reached.lock().unwrap());
        assert_eq!(ctx.response_status().as_u16(), 204);
    }

    #[test]
    fn test_empty_chain_returns_terminal() {
        let terminal = handler(|_ctx| Box::pin(async { Ok(()) }));
        let composed = Chain::new().compose(terminal.clone());
        assert!(Arc::ptr_eq(&composed, &terminal));
    }
}
