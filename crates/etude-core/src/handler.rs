use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::EtudeError;

/// Boxed, `Send` future borrowing from the request context.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every handler and middleware resolves to. An `Err` is turned into a
/// `500` by the dispatcher.
pub type HandlerResult = Result<(), EtudeError>;

/// A request handler: borrows the per-request [`Context`] for the duration
/// of its future.
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync>;

/// Wrap a closure or function into a [`Handler`].
///
/// ```rust,ignore
/// let hello = handler(|ctx| Box::pin(async move { ctx.send_string("hello") }));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}
