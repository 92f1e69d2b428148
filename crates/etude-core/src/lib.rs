//! Routing, middleware and request context core of the Etude web framework.
//!
//! ```rust,ignore
//! use etude_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> EtudeResult<()> {
//!     init_logging();
//!
//!     let mut router = Router::new(Config::from_env()?);
//!     router.use_fn(|ctx, next| Box::pin(async move {
//!         ctx.set_header("x-powered-by", "etude")?;
//!         next(ctx).await
//!     }));
//!     router.get("/api/users/:id", |ctx| Box::pin(async move {
//!         let id = ctx.param("id").to_string();
//!         ctx.send_string(format!("User ID: {}", id))
//!     }));
//!     router.listen("127.0.0.1:3000").await
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod prelude;
pub mod route;
pub mod router;
pub mod server;
pub mod static_files;
pub mod table;
pub mod template;
pub mod testing;
pub mod trie;

pub use config::{Config, JsonCodec};
pub use context::Context;
pub use error::{EtudeError, EtudeResult};
pub use handler::{handler, BoxFuture, Handler, HandlerResult};
pub use middleware::{from_fn, interceptor, Chain, Interceptor};
pub use route::RouteKind;
pub use router::{Group, Router, RouterService};
pub use server::serve;
pub use static_files::StaticConfig;
pub use template::TemplateEngine;
pub use testing::{TestClient, TestResponse};
