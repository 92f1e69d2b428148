//! Template engine seam.
//!
//! Etude ships no engine of its own. Register one with
//! [`Router::views`](crate::Router::views) and render from handlers with
//! [`Context::render`](crate::Context::render).

use std::io::Write;

use serde_json::Value;

use crate::error::EtudeResult;

/// A template engine shared by every request.
///
/// `load` is called once at registration. `render` may be called from many
/// tasks at once; engines that reload templates guard their own state.
pub trait TemplateEngine: Send + Sync {
    /// Parse or compile the templates.
    fn load(&self) -> EtudeResult<()>;

    /// Render template `name` with `data` into `out`.
    fn render(&self, out: &mut dyn Write, name: &str, data: &Value) -> EtudeResult<()>;
}
