//! Etude prelude: everything a typical application needs in one import.
//!
//! ```rust,ignore
//! use etude_core::prelude::*;
//! ```

// ── Core types ─────────────────────────────────────────────────
pub use crate::Config;
pub use crate::Context;
pub use crate::{EtudeError, EtudeResult};

// ── Router & middleware ────────────────────────────────────────
pub use crate::{from_fn, handler, interceptor, Handler, HandlerResult, Interceptor};
pub use crate::{Group, Router, RouterService};
pub use crate::StaticConfig;
pub use crate::TemplateEngine;

// ── HTTP types ─────────────────────────────────────────────────
pub use crate::http::{HeaderMap, Method, StatusCode};

// ── Logging ────────────────────────────────────────────────────
pub use crate::logging::{init_logging, init_logging_json, init_logging_pretty, init_logging_with_level};

// ── Serde (almost every handler needs these) ───────────────────
pub use serde::{Deserialize, Serialize};
