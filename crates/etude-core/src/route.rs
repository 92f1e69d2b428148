//! Route records and path normalization.
//!
//! Normalization runs on the registration pattern and on every request
//! path with the same [`PathOptions`], otherwise lookups silently miss.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::config::Config;
use crate::handler::Handler;
use crate::http::Method;

/// How a pattern is stored and matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Literal path, exact match.
    Static,
    /// One or more `:name` segments, stored in the trie.
    Dynamic,
    /// Trailing `*`, matches every path under a prefix.
    File,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Static => write!(f, "static"),
            RouteKind::Dynamic => write!(f, "dynamic"),
            RouteKind::File => write!(f, "file"),
        }
    }
}

/// A registered static or file route.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub kind: RouteKind,
    pub handler: Handler,
    prefix: String,
}

impl Route {
    pub fn new(method: Method, pattern: String, kind: RouteKind, handler: Handler) -> Self {
        let prefix = match kind {
            RouteKind::File => file_prefix(&pattern).to_string(),
            _ => pattern.clone(),
        };
        Route {
            method,
            pattern,
            kind,
            handler,
            prefix,
        }
    }

    /// The literal part compared against request paths: the full pattern for
    /// static routes, the pattern minus its trailing wildcard for file routes.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The configuration flags that take part in path normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOptions {
    pub case_sensitive: bool,
    pub strict_routing: bool,
    pub unescape_path: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        PathOptions::from(&Config::default())
    }
}

impl From<&Config> for PathOptions {
    fn from(config: &Config) -> Self {
        PathOptions {
            case_sensitive: config.case_sensitive,
            strict_routing: config.strict_routing,
            unescape_path: config.unescape_path,
        }
    }
}

/// Percent-decode (when enabled) and make sure the path is rooted.
pub fn decode<'a>(path: &'a str, opts: PathOptions) -> Cow<'a, str> {
    let decoded = if opts.unescape_path {
        percent_decode_str(path).decode_utf8_lossy()
    } else {
        Cow::Borrowed(path)
    };
    if decoded.starts_with('/') {
        decoded
    } else {
        Cow::Owned(format!("/{}", decoded))
    }
}

/// Lowercase the path when routing is case-insensitive.
pub fn fold(path: &str, opts: PathOptions) -> Cow<'_, str> {
    if opts.case_sensitive {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(path.to_lowercase())
    }
}

/// Drop trailing slashes unless routing is strict. The root `/` is kept.
pub fn trim(path: &str, opts: PathOptions) -> &str {
    if opts.strict_routing {
        return path;
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Full normalization: decode, fold, trim.
pub fn normalize(path: &str, opts: PathOptions) -> String {
    let decoded = decode(path, opts);
    let folded = fold(&decoded, opts);
    trim(&folded, opts).to_string()
}

/// Normalization for a pattern with `:name` segments. Only literal segments
/// are folded, so parameter names keep the case they were declared with.
pub fn normalize_pattern(pattern: &str, opts: PathOptions) -> String {
    let decoded = decode(pattern, opts);
    let trimmed = trim(&decoded, opts);
    if opts.case_sensitive {
        return trimmed.to_string();
    }
    trimmed
        .split('/')
        .map(|segment| {
            if is_param_segment(segment) {
                Cow::Borrowed(segment)
            } else {
                fold(segment, opts)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Classify a normalized pattern. No syntax validation happens here: a
/// lone `:` or a `*` in the middle of a pattern is literal text.
pub fn classify(pattern: &str) -> RouteKind {
    if pattern.ends_with('*') {
        RouteKind::File
    } else if pattern.split('/').any(is_param_segment) {
        RouteKind::Dynamic
    } else {
        RouteKind::Static
    }
}

pub(crate) fn is_param_segment(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with(':')
}

fn file_prefix(pattern: &str) -> &str {
    pattern.trim_end_matches('*').trim_end_matches('/')
}
