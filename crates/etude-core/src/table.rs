//! Route table and matcher.
//!
//! Three layers, consulted in this order:
//! ```text
//! file routes    ordered list, prefix match, first wins
//! static routes  ordered list, exact match, first wins
//! dynamic routes one trie per method, literal child before parameter child
//! ```
//! The table is built before serving and only read afterwards; it is
//! shared through an `Arc` without locking.

use std::collections::HashMap;

use crate::handler::Handler;
use crate::http::Method;
use crate::route::{self, PathOptions, Route, RouteKind};
use crate::trie::{Node, Params};

/// Result of a successful lookup.
pub struct RouteMatch {
    pub handler: Handler,
    pub params: Params,
    pub kind: RouteKind,
    /// Path below the mount prefix, without leading `/` (file routes only).
    pub residual: Option<String>,
}

pub struct RouteTable {
    options: PathOptions,
    file_routes: Vec<Route>,
    static_routes: Vec<Route>,
    tries: HashMap<Method, Node>,
}

impl RouteTable {
    pub fn new(options: PathOptions) -> Self {
        RouteTable {
            options,
            file_routes: Vec::new(),
            static_routes: Vec::new(),
            tries: HashMap::new(),
        }
    }

    pub fn options(&self) -> PathOptions {
        self.options
    }

    /// Register a handler. Never fails: patterns are not validated, and
    /// registering the same (method, pattern) again replaces the handler.
    pub fn register(&mut self, method: Method, pattern: &str, handler: Handler) -> RouteKind {
        let normalized = route::normalize(pattern, self.options);
        let kind = route::classify(&normalized);

        let replaced = match kind {
            RouteKind::Static => upsert(&mut self.static_routes, method.clone(), normalized.clone(), kind, handler),
            RouteKind::File => upsert(&mut self.file_routes, method.clone(), normalized.clone(), kind, handler),
            RouteKind::Dynamic => self
                .tries
                .entry(method.clone())
                .or_insert_with(Node::root)
                .insert(&route::normalize_pattern(pattern, self.options), handler),
        };

        if replaced {
            tracing::debug!(%method, pattern = %normalized, "replaced existing route handler");
        }
        kind
    }

    /// Look up the handler for a request.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let decoded = route::decode(path, self.options);
        let folded = route::fold(&decoded, self.options);
        let original = route::trim(&decoded, self.options);
        let normalized = route::trim(&folded, self.options);

        for r in self.file_routes.iter().filter(|r| &r.method == method) {
            let prefix = r.prefix();
            let under_prefix = normalized == prefix
                || normalized
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'));
            if under_prefix {
                let residual = residual(original, normalized, prefix.len());
                return Some(RouteMatch {
                    handler: r.handler.clone(),
                    params: Params::new(),
                    kind: RouteKind::File,
                    residual: Some(residual),
                });
            }
        }

        if let Some(r) = self
            .static_routes
            .iter()
            .find(|r| &r.method == method && r.pattern == normalized)
        {
            return Some(RouteMatch {
                handler: r.handler.clone(),
                params: Params::new(),
                kind: RouteKind::Static,
                residual: None,
            });
        }

        let (handler, params) = self
            .tries
            .get(method)?
            .find(&decoded, self.options.case_sensitive)?;
        Some(RouteMatch {
            handler,
            params,
            kind: RouteKind::Dynamic,
            residual: None,
        })
    }

    /// Every registration as (method, normalized pattern, kind): file routes,
    /// then static routes in registration order, then trie routes.
    pub fn routes(&self) -> Vec<(Method, String, RouteKind)> {
        let listed = self.file_routes.iter().chain(self.static_routes.iter());
        let mut out: Vec<_> = listed
            .map(|r| (r.method.clone(), r.pattern.clone(), r.kind))
            .collect();

        let mut methods: Vec<&Method> = self.tries.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for method in methods {
            for pattern in self.tries[method].patterns() {
                out.push((method.clone(), pattern, RouteKind::Dynamic));
            }
        }
        out
    }

    /// Number of dynamic route termini registered for `method`.
    pub fn dynamic_count(&self, method: &Method) -> usize {
        self.tries.get(method).map_or(0, Node::terminus_count)
    }
}

fn upsert(routes: &mut Vec<Route>, method: Method, pattern: String, kind: RouteKind, handler: Handler) -> bool {
    match routes
        .iter_mut()
        .find(|r| r.method == method && r.pattern == pattern)
    {
        Some(existing) => {
            existing.handler = handler;
            true
        }
        None => {
            routes.push(Route::new(method, pattern, kind, handler));
            false
        }
    }
}

// Residual keeps the request's original case when folding did not change
// byte offsets.
fn residual(original: &str, normalized: &str, at: usize) -> String {
    let rest = if original.len() == normalized.len() {
        original.get(at..).unwrap_or(&normalized[at..])
    } else {
        &normalized[at..]
    };
    rest.trim_start_matches('/').to_string()
}
