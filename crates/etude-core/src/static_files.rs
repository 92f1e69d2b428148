//! Static asset mount.
//!
//! [`Router::static_files`](crate::Router::static_files) registers a
//! `GET prefix/*` catch-all whose handler maps the wildcard onto a directory
//! on disk.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::Context;
use crate::handler::{handler, Handler, HandlerResult};

type SkipFn = Arc<dyn Fn(&Context) -> bool + Send + Sync>;
type ModifyFn = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;

/// Options for a static mount.
#[derive(Clone)]
pub struct StaticConfig {
    /// File served for directory requests (default: `index.html`).
    pub index: String,
    /// `Cache-Control: public, max-age=N` on served files when set.
    pub max_age: Option<u32>,
    /// Serve every file as an attachment.
    pub download: bool,
    next: Option<SkipFn>,
    modify_response: Option<ModifyFn>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        StaticConfig {
            index: "index.html".to_string(),
            max_age: None,
            download: false,
            next: None,
            modify_response: None,
        }
    }
}

impl StaticConfig {
    pub fn new() -> Self {
        StaticConfig::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Skip the mount for requests where `f` returns `true`. A skipped
    /// request is answered with whatever the context holds, an empty `200`
    /// unless middleware wrote something.
    pub fn skip_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(f));
        self
    }

    /// Adjust the response (typically headers) before a file is sent.
    pub fn modify_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.modify_response = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StaticConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticConfig")
            .field("index", &self.index)
            .field("max_age", &self.max_age)
            .field("download", &self.download)
            .field("next", &self.next.is_some())
            .field("modify_response", &self.modify_response.is_some())
            .finish()
    }
}

pub(crate) fn static_handler(root: PathBuf, config: StaticConfig) -> Handler {
    let mount = Arc::new((root, config));
    handler(move |ctx| {
        let mount = mount.clone();
        Box::pin(async move {
            let (root, config) = &*mount;
            serve(ctx, root, config).await
        })
    })
}

async fn serve(ctx: &mut Context, root: &Path, config: &StaticConfig) -> HandlerResult {
    if config.next.as_ref().is_some_and(|skip| skip(&*ctx)) {
        return Ok(());
    }

    let Some(path) = resolve(root, ctx.wildcard()) else {
        return ctx.status(404).send_string("Not Found");
    };

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ctx.status(404).send_string("Not Found"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to stat static file");
            return ctx.status(500).send_string("Internal Server Error");
        }
    };

    let file = if meta.is_dir() {
        let index = path.join(&config.index);
        match tokio::fs::metadata(&index).await {
            Ok(m) if m.is_file() => index,
            _ => return ctx.status(403).send_string("Forbidden"),
        }
    } else {
        path
    };

    if let Some(max_age) = config.max_age.filter(|&n| n > 0) {
        ctx.set_header("cache-control", &format!("public, max-age={}", max_age))?;
    }
    if let Some(modify) = &config.modify_response {
        modify(&mut *ctx)?;
    }

    ctx.send_file(&file, config.download).await
}

/// Join the wildcard onto `root`. `None` for paths that try to leave it.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}
