//! Per-request context.
//!
//! A [`Context`] is created for every request before the middleware chain
//! runs and dropped when the response is sent. It carries the request head,
//! the buffered body, captured path parameters, and a response sink that
//! accepts exactly one terminal write.

use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::request::Parts;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{EtudeError, EtudeResult};
use crate::handler::HandlerResult;
use crate::http::{header, mime, HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode};
use crate::template::TemplateEngine;
use crate::trie::Params;

struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    written: bool,
}

pub struct Context {
    parts: Parts,
    body: Bytes,
    params: Params,
    residual: Option<String>,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    config: Arc<Config>,
    views: Option<Arc<dyn TemplateEngine>>,
    response: ResponseSink,
}

impl Context {
    pub fn new(parts: Parts, body: Bytes, config: Arc<Config>) -> Self {
        let query: Vec<(String, String)> = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(mime::APPLICATION_FORM));
        let form: Vec<(String, String)> = if is_form {
            serde_urlencoded::from_bytes(&body).unwrap_or_default()
        } else {
            Vec::new()
        };

        Context {
            parts,
            body,
            params: Params::new(),
            residual: None,
            query,
            form,
            config,
            views: None,
            response: ResponseSink {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                written: false,
            },
        }
    }

    pub(crate) fn with_views(mut self, views: Option<Arc<dyn TemplateEngine>>) -> Self {
        self.views = views;
        self
    }

    pub(crate) fn set_route(&mut self, params: Params, residual: Option<String>) {
        self.params = params;
        self.residual = residual;
    }

    // ── Request ────────────────────────────────────────────────

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &hyper::Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Request header as a string, `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path parameter by name; empty string when the route has no such
    /// parameter.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Path below the mount prefix of a catch-all route, without leading `/`.
    pub fn wildcard(&self) -> &str {
        self.residual.as_deref().unwrap_or("")
    }

    /// First query-string value for `key`.
    pub fn query(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    pub fn query_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query(key).unwrap_or(default)
    }

    /// Form value for `key`: the urlencoded body wins over the query string.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        lookup(&self.form, key).or_else(|| self.query(key))
    }

    pub fn form_value_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.form_value(key).unwrap_or(default)
    }

    /// Decode the JSON body with the configured codec.
    pub fn bind_json<T: DeserializeOwned>(&self) -> EtudeResult<T> {
        let value = (self.config.json.decode)(&self.body).map_err(EtudeError::Decode)?;
        serde_json::from_value(value).map_err(EtudeError::Decode)
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn bind_form<T: DeserializeOwned>(&self) -> EtudeResult<T> {
        serde_urlencoded::from_bytes(&self.body).map_err(EtudeError::Form)
    }

    // ── Response ───────────────────────────────────────────────

    /// Status used by the next terminal write that does not take one.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.response.status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    /// Set a response header. Fails once the response has been written.
    pub fn set_header(&mut self, name: &str, value: &str) -> HandlerResult {
        if self.response.written {
            return Err(EtudeError::AlreadyWritten);
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| EtudeError::InvalidHeader(name.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| EtudeError::InvalidHeader(format!("{}: {}", name, value)))?;
        self.response.headers.insert(name, value);
        Ok(())
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn response_status(&self) -> StatusCode {
        self.response.status
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response.body
    }

    /// Whether a terminal writer has run.
    pub fn written(&self) -> bool {
        self.response.written
    }

    /// Terminal write with an explicit content type. `Content-Type` is only
    /// set if the handler has not set one already.
    pub fn send(&mut self, content_type: &str, body: impl Into<Bytes>) -> HandlerResult {
        if self.response.written {
            return Err(EtudeError::AlreadyWritten);
        }
        if !self.response.headers.contains_key(header::CONTENT_TYPE) {
            let value = HeaderValue::from_str(content_type)
                .map_err(|_| EtudeError::InvalidHeader(content_type.to_string()))?;
            self.response.headers.insert(header::CONTENT_TYPE, value);
        }
        self.response.body = body.into();
        self.response.written = true;
        Ok(())
    }

    pub fn send_string(&mut self, body: impl Into<String>) -> HandlerResult {
        self.send(mime::TEXT_PLAIN, body.into())
    }

    pub fn html(&mut self, code: u16, body: impl Into<String>) -> HandlerResult {
        self.status(code).send(mime::TEXT_HTML, body.into())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) -> HandlerResult {
        let encoded = self.encode(value)?;
        self.status(code).send(mime::APPLICATION_JSON, encoded)
    }

    /// JSON wrapped in a JavaScript call, `callback(...)` by default.
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, code: u16, value: &T, callback: Option<&str>) -> HandlerResult {
        let encoded = self.encode(value)?;
        let callback = callback.unwrap_or("callback");
        let mut body = Vec::with_capacity(callback.len() + encoded.len() + 3);
        body.extend_from_slice(callback.as_bytes());
        body.push(b'(');
        body.extend_from_slice(&encoded);
        body.extend_from_slice(b");");
        self.status(code).send(mime::APPLICATION_JAVASCRIPT, body)
    }

    /// Redirect with `302 Found`.
    pub fn redirect(&mut self, location: &str) -> HandlerResult {
        self.set_header(header::LOCATION.as_str(), location)?;
        self.status(302).send(mime::TEXT_PLAIN, Bytes::new())
    }

    /// Send a file from disk. Missing files answer 404 and stat failures
    /// 500; with `attachment` the response carries a download disposition.
    pub async fn send_file(&mut self, path: impl AsRef<Path>, attachment: bool) -> HandlerResult {
        let path = path.as_ref();
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return self.status(404).send_string("Not Found"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.status(404).send_string("Not Found"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to stat file");
                return self.status(500).send_string("Internal Server Error");
            }
        };

        let data = tokio::fs::read(path).await?;

        if attachment {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().replace('"', ""))
                .unwrap_or_default();
            self.set_header(
                header::CONTENT_DISPOSITION.as_str(),
                &format!("attachment; filename=\"{}\"", name),
            )?;
        }
        if let Ok(modified) = meta.modified() {
            self.set_header(header::LAST_MODIFIED.as_str(), &httpdate::fmt_http_date(modified))?;
        }

        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        self.send(content_type.as_ref(), data)
    }

    /// Render a template through the engine registered with
    /// [`Router::views`](crate::Router::views).
    pub fn render<T: Serialize + ?Sized>(&mut self, name: &str, data: &T) -> HandlerResult {
        let engine = self.views.clone().ok_or(EtudeError::NoTemplateEngine)?;
        let value = serde_json::to_value(data).map_err(EtudeError::Encode)?;
        let mut out = Vec::new();
        engine.render(&mut out, name, &value)?;
        self.send(mime::TEXT_HTML, out)
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> EtudeResult<Vec<u8>> {
        let value = serde_json::to_value(value).map_err(EtudeError::Encode)?;
        (self.config.json.encode)(&value).map_err(EtudeError::Encode)
    }

    pub(crate) fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response.headers
    }

    /// Consume the context into the HTTP response.
    pub fn into_response(self) -> Response {
        let mut res = hyper::Response::new(Full::new(self.response.body));
        *res.status_mut() = self.response.status;
        *res.headers_mut() = self.response.headers;
        res
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn context(uri: &str, content_type: Option<&str>, body: &'static [u8]) -> Context {
        let mut builder = hyper::Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        Context::new(parts, Bytes::from_static(body), Arc::new(Config::default()))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
        age: u32,
    }

    #[test]
    fn test_missing_param_is_empty() {
        let mut ctx = context("/user/1", None, b"");
        let mut params = Params::new();
        params.insert("id".into(), "1".into());
        ctx.set_route(params, None);

        assert_eq!(ctx.param("id"), "1");
        assert_eq!(ctx.param("nope"), "");
    }

    #[test]
    fn test_query_with_default() {
        let ctx = context("/search?q=rust+web&page=2", None, b"");
        assert_eq!(ctx.query("q"), Some("rust web"));
        assert_eq!(ctx.query_or("page", "1"), "2");
        assert_eq!(ctx.query_or("limit", "20"), "20");
        assert_eq!(ctx.query("missing"), None);
    }

    #[test]
    fn test_form_value_prefers_body() {
        let ctx = context("/login?user=query&lang=en", Some(mime::APPLICATION_FORM), b"user=body&age=30");
        assert_eq!(ctx.form_value("user"), Some("body"));
        assert_eq!(ctx.form_value("lang"), Some("en"));
        assert_eq!(ctx.form_value_or("theme", "dark"), "dark");
    }

    #[test]
    fn test_form_ignored_without_content_type() {
        let ctx = context("/login", None, b"user=body");
        assert_eq!(ctx.form_value("user"), None);
    }

    #[test]
    fn test_bind_json() {
        let ctx = context("/login", Some(mime::APPLICATION_JSON), br#"{"user":"ann","age":41}"#);
        let login: Login = ctx.bind_json().unwrap();
        assert_eq!(login, Login { user: "ann".into(), age: 41 });
    }

    #[test]
    fn test_bind_json_malformed() {
        let ctx = context("/login", Some(mime::APPLICATION_JSON), br#"{"user":"#);
        let err = ctx.bind_json::<Login>().unwrap_err();
        assert!(matches!(err, EtudeError::Decode(_)));
    }

    #[test]
    fn test_bind_form() {
        let ctx = context("/login", Some(mime::APPLICATION_FORM), b"user=bo&age=7");
        let login: Login = ctx.bind_form().unwrap();
        assert_eq!(login, Login { user: "bo".into(), age: 7 });
        assert!(matches!(ctx.bind_form::<Login>().map(|_| ()), Ok(())));
        let bad = context("/login", Some(mime::APPLICATION_FORM), b"user=bo&age=old");
        assert!(matches!(bad.bind_form::<Login>(), Err(EtudeError::Form(_))));
    }

    #[test]
    fn test_json_writer() {
        let mut ctx = context("/", None, b"");
        ctx.json(201, &serde_json::json!({"ok": true})).unwrap();

        assert_eq!(ctx.response_status(), StatusCode::CREATED);
        assert_eq!(ctx.response_header("content-type"), Some(mime::APPLICATION_JSON));
        assert_eq!(ctx.response_body(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_jsonp_default_callback() {
        let mut ctx = context("/", None, b"");
        ctx.jsonp(200, &[1, 2], None).unwrap();
        assert_eq!(ctx.response_body(), b"callback([1,2]);");
        assert_eq!(ctx.response_header("content-type"), Some(mime::APPLICATION_JAVASCRIPT));

        let mut ctx = context("/", None, b"");
        ctx.jsonp(200, "hi", Some("cb")).unwrap();
        assert_eq!(ctx.response_body(), br#"cb("hi");"#);
    }

    #[test]
    fn test_second_terminal_write_is_rejected() {
        let mut ctx = context("/", None, b"");
        ctx.send_string("first").unwrap();
        assert!(matches!(ctx.html(200, "second"), Err(EtudeError::AlreadyWritten)));
        assert_eq!(ctx.response_body(), b"first");
        assert_eq!(ctx.response_header("content-type"), Some(mime::TEXT_PLAIN));
    }

    #[test]
    fn test_headers_after_write_are_rejected() {
        let mut ctx = context("/", None, b"");
        ctx.set_header("x-before", "1").unwrap();
        ctx.send_string("body").unwrap();
        assert!(matches!(ctx.set_header("x-after", "1"), Err(EtudeError::AlreadyWritten)));
        assert_eq!(ctx.response_header("x-before"), Some("1"));
    }

    #[test]
    fn test_preset_content_type_is_kept() {
        let mut ctx = context("/", None, b"");
        ctx.set_header("content-type", "application/problem+json").unwrap();
        ctx.json(400, &serde_json::json!({"title": "bad"})).unwrap();
        assert_eq!(ctx.response_header("content-type"), Some("application/problem+json"));
    }

    #[test]
    fn test_redirect() {
        let mut ctx = context("/", None, b"");
        ctx.redirect("/login").unwrap();
        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()["location"], "/login");
    }

    #[test]
    fn test_render_without_engine() {
        let mut ctx = context("/", None, b"");
        assert!(matches!(ctx.render("index", &()), Err(EtudeError::NoTemplateEngine)));
    }

    #[tokio::test]
    async fn test_send_file_missing_is_404() {
        let mut ctx = context("/", None, b"");
        ctx.send_file("/definitely/not/here.txt", false).await.unwrap();
        assert_eq!(ctx.response_status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_file_attachment() {
        let dir = std::env::temp_dir().join(format!("etude-ctx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("report.txt");
        std::fs::write(&file, "quarterly numbers").unwrap();

        let mut ctx = context("/", None, b"");
        ctx.send_file(&file, true).await.unwrap();

        assert_eq!(ctx.response_status(), StatusCode::OK);
        assert_eq!(ctx.response_body(), b"quarterly numbers");
        assert_eq!(
            ctx.response_header("content-disposition"),
            Some("attachment; filename=\"report.txt\"")
        );
        assert_eq!(ctx.response_header("content-type"), Some("text/plain"));
        assert!(ctx.response_header("last-modified").is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
