// src/http.rs
use bytes::Bytes;
use http_body_util::Full;

pub use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
pub use hyper::{Method, StatusCode};

/// Response type produced by the router.
pub type Response = hyper::Response<Full<Bytes>>;

pub mod mime {
    pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
    pub const TEXT_HTML: &str = "text/html; charset=utf-8";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_JAVASCRIPT: &str = "application/javascript; charset=utf-8";
    pub const APPLICATION_FORM: &str = "application/x-www-form-urlencoded";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// The nine standard verbs, in registration order for `all`.
pub const STANDARD_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Plain-text response with the given status, used for every status the
/// core produces on its own (404, 413, 500).
pub fn plain(status: StatusCode, body: impl Into<Bytes>) -> Response {
    let mut res = hyper::Response::new(Full::new(body.into()));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_PLAIN));
    res.headers_mut()
        .insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    res
}

pub fn payload_too_large() -> Response {
    plain(StatusCode::PAYLOAD_TOO_LARGE, "Request Entity Too Large")
}

pub fn bad_request() -> Response {
    plain(StatusCode::BAD_REQUEST, "Bad Request")
}

pub fn internal_error(message: impl Into<Bytes>) -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, message)
}
