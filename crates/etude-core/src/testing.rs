//! In-process test client.
//!
//! Requests go straight into [`RouterService::dispatch`], no socket
//! involved:
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_user() {
//!     let client = TestClient::new(router.build());
//!     let res = client.get("/api/users/42").await;
//!     assert_eq!(res.status, 200);
//!     assert_eq!(res.body, "User ID: 42");
//! }
//! ```

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use serde::de::DeserializeOwned;

use crate::http::{header, mime, HeaderMap, Method};
use crate::router::RouterService;

/// Drives a [`RouterService`] in tests.
#[derive(Clone)]
pub struct TestClient {
    service: RouterService,
}

impl TestClient {
    pub fn new(service: RouterService) -> Self {
        TestClient { service }
    }

    /// Send an arbitrary request.
    pub async fn request(&self, req: Request<Full<Bytes>>) -> TestResponse {
        let res = self.service.dispatch(req).await;
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = match res.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    /// Send a request with no body.
    pub async fn send(&self, method: Method, uri: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .expect("invalid test request");
        self.request(req).await
    }

    /// Send a GET request.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri).await
    }

    /// Send a POST request with the given content type and body.
    pub async fn post(&self, uri: &str, content_type: &str, body: impl Into<Bytes>) -> TestResponse {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Full::new(body.into()))
            .expect("invalid test request");
        self.request(req).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> TestResponse {
        self.post(uri, mime::APPLICATION_JSON, body.to_string()).await
    }
}

/// A collected response for assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Header value as a string, `None` when absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_str(&self.body).expect("Failed to parse response as JSON")
    }
}
