//! Test helpers and utilities

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tokio_rest::server::{create_server, Server, ServerOptions};

/// A server listening on 127.0.0.1 with a client pointed at it.
pub struct TestServer {
    pub server: Server,
    pub base_url: String,
    pub client: Client,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a server with `options`; routes are added before [`start`](Self::start).
    pub fn build(options: ServerOptions) -> Server {
        create_server(options.with_workers(1).with_drain_timeout(Duration::from_secs(2)))
            .expect("Failed to create server")
    }

    /// Listen on an ephemeral port.
    pub async fn start(server: Server) -> Self {
        let addr = server
            .listen("127.0.0.1:0".parse().unwrap())
            .await
            .expect("Failed to listen");

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .no_gzip()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            server,
            base_url: format!("http://{}", addr),
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with form data
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        self.client
            .post(self.url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a POST request with a raw body
    pub async fn post_raw(&self, path: &str, content_type: &str, body: Vec<u8>) -> Response {
        self.client
            .post(self.url(path))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn close(&self) {
        self.server.close().await;
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that response has header present
pub fn assert_has_header(response: &Response, name: &str) {
    assert!(
        response.headers().contains_key(name),
        "Header '{}' not found",
        name
    );
}

/// Read the body as JSON.
pub async fn body_json(response: Response) -> Value {
    let body = response.text().await.expect("Failed to read body");
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("Invalid JSON ({}): {}", e, body))
}

/// Assert a REST error body.
pub async fn assert_error(response: Response, status: StatusCode, code: &str) -> String {
    assert_status(&response, status);
    let body = body_json(response).await;
    assert_eq!(body["code"], code, "unexpected error body: {}", body);
    body["message"].as_str().unwrap_or_default().to_string()
}
