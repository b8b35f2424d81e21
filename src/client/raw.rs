//! Byte-oriented client; the other flavors wrap it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use tracing::{debug, warn};

use super::retry::is_retryable;
use super::{error_from_body, ClientError, ClientOptions, ClientResponse, RequestInfo};

const ACCEPT_VERSION: &str = "accept-version";

/// Raw HTTP client returning response bodies as bytes.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    base: String,
    options: ClientOptions,
}

impl HttpClient {
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let base = reqwest::Url::parse(&options.url)
            .map_err(|e| ClientError::Config(format!("invalid url {:?}: {}", options.url, e)))?;

        let mut builder = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .gzip(options.gzip);
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let inner = builder
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            inner,
            base: base.as_str().trim_end_matches('/').to_string(),
            options,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Send `Authorization: Basic` with every request.
    pub fn basic_auth(&mut self, username: &str, password: &str) -> &mut Self {
        let token = STANDARD.encode(format!("{}:{}", username, password));
        if let Ok(value) = HeaderValue::from_str(&format!("Basic {}", token)) {
            self.options.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse<Bytes>, ClientError> {
        self.execute(Method::GET, path, None, HeaderMap::new()).await
    }

    pub async fn head(&self, path: &str) -> Result<ClientResponse<Bytes>, ClientError> {
        self.execute(Method::HEAD, path, None, HeaderMap::new()).await
    }

    pub async fn del(&self, path: &str) -> Result<ClientResponse<Bytes>, ClientError> {
        self.execute(Method::DELETE, path, None, HeaderMap::new()).await
    }

    pub async fn post(
        &self,
        path: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ClientResponse<Bytes>, ClientError> {
        self.with_body(Method::POST, path, content_type, body.into()).await
    }

    pub async fn put(
        &self,
        path: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ClientResponse<Bytes>, ClientError> {
        self.with_body(Method::PUT, path, content_type, body.into()).await
    }

    pub async fn patch(
        &self,
        path: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ClientResponse<Bytes>, ClientError> {
        self.with_body(Method::PATCH, path, content_type, body.into()).await
    }

    async fn with_body(
        &self,
        method: Method,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<ClientResponse<Bytes>, ClientError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        self.execute(method, path, Some(body), headers).await
    }

    /// Send a request, retrying transport failures per the retry policy.
    ///
    /// Error statuses are not retried.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: HeaderMap,
    ) -> Result<ClientResponse<Bytes>, ClientError> {
        let url = self.url(path);
        let mut attempt = 0u32;

        let response = loop {
            let request = self.build(&method, &url, body.clone(), &headers)?;
            match self.inner.execute(request).await {
                Ok(response) => break response,
                Err(e) if is_retryable(&e, &method) && self.options.retry.should_retry(attempt) => {
                    let delay = self.options.retry.backoff(attempt);
                    warn!(
                        method = %method,
                        url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ClientError::Transport {
                        method,
                        url,
                        source,
                    })
                }
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                method: method.clone(),
                url: url.clone(),
                source,
            })?;

        debug!(method = %method, url = %url, status = status.as_u16(), "response received");

        let result = ClientResponse {
            request: RequestInfo {
                method,
                url,
                attempts: attempt + 1,
            },
            status,
            headers: response_headers,
            body: bytes,
        };

        if status.as_u16() >= 400 {
            let response = result.map(|b| String::from_utf8_lossy(&b).into_owned());
            let error = error_from_body(status, &response.body);
            return Err(ClientError::Http {
                error,
                response: Box::new(response),
            });
        }

        Ok(result)
    }

    fn build(
        &self,
        method: &Method,
        url: &str,
        body: Option<Bytes>,
        headers: &HeaderMap,
    ) -> Result<reqwest::Request, ClientError> {
        let mut builder = self
            .inner
            .request(method.clone(), url)
            .headers(self.options.headers.clone())
            .headers(headers.clone());
        if let Some(accept) = &self.options.accept {
            builder = builder.header(ACCEPT, accept.as_str());
        }
        if let Some(version) = &self.options.version {
            builder = builder.header(ACCEPT_VERSION, version.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut request = builder.build().map_err(|source| ClientError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        })?;
        if let Some(sign) = &self.options.sign_request {
            sign(&mut request);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::errors::RestErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpClient {
        HttpClient::new(ClientOptions::new(server.uri()).with_retry(RetryPolicy::none())).unwrap()
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpClient::new(ClientOptions::new("not a url")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_get_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let res = client(&server).get("/ping").await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.body, Bytes::from_static(b"pong"));
        assert_eq!(res.request.method, Method::GET);
        assert_eq!(res.request.attempts, 1);
    }

    #[tokio::test]
    async fn test_post_with_content_type_and_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("content-type", "text/plain"))
            .and(header("accept-version", "~1"))
            .and(body_string("widget"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let c = HttpClient::new(
            ClientOptions::new(server.uri())
                .with_version("~1")
                .with_retry(RetryPolicy::none()),
        )
        .unwrap();
        let res = c.post("/items", "text/plain", "widget").await.unwrap();
        assert_eq!(res.status, 201);
    }

    #[tokio::test]
    async fn test_error_status_rebuilds_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"code":"NotAuthorized","message":"nope"}"#,
            ))
            .mount(&server)
            .await;

        let err = client(&server).del("/items/1").await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
        let http = err.http_error().unwrap();
        assert!(http.is(RestErrorKind::NotAuthorized));
        assert_eq!(http.message(), "nope");
    }

    #[tokio::test]
    async fn test_basic_auth_and_sign() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(header("x-signature", "signed"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut c = HttpClient::new(
            ClientOptions::new(server.uri())
                .with_retry(RetryPolicy::none())
                .with_sign_request(|req| {
                    req.headers_mut()
                        .insert("x-signature", HeaderValue::from_static("signed"));
                }),
        )
        .unwrap();
        c.basic_auth("user", "pass");
        let res = c.get("/secure").await.unwrap();
        assert_eq!(res.status, 204);
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = HttpClient::new(ClientOptions::new(format!("http://{}", addr)).with_retry(
            RetryPolicy {
                retries: 1,
                min_timeout: std::time::Duration::from_millis(1),
                max_timeout: std::time::Duration::from_millis(2),
            },
        ))
        .unwrap();
        let err = c.get("/").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }

    fn counting(options: ClientOptions, attempts: &Arc<AtomicU32>) -> ClientOptions {
        let attempts = Arc::clone(attempts);
        options.with_sign_request(move |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn quick_retries(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            min_timeout: Duration::from_millis(1),
            max_timeout: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_retried() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let attempts = Arc::new(AtomicU32::new(0));
        let c = HttpClient::new(counting(
            ClientOptions::new(format!("http://{}", addr)).with_retry(quick_retries(3)),
            &attempts,
        ))
        .unwrap();
        let err = c.post("/items", "text/plain", "widget").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_post_timeout_is_not_resent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;

        let c = HttpClient::new(
            ClientOptions::new(server.uri())
                .with_request_timeout(Duration::from_millis(100))
                .with_retry(quick_retries(3)),
        )
        .unwrap();
        let err = c.post("/items", "text/plain", "widget").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;

        let c = HttpClient::new(
            ClientOptions::new(server.uri())
                .with_request_timeout(Duration::from_millis(100))
                .with_retry(quick_retries(2)),
        )
        .unwrap();
        assert!(c.get("/slow").await.is_err());
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let c = HttpClient::new(ClientOptions::new(server.uri()).with_retry(quick_retries(3)))
            .unwrap();
        let err = c.get("/").await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn test_url_join() {
        let c = HttpClient::new(ClientOptions::new("http://localhost:8080/")).unwrap();
        assert_eq!(c.url("/a"), "http://localhost:8080/a");
        assert_eq!(c.url("a"), "http://localhost:8080/a");
    }
}
