//! JSON client.

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::Value;

use super::{ClientError, ClientOptions, ClientResponse, HttpClient};

const APPLICATION_JSON: &str = "application/json";

/// Client that sends and receives JSON.
///
/// Empty response bodies parse as `Value::Null`.
#[derive(Clone, Debug)]
pub struct JsonClient {
    raw: HttpClient,
}

impl JsonClient {
    pub fn new(mut options: ClientOptions) -> Result<Self, ClientError> {
        options
            .accept
            .get_or_insert_with(|| APPLICATION_JSON.to_string());
        Ok(Self {
            raw: HttpClient::new(options)?,
        })
    }

    pub fn basic_auth(&mut self, username: &str, password: &str) -> &mut Self {
        self.raw.basic_auth(username, password);
        self
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse<Value>, ClientError> {
        decode(self.raw.get(path).await?)
    }

    pub async fn head(&self, path: &str) -> Result<ClientResponse<Value>, ClientError> {
        decode(self.raw.head(path).await?)
    }

    pub async fn del(&self, path: &str) -> Result<ClientResponse<Value>, ClientError> {
        decode(self.raw.del(path).await?)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ClientResponse<Value>, ClientError> {
        self.send(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ClientResponse<Value>, ClientError> {
        self.send(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ClientResponse<Value>, ClientError> {
        self.send(Method::PATCH, path, body).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ClientResponse<Value>, ClientError> {
        let payload = Bytes::from(serde_json::to_vec(body)?);
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(APPLICATION_JSON),
        );
        decode(self.raw.execute(method, path, Some(payload), headers).await?)
    }
}

fn decode(res: ClientResponse<Bytes>) -> Result<ClientResponse<Value>, ClientError> {
    let body = if res.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&res.body)?
    };
    Ok(res.map(|_| body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> JsonClient {
        JsonClient::new(ClientOptions::new(server.uri()).with_retry(RetryPolicy::none())).unwrap()
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ada"})))
            .mount(&server)
            .await;

        let res = client(&server).await.get("/users/42").await.unwrap();
        assert_eq!(res.body["name"], "ada");
    }

    #[tokio::test]
    async fn test_post_serializes_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"name": "grace"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;

        let res = client(&server)
            .await
            .post("/users", &json!({"name": "grace"}))
            .await
            .unwrap();
        assert_eq!(res.status, 201);
        assert_eq!(res.body["id"], 7);
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let res = client(&server).await.del("/users/1").await.unwrap();
        assert!(res.body.is_null());
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = client(&server).await.get("/").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
