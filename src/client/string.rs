//! Text client.

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use super::{ClientError, ClientOptions, ClientResponse, HttpClient};

const TEXT_PLAIN: &str = "text/plain";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Client that exchanges text bodies.
#[derive(Clone, Debug)]
pub struct StringClient {
    raw: HttpClient,
}

impl StringClient {
    pub fn new(mut options: ClientOptions) -> Result<Self, ClientError> {
        options.accept.get_or_insert_with(|| TEXT_PLAIN.to_string());
        Ok(Self {
            raw: HttpClient::new(options)?,
        })
    }

    pub fn basic_auth(&mut self, username: &str, password: &str) -> &mut Self {
        self.raw.basic_auth(username, password);
        self
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse<String>, ClientError> {
        Ok(text(self.raw.get(path).await?))
    }

    pub async fn head(&self, path: &str) -> Result<ClientResponse<String>, ClientError> {
        Ok(text(self.raw.head(path).await?))
    }

    pub async fn del(&self, path: &str) -> Result<ClientResponse<String>, ClientError> {
        Ok(text(self.raw.del(path).await?))
    }

    pub async fn post(
        &self,
        path: &str,
        body: impl Into<String>,
    ) -> Result<ClientResponse<String>, ClientError> {
        let body = Bytes::from(body.into());
        Ok(text(self.raw.post(path, TEXT_PLAIN, body).await?))
    }

    pub async fn put(
        &self,
        path: &str,
        body: impl Into<String>,
    ) -> Result<ClientResponse<String>, ClientError> {
        let body = Bytes::from(body.into());
        Ok(text(self.raw.put(path, TEXT_PLAIN, body).await?))
    }

    pub async fn patch(
        &self,
        path: &str,
        body: impl Into<String>,
    ) -> Result<ClientResponse<String>, ClientError> {
        let body = Bytes::from(body.into());
        Ok(text(self.raw.patch(path, TEXT_PLAIN, body).await?))
    }

    /// POST `fields` as `application/x-www-form-urlencoded`.
    pub async fn post_form<K, V>(
        &self,
        path: &str,
        fields: &[(K, V)],
    ) -> Result<ClientResponse<String>, ClientError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = encode_form(fields);
        Ok(text(self.raw.post(path, FORM_URLENCODED, body).await?))
    }
}

fn encode_form<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> String {
    fields
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k.as_ref(), NON_ALPHANUMERIC),
                utf8_percent_encode(v.as_ref(), NON_ALPHANUMERIC)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn text(res: ClientResponse<Bytes>) -> ClientResponse<String> {
    res.map(|b| String::from_utf8_lossy(&b).into_owned())
}
