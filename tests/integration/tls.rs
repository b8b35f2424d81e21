//! HTTPS listening with a self-signed certificate.

use std::time::Duration;

use crate::helpers::*;
use reqwest::StatusCode;
use serde_json::json;
use tokio_rest::core::{Request, Response};
use tokio_rest::middleware::{HandlerResult, Next};
use tokio_rest::server::ServerOptions;

fn ok(_: &mut Request, res: &mut Response) -> HandlerResult {
    res.send(json!({ "secure": true }));
    Ok(Next::Stop)
}

/// Write a fresh certificate and key for `localhost` into `dir`.
fn self_signed(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
    (cert_path, key_path)
}

/// Test an HTTPS request negotiates h2 through ALPN
#[tokio::test]
async fn test_https_negotiates_h2() {
    let dir = tempfile::tempdir().unwrap();
    let (cert, key) = self_signed(dir.path());

    let server = TestServer::build(ServerOptions::new("tls").with_tls(cert, key));
    server.get("/", ok).unwrap();
    let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
    assert_eq!(server.url().unwrap(), format!("https://{}", addr));

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let resp = client
        .get(format!("https://localhost:{}/", addr.port()))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.version(), reqwest::Version::HTTP_2);
    assert_eq!(body_json(resp).await["secure"], true);

    assert!(server.close().await);
}

/// Test HTTP/1.1 is the only protocol offered when HTTP/2 is off
#[tokio::test]
async fn test_https_http1_only() {
    let dir = tempfile::tempdir().unwrap();
    let (cert, key) = self_signed(dir.path());

    let server = TestServer::build(ServerOptions::new("tls").with_tls(cert, key).with_http2(false));
    server.get("/", ok).unwrap();
    let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let resp = client
        .get(format!("https://localhost:{}/", addr.port()))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.version(), reqwest::Version::HTTP_11);

    assert!(server.close().await);
}
