//! Static file serving tests

use crate::helpers::*;
use regex::Regex;
use reqwest::StatusCode;
use tokio_rest::middleware::{serve_static, StaticOptions};
use tokio_rest::router::RouteOptions;
use tokio_rest::server::ServerOptions;

async fn start(dir: &std::path::Path, default: Option<&str>) -> TestServer {
    let server = TestServer::build(ServerOptions::new("static"));
    server
        .get(
            RouteOptions::regex(Regex::new(r"^/public/?.*$").unwrap()),
            serve_static(StaticOptions {
                directory: dir.to_path_buf(),
                default: default.map(str::to_string),
                ..Default::default()
            }),
        )
        .unwrap();
    TestServer::start(server).await
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("public")).unwrap();
    std::fs::write(dir.path().join("public/app.css"), "body { color: red; }").unwrap();
    std::fs::write(dir.path().join("public/index.html"), "<h1>home</h1>").unwrap();
    dir
}

/// Test a file is served with type, length and validators
#[tokio::test]
async fn test_serve_file() {
    let dir = fixture();
    let t = start(dir.path(), None).await;

    let resp = t.get("/public/app.css").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "text/css");
    assert_header(&resp, "content-length", "20");
    assert_has_header(&resp, "etag");
    assert_has_header(&resp, "last-modified");
    assert_header(&resp, "cache-control", "public, max-age=3600");
    assert_eq!(resp.text().await.unwrap(), "body { color: red; }");

    t.close().await;
}

/// Test a matching ETag yields 304
#[tokio::test]
async fn test_not_modified() {
    let dir = fixture();
    let t = start(dir.path(), None).await;

    let resp = t.get("/public/app.css").await;
    let etag = resp.headers()["etag"].to_str().unwrap().to_string();

    let resp = t
        .get_with_headers("/public/app.css", &[("if-none-match", &etag)])
        .await;
    assert_status(&resp, StatusCode::NOT_MODIFIED);

    t.close().await;
}

/// Test directory requests use the default file
#[tokio::test]
async fn test_default_file() {
    let dir = fixture();
    let t = start(dir.path(), Some("index.html")).await;

    let resp = t.get("/public/").await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "<h1>home</h1>");

    t.close().await;
}

/// Test missing files and traversal attempts
#[tokio::test]
async fn test_missing_and_traversal() {
    let dir = fixture();
    std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();
    let t = start(&dir.path().join("public"), None).await;

    assert_error(
        t.get("/public/missing.css").await,
        StatusCode::NOT_FOUND,
        "ResourceNotFound",
    )
    .await;

    let resp = t.get("/public/%2e%2e/%2e%2e/secret.txt").await;
    assert!(
        resp.status() == StatusCode::NOT_FOUND || resp.status() == StatusCode::FORBIDDEN,
        "traversal returned {}",
        resp.status()
    );

    t.close().await;
}
