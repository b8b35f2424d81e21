//! Listen, protocol and shutdown behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::*;
use hyper_util::rt::TokioIo;
use reqwest::StatusCode;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rest::core::{Request, Response};
use tokio_rest::errors::{HttpError, HttpErrorKind};
use tokio_rest::middleware::{HandlerResult, Next};
use tokio_rest::router::Route;
use tokio_rest::server::{ServerError, ServerOptions};

fn ok(_: &mut Request, res: &mut Response) -> HandlerResult {
    res.send(json!({ "ok": true }));
    Ok(Next::Stop)
}

/// Test address reporting and double listen
#[tokio::test]
async fn test_address_and_listen_twice() {
    let server = TestServer::build(ServerOptions::new("lifecycle"));
    server.get("/", ok).unwrap();
    let t = TestServer::start(server).await;

    let address = t.server.address().unwrap();
    assert_eq!(address.family, "IPv4");
    assert_eq!(address.address, "127.0.0.1");
    assert!(address.port > 0);
    assert_eq!(t.server.url().unwrap(), t.base_url);

    let err = t
        .server
        .listen("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::AlreadyListening(_)));

    t.close().await;
}

/// Test HTTP/2 with prior knowledge over clear text
#[tokio::test]
async fn test_http2_prior_knowledge() {
    let server = TestServer::build(ServerOptions::new("lifecycle"));
    server.get("/", ok).unwrap();
    let t = TestServer::start(server).await;

    let client = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let resp = client.get(t.url("/")).send().await.unwrap();
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.version(), reqwest::Version::HTTP_2);

    t.close().await;
}

/// Test upgrade requests are refused unless enabled
#[tokio::test]
async fn test_upgrade_refused() {
    let server = TestServer::build(ServerOptions::new("lifecycle"));
    server.get("/ws", ok).unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .get_with_headers("/ws", &[("connection", "upgrade"), ("upgrade", "websocket")])
        .await;
    assert_status(&resp, StatusCode::NOT_IMPLEMENTED);

    t.close().await;
}

fn echo_upgrade(req: &mut Request, res: &mut Response) -> HandlerResult {
    let Some(on_upgrade) = req.upgrade() else {
        return Err(HttpError::new(HttpErrorKind::BadRequest, "not an upgrade"));
    };
    tokio::spawn(async move {
        let Ok(upgraded) = on_upgrade.await else {
            return;
        };
        let mut io = TokioIo::new(upgraded);
        let mut buf = [0u8; 4];
        if io.read_exact(&mut buf).await.is_ok() {
            let _ = io.write_all(&buf).await;
        }
    });
    res.set_status(StatusCode::SWITCHING_PROTOCOLS);
    res.header("connection", "upgrade");
    res.header("upgrade", "echo");
    Ok(Next::Stop)
}

/// Test a handler can take over the connection after 101
#[tokio::test]
async fn test_upgrade_handled() {
    let server = TestServer::build(ServerOptions::new("lifecycle").with_handle_upgrades(true));
    server.get("/echo", echo_upgrade).unwrap();
    let t = TestServer::start(server).await;
    let addr = t.server.address().unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", addr.port)).await.unwrap();
    stream
        .write_all(b"GET /echo HTTP/1.1\r\nhost: localhost\r\nconnection: upgrade\r\nupgrade: echo\r\n\r\n")
        .await
        .unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {}", head);
    assert!(head.to_ascii_lowercase().contains("upgrade: echo"));

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echoed, b"ping");

    drop(stream);
    t.close().await;
}

/// Test after hooks observe every completed request
#[tokio::test]
async fn test_after_hooks() {
    let seen = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let server = TestServer::build(ServerOptions::new("lifecycle"));
    server.get("/", ok).unwrap();
    {
        let seen = Arc::clone(&seen);
        let errors = Arc::clone(&errors);
        server.on_after(
            move |_: &Request, _: &Response, _: Option<&Route>, err: Option<&HttpError>| {
                seen.fetch_add(1, Ordering::SeqCst);
                if err.is_some() {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
    }
    let t = TestServer::start(server).await;

    assert_status(&t.get("/").await, StatusCode::OK);
    assert_status(&t.get("/nope").await, StatusCode::NOT_FOUND);

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    t.close().await;
}

/// Test close drains connections and refuses new ones
#[tokio::test]
async fn test_graceful_close() {
    let server = TestServer::build(ServerOptions::new("lifecycle"));
    server.get("/", ok).unwrap();
    let t = TestServer::start(server).await;

    assert_status(&t.get("/").await, StatusCode::OK);

    assert!(t.server.close().await);
    // closing again reports the drained state
    assert!(t.server.close().await);
    assert_eq!(t.server.active_connections(), 0);

    let fresh = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert!(fresh.get(t.url("/")).send().await.is_err());
}
