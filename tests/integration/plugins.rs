//! Plugin tests: body parsing, throttling, compression, CORS, conditional
//! requests and response decoration.

use std::io::Read;
use std::time::Duration;

use crate::helpers::*;
use flate2::read::GzDecoder;
use reqwest::StatusCode;
use serde_json::json;
use tokio_rest::core::{Request, Response};
use tokio_rest::middleware::{
    authorization_parser, body_parser, conditional_request, cors, full_response, gzip_response,
    jsonp, throttle, BodyParserOptions, CorsOptions, GzipOptions, HandlerChain, HandlerResult,
    Next, ThrottleOptions,
};
use tokio_rest::server::ServerOptions;

fn echo_body(req: &mut Request, res: &mut Response) -> HandlerResult {
    res.send(json!({ "body": req.body, "params": req.params }));
    Ok(Next::Stop)
}

/// Test JSON bodies are parsed and mapped into params
#[tokio::test]
async fn test_json_body() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(body_parser(BodyParserOptions::default()));
    server.post("/items/:id", echo_body).unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .post_json("/items/9", &json!({ "name": "widget", "id": "ignored" }))
        .await;
    assert_status(&resp, StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["body"]["name"], "widget");
    assert_eq!(body["params"]["name"], "widget");
    // path params are not overridden by default
    assert_eq!(body["params"]["id"], "9");

    t.close().await;
}

/// Test malformed JSON is a 400 InvalidContent
#[tokio::test]
async fn test_invalid_json_body() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(body_parser(BodyParserOptions::default()));
    server.post("/items", echo_body).unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .post_raw("/items", "application/json", b"{\"name\":".to_vec())
        .await;
    let message = assert_error(resp, StatusCode::BAD_REQUEST, "InvalidContent").await;
    assert!(message.starts_with("Invalid JSON"), "{}", message);

    t.close().await;
}

/// Test urlencoded forms
#[tokio::test]
async fn test_form_body() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(body_parser(BodyParserOptions::default()));
    server.post("/login", echo_body).unwrap();
    let t = TestServer::start(server).await;

    let body = body_json(
        t.post_form("/login", &[("user", "ada"), ("note", "a b&c")])
            .await,
    )
    .await;
    assert_eq!(body["params"]["user"], "ada");
    assert_eq!(body["params"]["note"], "a b&c");

    t.close().await;
}

/// Test multipart uploads are stored in the upload directory
#[tokio::test]
async fn test_multipart_upload() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(body_parser(BodyParserOptions {
        upload_dir: Some(dir.path().to_path_buf()),
        keep_extensions: true,
        ..Default::default()
    }));
    server
        .post("/upload", |req: &mut Request, res: &mut Response| -> HandlerResult {
            let file = req.files.get("doc").expect("uploaded file");
            res.send(json!({
                "title": req.params.get("title"),
                "path": file.path,
                "name": file.name,
                "size": file.size,
                "type": file.content_type,
            }));
            Ok(Next::Stop)
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let multipart = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
        "report\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"doc\"; filename=\"r.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "hello upload\r\n",
        "--XBOUNDARY--\r\n",
    );
    let resp = t
        .post_raw(
            "/upload",
            "multipart/form-data; boundary=XBOUNDARY",
            multipart.as_bytes().to_vec(),
        )
        .await;
    assert_status(&resp, StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["title"], "report");
    assert_eq!(body["name"], "r.txt");
    assert_eq!(body["size"], 12);
    assert_eq!(body["type"], "text/plain");

    let path = std::path::PathBuf::from(body["path"].as_str().unwrap());
    assert!(path.starts_with(dir.path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello upload");

    t.close().await;
}

/// Test the token bucket rejects bursts with 429
#[tokio::test]
async fn test_throttle() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.pre(throttle(ThrottleOptions {
        burst: 2,
        rate: 0.001,
        ..Default::default()
    }));
    server.get("/limited", echo_body).unwrap();
    let t = TestServer::start(server).await;

    assert_status(&t.get("/limited").await, StatusCode::OK);
    assert_status(&t.get("/limited").await, StatusCode::OK);
    let message = assert_error(
        t.get("/limited").await,
        StatusCode::TOO_MANY_REQUESTS,
        "RequestThrottled",
    )
    .await;
    assert!(message.contains("request rate"), "{}", message);

    t.close().await;
}

/// Test gzip compression of large bodies
#[tokio::test]
async fn test_gzip_response() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server
        .use_handler(full_response())
        .use_handler(gzip_response(GzipOptions::default()));
    server
        .get("/big", |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(json!({ "data": "x".repeat(2048) }));
            Ok(Next::Stop)
        })
        .unwrap();
    server
        .get("/small", |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(json!({ "ok": true }));
            Ok(Next::Stop)
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .get_with_headers("/big", &[("accept-encoding", "gzip")])
        .await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-encoding", "gzip");
    assert_has_header(&resp, "content-md5");
    let compressed = resp.bytes().await.unwrap();

    let mut decoded = String::new();
    GzDecoder::new(&compressed[..])
        .read_to_string(&mut decoded)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(value["data"].as_str().unwrap().len(), 2048);

    let resp = t
        .get_with_headers("/small", &[("accept-encoding", "gzip")])
        .await;
    assert!(resp.headers().get("content-encoding").is_none());

    let resp = t.get("/big").await;
    assert!(resp.headers().get("content-encoding").is_none());

    t.close().await;
}

/// Test CORS decoration and preflight handling
#[tokio::test]
async fn test_cors() {
    let options = CorsOptions {
        origins: vec!["https://app.example".to_string()],
        credentials: true,
        ..Default::default()
    };
    let server = TestServer::build(ServerOptions::new("plugins").with_cors(options.clone()));
    server.use_handler(cors(options));
    server.get("/data", echo_body).unwrap();
    server.put("/data", echo_body).unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .get_with_headers("/data", &[("origin", "https://app.example")])
        .await;
    assert_header(&resp, "access-control-allow-origin", "https://app.example");
    assert_header(&resp, "access-control-allow-credentials", "true");

    let resp = t
        .get_with_headers("/data", &[("origin", "https://evil.example")])
        .await;
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    let resp = t
        .client
        .request(reqwest::Method::OPTIONS, t.url("/data"))
        .header("origin", "https://app.example")
        .header("access-control-request-method", "PUT")
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "access-control-allow-origin", "https://app.example");
    assert_header(&resp, "access-control-max-age", "3600");
    let methods = resp
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("PUT"), "{}", methods);

    t.close().await;
}

/// Test If-None-Match and If-Match against a handler-provided ETag
#[tokio::test]
async fn test_conditional_request() {
    let mut chain = HandlerChain::new().with(
        |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.set_etag("v1");
            Ok(Next::Continue)
        },
    );
    chain.extend(&conditional_request());
    let chain = chain.with(|_: &mut Request, res: &mut Response| -> HandlerResult {
        res.send(json!({ "doc": 1 }));
        Ok(Next::Stop)
    });

    let server = TestServer::build(ServerOptions::new("plugins"));
    server.get("/doc", chain.clone()).unwrap();
    server.put("/doc", chain).unwrap();
    let t = TestServer::start(server).await;

    let resp = t.get("/doc").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "etag", "\"v1\"");

    let resp = t
        .get_with_headers("/doc", &[("if-none-match", "\"v1\"")])
        .await;
    assert_status(&resp, StatusCode::NOT_MODIFIED);

    let resp = t
        .client
        .put(t.url("/doc"))
        .header("if-match", "\"v0\"")
        .send()
        .await
        .unwrap();
    assert_error(resp, StatusCode::PRECONDITION_FAILED, "PreconditionFailed").await;

    t.close().await;
}

/// Test basic credentials set the username
#[tokio::test]
async fn test_authorization() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(authorization_parser());
    server
        .get("/me", |req: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(json!({ "user": req.username }));
            Ok(Next::Stop)
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .client
        .get(t.url("/me"))
        .basic_auth("ada", Some("lovelace"))
        .send()
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["user"], "ada");

    assert_eq!(body_json(t.get("/me").await).await["user"], "anonymous");

    assert_error(
        t.get_with_headers("/me", &[("authorization", "Basic")]).await,
        StatusCode::BAD_REQUEST,
        "InvalidHeader",
    )
    .await;

    t.close().await;
}

/// Test JSONP wraps the payload in the callback
#[tokio::test]
async fn test_jsonp() {
    let server = TestServer::build(ServerOptions::new("plugins"));
    server.use_handler(jsonp());
    server
        .get("/feed", |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(json!({ "n": 1 }));
            Ok(Next::Stop)
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let resp = t.get("/feed?callback=render").await;
    assert_status(&resp, StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/javascript"), "{}", content_type);
    let body = resp.text().await.unwrap();
    assert!(body.contains("render("), "{}", body);
    assert!(body.contains("{\"n\":1}"), "{}", body);

    t.close().await;
}

/// Test full_response headers
#[tokio::test]
async fn test_full_response_headers() {
    let server = TestServer::build(
        ServerOptions::new("plugins").with_response_time_formatter(|d: Duration| {
            format!("{}ms", d.as_millis())
        }),
    );
    server.use_handler(full_response());
    server
        .get("/hello", |_: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(json!("hello"));
            Ok(Next::Stop)
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let resp = t.get("/hello").await;
    assert_status(&resp, StatusCode::OK);
    assert_has_header(&resp, "date");
    assert_has_header(&resp, "response-time");
    assert_header(&resp, "content-length", "7");
    // md5("\"hello\"")
    assert_has_header(&resp, "content-md5");
    let rt = resp.headers()["x-response-time"].to_str().unwrap();
    assert!(rt.ends_with("ms"), "{}", rt);

    t.close().await;
}
