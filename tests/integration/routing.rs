//! Routing, versioning and error responses over real connections.

use crate::helpers::*;
use reqwest::StatusCode;
use serde_json::json;
use tokio_rest::core::{Request, Response};
use tokio_rest::errors::{HttpError, HttpErrorKind, RestErrorKind};
use tokio_rest::middleware::{query_parser, HandlerResult, Next, QueryParserOptions};
use tokio_rest::router::RouteOptions;
use tokio_rest::server::ServerOptions;

fn echo(req: &mut Request, res: &mut Response) -> HandlerResult {
    res.send(json!({ "params": req.params, "route": req.route() }));
    Ok(Next::Stop)
}

/// Test path params reach the handler
#[tokio::test]
async fn test_path_params() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server.get("/users/:id/posts/:post", echo).unwrap();
    let t = TestServer::start(server).await;

    let resp = t.get("/users/42/posts/7").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json");
    assert_header(&resp, "server", "routing");
    assert_has_header(&resp, "x-response-time");
    assert_has_header(&resp, "request-id");

    let body = body_json(resp).await;
    assert_eq!(body["params"]["id"], "42");
    assert_eq!(body["params"]["post"], "7");

    t.close().await;
}

/// Test query params are mapped alongside path params
#[tokio::test]
async fn test_query_params() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server.use_handler(query_parser(QueryParserOptions::default()));
    server.get("/search/:kind", echo).unwrap();
    let t = TestServer::start(server).await;

    let body = body_json(t.get("/search/books?q=rust&page=2").await).await;
    assert_eq!(body["params"]["kind"], "books");
    assert_eq!(body["params"]["q"], "rust");
    assert_eq!(body["params"]["page"], "2");

    t.close().await;
}

/// Test 404 and 405 bodies
#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server.get("/things", echo).unwrap();
    let t = TestServer::start(server).await;

    let message = assert_error(
        t.get("/nothing").await,
        StatusCode::NOT_FOUND,
        "ResourceNotFound",
    )
    .await;
    assert_eq!(message, "/nothing does not exist");

    let resp = t.post_json("/things", &json!({})).await;
    assert_header(&resp, "allow", "GET");
    assert_error(resp, StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed").await;

    t.close().await;
}

/// Test handler errors become REST error bodies
#[tokio::test]
async fn test_handler_errors() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server
        .get("/conflict", |_: &mut Request, _: &mut Response| -> HandlerResult {
            Err(HttpError::new(HttpErrorKind::Conflict, "already exists"))
        })
        .unwrap();
    server
        .get("/missing", |_: &mut Request, _: &mut Response| -> HandlerResult {
            Err(HttpError::new(RestErrorKind::MissingParameter, "name is required"))
        })
        .unwrap();
    let t = TestServer::start(server).await;

    let message = assert_error(t.get("/conflict").await, StatusCode::CONFLICT, "Conflict").await;
    assert_eq!(message, "already exists");

    let message = assert_error(t.get("/missing").await, StatusCode::CONFLICT, "MissingParameter").await;
    assert_eq!(message, "name is required");

    t.close().await;
}

/// Test Accept-Version picks the highest satisfying route
#[tokio::test]
async fn test_versioned_routes() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server
        .get(
            RouteOptions::new("/hello").version("1.0.0"),
            |_: &mut Request, res: &mut Response| -> HandlerResult {
                res.send(json!({ "v": 1 }));
                Ok(Next::Stop)
            },
        )
        .unwrap();
    server
        .get(
            RouteOptions::new("/hello").versions(["2.0.0", "2.1.0"]),
            |_: &mut Request, res: &mut Response| -> HandlerResult {
                res.send(json!({ "v": 2 }));
                Ok(Next::Stop)
            },
        )
        .unwrap();
    let t = TestServer::start(server).await;

    let resp = t.get("/hello").await;
    assert_header(&resp, "api-version", "2.1.0");
    assert_eq!(body_json(resp).await["v"], 2);

    let resp = t.get_with_headers("/hello", &[("accept-version", "~1")]).await;
    assert_header(&resp, "api-version", "1.0.0");
    assert_eq!(body_json(resp).await["v"], 1);

    let resp = t.get_with_headers("/hello", &[("accept-version", "2.0.0")]).await;
    assert_header(&resp, "api-version", "2.0.0");

    assert_error(
        t.get_with_headers("/hello", &[("accept-version", "~3")]).await,
        StatusCode::BAD_REQUEST,
        "InvalidVersion",
    )
    .await;

    t.close().await;
}

/// Test HEAD falls back to the GET route with an empty body
#[tokio::test]
async fn test_head_uses_get_route() {
    let server = TestServer::build(ServerOptions::new("routing"));
    server.get("/doc", echo).unwrap();
    let t = TestServer::start(server).await;

    let resp = t.client.head(t.url("/doc")).send().await.unwrap();
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().len(), 0);

    t.close().await;
}

/// Test oversized bodies are rejected before routing
#[tokio::test]
async fn test_body_limit() {
    let server = TestServer::build(ServerOptions::new("routing").with_max_body_size(16));
    server.post("/upload", echo).unwrap();
    let t = TestServer::start(server).await;

    let resp = t
        .post_raw("/upload", "application/octet-stream", vec![b'x'; 64])
        .await;
    assert_error(resp, StatusCode::PAYLOAD_TOO_LARGE, "RequestEntityTooLarge").await;

    t.close().await;
}

/// Test removing a route at runtime
#[tokio::test]
async fn test_remove_route() {
    let server = TestServer::build(ServerOptions::new("routing"));
    let route = server.get("/temp", echo).unwrap();
    let t = TestServer::start(server).await;

    assert_status(&t.get("/temp").await, StatusCode::OK);
    assert!(t.server.rm(&route.name));
    assert_status(&t.get("/temp").await, StatusCode::NOT_FOUND);

    t.close().await;
}
