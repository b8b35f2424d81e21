//! The crate's clients against a live server.

use crate::helpers::*;
use reqwest::StatusCode;
use serde_json::json;
use tokio_rest::client::{
    create_json_client, create_string_client, ClientError, ClientOptions, RetryPolicy,
};
use tokio_rest::core::{Request, Response};
use tokio_rest::errors::RestErrorKind;
use tokio_rest::middleware::{body_parser, BodyParserOptions, HandlerResult, Next};
use tokio_rest::router::RouteOptions;
use tokio_rest::server::ServerOptions;
use tokio_rest::HttpError;

async fn start() -> TestServer {
    let server = TestServer::build(ServerOptions::new("clients"));
    server.use_handler(body_parser(BodyParserOptions::default()));
    server
        .post("/echo", |req: &mut Request, res: &mut Response| -> HandlerResult {
            res.send_status(StatusCode::CREATED, json!({ "got": req.body }));
            Ok(Next::Stop)
        })
        .unwrap();
    server
        .post("/form", |req: &mut Request, res: &mut Response| -> HandlerResult {
            let user = req.params.get("user").cloned().unwrap_or_default();
            res.set_content_type("text/plain");
            res.send(format!("hi {}", user));
            Ok(Next::Stop)
        })
        .unwrap();
    server
        .get(
            RouteOptions::new("/versioned").version("1.4.0"),
            |_: &mut Request, res: &mut Response| -> HandlerResult {
                res.send(json!({ "v": 1 }));
                Ok(Next::Stop)
            },
        )
        .unwrap();
    server
        .get("/gone/:id", |req: &mut Request, _: &mut Response| -> HandlerResult {
            Err(HttpError::new(
                RestErrorKind::ResourceNotFound,
                format!("{} was removed", req.params["id"]),
            ))
        })
        .unwrap();
    TestServer::start(server).await
}

fn options(t: &TestServer) -> ClientOptions {
    ClientOptions::new(t.base_url.clone()).with_retry(RetryPolicy::none())
}

/// Test a JSON round trip through server and client
#[tokio::test]
async fn test_json_client_round_trip() {
    let t = start().await;
    let client = create_json_client(options(&t)).unwrap();

    let res = client.post("/echo", &json!({ "a": [1, 2] })).await.unwrap();
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["got"]["a"], json!([1, 2]));
    assert!(res.header("request-id").is_some());

    t.close().await;
}

/// Test server errors are rebuilt on the client side
#[tokio::test]
async fn test_json_client_error() {
    let t = start().await;
    let client = create_json_client(options(&t)).unwrap();

    let err = client.get("/gone/7").await.unwrap_err();
    let ClientError::Http { error, response } = err else {
        panic!("expected an HTTP error");
    };
    assert!(error.is(RestErrorKind::ResourceNotFound));
    assert_eq!(error.message(), "7 was removed");
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    t.close().await;
}

/// Test Accept-Version flows from client options
#[tokio::test]
async fn test_client_version() {
    let t = start().await;

    let client = create_json_client(options(&t).with_version("~1")).unwrap();
    let res = client.get("/versioned").await.unwrap();
    assert_eq!(res.header("api-version"), Some("1.4.0"));

    let client = create_json_client(options(&t).with_version("~2")).unwrap();
    let err = client.get("/versioned").await.unwrap_err();
    assert!(err.http_error().unwrap().is(RestErrorKind::InvalidVersion));

    t.close().await;
}

/// Test form posts through the string client
#[tokio::test]
async fn test_string_client_form() {
    let t = start().await;
    let client = create_string_client(options(&t)).unwrap();

    let res = client
        .post_form("/form", &[("user", "grace hopper")])
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "hi grace hopper");

    t.close().await;
}
