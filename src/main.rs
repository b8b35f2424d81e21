//! Demo service: an in-memory todo list served with the full plugin stack.
//!
//! Configured entirely from the environment (see [`tokio_rest::config`]).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use http::StatusCode;
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;

use tokio_rest::config::Config;
use tokio_rest::core::{Request, Response};
use tokio_rest::errors::{HttpError, RestErrorKind};
use tokio_rest::middleware::{
    accept_parser, audit_logger, authorization_parser, body_parser, conditional_request, cors,
    date_parser, full_response, gzip_response, query_parser, request_logger, serve_static,
    throttle, BodyParserOptions, HandlerResult, Next, QueryParserOptions, RequestLoggerOptions,
};
use tokio_rest::router::RouteOptions;
use tokio_rest::server::{create_server, ServerOptions};

#[derive(Default)]
struct Todos {
    next_id: AtomicU64,
    items: RwLock<BTreeMap<u64, Value>>,
}

impl Todos {
    fn list(&self) -> Value {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Value::Array(items.values().cloned().collect())
    }

    fn get(&self, id: u64) -> Option<Value> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(&id).cloned()
    }

    fn insert(&self, title: &str) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let todo = json!({ "id": id, "title": title, "done": false });
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(id, todo.clone());
        todo
    }

    fn remove(&self, id: u64) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.remove(&id).is_some()
    }
}

fn todo_id(req: &Request) -> Result<u64, HttpError> {
    let raw = req.params.get("id").map(String::as_str).unwrap_or_default();
    raw.parse().map_err(|_| {
        HttpError::new(
            RestErrorKind::InvalidArgument,
            format!("{} is not a valid id", raw),
        )
    })
}

fn not_found(id: u64) -> HttpError {
    HttpError::new(
        RestErrorKind::ResourceNotFound,
        format!("todo {} does not exist", id),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    tokio_rest::logging::init(&config.logging)?;

    info!(version = tokio_rest::VERSION, "Starting tokio_rest demo...");
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut options: ServerOptions = config.server.server_options();
    if let Some(cors_options) = &config.plugins.cors {
        options = options.with_cors(cors_options.clone());
    }
    let server = create_server(options)?;

    server.pre(request_logger(RequestLoggerOptions::default()));
    if let Some(throttle_options) = config.plugins.throttle.clone() {
        server.pre(throttle(throttle_options));
    }

    server
        .use_handler(accept_parser(server.acceptable().to_vec()))
        .use_handler(authorization_parser())
        .use_handler(date_parser(None))
        .use_handler(query_parser(QueryParserOptions::default()))
        .use_handler(body_parser(BodyParserOptions::default()))
        .use_handler(conditional_request())
        .use_handler(full_response());
    if let Some(cors_options) = config.plugins.cors.clone() {
        server.use_handler(cors(cors_options));
    }
    if let Some(gzip_options) = config.plugins.gzip.clone() {
        server.use_handler(gzip_response(gzip_options));
    }
    if let Some(audit_options) = config.plugins.audit.clone() {
        server.on_after(audit_logger(audit_options));
    }

    let todos = Arc::new(Todos::default());

    let store = Arc::clone(&todos);
    server.get(
        "/todos",
        move |_req: &mut Request, res: &mut Response| -> HandlerResult {
            res.send(store.list());
            Ok(Next::Stop)
        },
    )?;

    let store = Arc::clone(&todos);
    server.get(
        "/todos/:id",
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let id = todo_id(req)?;
            let todo = store.get(id).ok_or_else(|| not_found(id))?;
            res.send(todo);
            Ok(Next::Stop)
        },
    )?;

    let store = Arc::clone(&todos);
    server.post(
        "/todos",
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let title = req
                .body
                .as_ref()
                .and_then(|b| b.get("title"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    HttpError::new(RestErrorKind::MissingParameter, "title is required")
                })?;
            let todo = store.insert(title);
            res.send_status(StatusCode::CREATED, todo);
            Ok(Next::Stop)
        },
    )?;

    let store = Arc::clone(&todos);
    server.del(
        "/todos/:id",
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let id = todo_id(req)?;
            if !store.remove(id) {
                return Err(not_found(id));
            }
            res.send_status(StatusCode::NO_CONTENT, ());
            Ok(Next::Stop)
        },
    )?;

    if let Some(static_options) = config.plugins.static_files.clone() {
        let route = RouteOptions::regex(Regex::new(r"^/public/.*$")?).name("static");
        server.get(route, serve_static(static_options))?;
    }

    let addr = server.listen(config.server.listen_addr).await?;
    info!(
        "{} listening at {}",
        server.name(),
        server.url().unwrap_or_else(|| addr.to_string())
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    server.close().await;
    Ok(())
}
