//! HTTP server implementation
//!
//! Routes:
//! - /health, /healthz - liveness check
//! - /ready, /readyz - readiness check (store reachable)
//! - /api/v1/* - board API, JSON in and out

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cache::{self, TtlCache};
use crate::config::Args;
use crate::routes;
use crate::services::BoardService;
use crate::store::DocumentStore;
use crate::types::MadangError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<TtlCache<Value>>,
    pub board: BoardService,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn DocumentStore>) -> Self {
        let cache = Arc::new(TtlCache::new(args.cache_config()));
        // Agents start claimed in development; production claims happen out of band
        let board = BoardService::new(store.clone(), cache.clone(), args.admission_config(), args.dev_mode);
        Self {
            args,
            store,
            cache,
            board,
        }
    }
}

/// Run the HTTP server until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<(), MadangError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Madang listening on {} (store: {})", state.args.listen, state.store.name());

    if state.args.dev_mode {
        warn!("Development mode enabled - new agents are claimed on registration");
    }

    cache::spawn_cleanup_task(Arc::clone(&state.cache));
    info!("Cache enabled (max {} entries)", state.cache.config().max_entries);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(&state))
        }
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(&state).await)
        }

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        (_, p) if p == "/api/v1" || p.starts_with("/api/v1/") => {
            to_boxed(routes::handle_api_request(Arc::clone(&state), req).await)
        }

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a `Full<Bytes>` response to `BoxBody`
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", hyper::header::HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Headers",
        hyper::header::HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        hyper::header::HeaderValue::from_static("GET, POST, PATCH, OPTIONS"),
    );
    response
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::error_response(&MadangError::NotFound(format!("{} 경로를 찾을 수 없습니다.", path)))
}
