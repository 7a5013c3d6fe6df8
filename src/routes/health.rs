//! Health check endpoints
//!
//! - /health, /healthz - liveness, always 200 while the process serves
//! - /ready, /readyz - readiness, 200 only when the store answers a lookup

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::db::schemas::AGENT_COLLECTION;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Backing store name (`memory` or `mongodb`)
    pub store: &'static str,
    pub mode: &'static str,
    pub timestamp: String,
    pub cache: CacheHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Percentage, 0..=100
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheHealth {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.size,
            max_entries: stats.max_size,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
        }
    }
}

fn build_health_response(state: &AppState, error: Option<String>) -> HealthResponse {
    HealthResponse {
        healthy: error.is_none(),
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.name(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        cache: state.cache.stats().into(),
        error,
    }
}

fn to_response(status: StatusCode, health: &HealthResponse) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(health)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Handle liveness check (/health, /healthz)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    to_response(StatusCode::OK, &build_health_response(state, None))
}

/// Handle readiness check (/ready, /readyz)
pub async fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    match state.store.get(AGENT_COLLECTION, "__readiness__").await {
        Ok(_) => to_response(StatusCode::OK, &build_health_response(state, None)),
        Err(e) => to_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &build_health_response(state, Some(e.to_string())),
        ),
    }
}
