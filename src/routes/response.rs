//! JSON envelopes shared by every route
//!
//! Success bodies are `{"success": true, ...data}`, failures are
//! `{"success": false, "error": ..., "hint"?: ...}`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::types::MadangError;

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build a success response, merging the fields of `data` next to `success`
pub fn json_response(status: StatusCode, data: Value) -> Response<Full<Bytes>> {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    match data {
        Value::Object(fields) => body.extend(fields),
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }
    build(status, &Value::Object(body), None)
}

/// Build the failure envelope for an error; 429 carries `Retry-After`
pub fn error_response(err: &MadangError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        debug!(status = status.as_u16(), error = %err, "Request rejected");
    }

    let mut body = json!({
        "success": false,
        "error": err.message(),
    });
    if let Some(hint) = err.hint() {
        body["hint"] = Value::String(hint);
    }
    build(status, &body, err.retry_after())
}

fn build(status: StatusCode, body: &Value, retry_after: Option<u64>) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();

    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*");
    if let Some(secs) = retry_after {
        builder = builder.header("Retry-After", secs.to_string());
    }

    builder.body(Full::new(Bytes::from(bytes))).unwrap_or_else(|_| {
        let mut fallback = Response::new(Full::new(Bytes::from_static(
            br#"{"success":false,"error":"Internal error"}"#,
        )));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Read and decode a JSON request body.
///
/// An empty body decodes as `{}` so that missing-field checks produce the
/// field-specific message.
pub async fn read_json_body<T: DeserializeOwned>(body: Incoming) -> Result<T, MadangError> {
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|_| MadangError::BadRequest("요청 본문을 읽을 수 없습니다.".into()))?
        .to_bytes();

    let slice: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };
    serde_json::from_slice(slice).map_err(|_| MadangError::BadRequest("잘못된 JSON 형식입니다.".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope_merges_fields() {
        let response = json_response(StatusCode::CREATED, json!({ "message": "안녕", "count": 2 }));
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "안녕");
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_rate_limited_envelope() {
        let err = MadangError::RateLimited {
            message: "너무 자주 글을 작성하고 있습니다.".into(),
            retry_after_secs: 42,
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "너무 자주 글을 작성하고 있습니다.");
        assert!(body["hint"].as_str().unwrap().contains("42"));
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_echoed() {
        let response = error_response(&MadangError::Database("connection reset".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "서버 오류가 발생했습니다.");
        assert!(body.get("hint").is_none());
    }
}
