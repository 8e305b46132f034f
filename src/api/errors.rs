//! Consistent JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::error::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::MalformedRecord(msg) => {
            json_error(StatusCode::BAD_REQUEST, "malformed_record", msg)
        }
        EngineError::WriteFailure(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "write_failure", msg)
        }
        EngineError::RecomputeTimeout(secs) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "recompute_timeout",
            format!("snapshot recomputation exceeded {secs}s and no earlier snapshot exists"),
        ),
        EngineError::UnknownKind(kind) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_kind",
            format!("unknown entity kind: {kind}"),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_entity_kind(s: &str) -> Result<crate::models::EntityKind, axum::response::Response> {
    crate::models::EntityKind::parse(s)
        .ok_or_else(|| engine_error_to_response(EngineError::unknown_kind(s)))
}
