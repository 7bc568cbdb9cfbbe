//! Reply envelope and the canonical backend-envelope unwrapper.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::mesh::Envelope;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    })
}

pub fn err(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }),
    )
        .into_response()
}

/// Normalize a backend envelope into the success payload or a client error.
///
/// Known error codes map 1:1 onto client errors with the backend's detail
/// as message. Unknown codes are logged once here and surface as a generic
/// internal error; the raw code never reaches the caller. Never panics.
pub fn unwrap(envelope: Envelope) -> Result<Value> {
    match envelope.error {
        None => Ok(envelope.data.unwrap_or(Value::Null)),
        Some(error) => match error.msg.as_str() {
            "NOT_FOUND" => Err(GatewayError::NotFound {
                subject: error.detail.unwrap_or_else(|| "not found".to_string()),
            }),
            _ => {
                tracing::error!(
                    code = %error.msg,
                    detail = ?error.detail,
                    "no client error mapping for backend error"
                );
                Err(GatewayError::UnmappedService { code: error.msg })
            }
        },
    }
}

pub fn from_error(e: GatewayError) -> Response {
    let (status, code, message) = match &e {
        GatewayError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        GatewayError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()),
        GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string()),
        GatewayError::PreconditionFailed { .. } => (
            StatusCode::PRECONDITION_FAILED,
            "PRECONDITION_FAILED",
            e.to_string(),
        ),
        GatewayError::NotImplemented { .. } => (
            StatusCode::NOT_IMPLEMENTED,
            "NOT_IMPLEMENTED",
            e.to_string(),
        ),
        // Already logged where it was detected (unwrap above).
        GatewayError::UnmappedService { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "an internal error occurred".to_string(),
        ),
        GatewayError::Mesh(err) => {
            tracing::warn!(error = %err, "unhandled mesh failure in handler");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "an internal error occurred".to_string(),
            )
        }
        GatewayError::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "an internal error occurred".to_string(),
        ),
    };
    err(status, code, &message)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        from_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshError;
    use serde_json::json;

    #[test]
    fn unwrap_returns_data_unchanged() {
        let data = json!({"_id": "u1", "name": "alice", "nested": {"n": [1, 2, 3]}});
        let result = unwrap(Envelope::data(data.clone())).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn unwrap_without_data_yields_null() {
        let result = unwrap(Envelope::default()).unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn unwrap_maps_not_found_with_detail() {
        let err = unwrap(Envelope::error("NOT_FOUND", "location does not exist")).unwrap_err();
        match err {
            GatewayError::NotFound { subject } => assert_eq!(subject, "location does not exist"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        // The client-visible message is the detail verbatim.
        assert_eq!(
            unwrap(Envelope::error("NOT_FOUND", "location does not exist"))
                .unwrap_err()
                .to_string(),
            "location does not exist"
        );
    }

    #[test]
    fn unwrap_unknown_code_is_generic_internal() {
        let err = unwrap(Envelope::error("DB_ON_FIRE", "oops")).unwrap_err();
        match &err {
            GatewayError::UnmappedService { code } => assert_eq!(code, "DB_ON_FIRE"),
            other => panic!("expected UnmappedService, got {other:?}"),
        }
        // And the HTTP mapping never leaks the code.
        let response = from_error(err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn from_error_status_mapping() {
        let cases = [
            (GatewayError::not_found("x"), StatusCode::NOT_FOUND),
            (GatewayError::bad_request("x"), StatusCode::BAD_REQUEST),
            (GatewayError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                GatewayError::precondition("x"),
                StatusCode::PRECONDITION_FAILED,
            ),
            (
                GatewayError::not_implemented("x"),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (GatewayError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
            (
                GatewayError::Mesh(MeshError::Timeout { secs: 30 }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(from_error(error).status(), status);
        }
    }
}
