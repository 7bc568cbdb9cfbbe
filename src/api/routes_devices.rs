//! Device routes — registration binds the app install to a device cookie.

use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::{response, AppState};
use crate::context::CallerContext;
use crate::error::GatewayError;
use crate::pattern::Role;
use crate::session::{self, DEVICE_COOKIE};

/// Register a device. The payload (push transport, locale, an optional
/// prior device id) is passed through to the backend, which answers with
/// the session data the device cookie must carry. An unknown prior device
/// id is fine; the backend issues a fresh one.
pub async fn register(
    State(state): State<AppState>,
    ctx: CallerContext,
    Json(payload): Json<Value>,
) -> Response {
    let pattern = ctx
        .seed()
        .entity("device")
        .build("register", payload, Role::User);

    let failed = |detail: String| {
        state.alerts.error("error registering device:".to_string());
        state.alerts.error(detail);
        GatewayError::bad_request("device registration failed").into_response()
    };

    let envelope = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "device register dispatch failed");
            return failed(e.to_string());
        }
    };
    let data = match response::unwrap(envelope) {
        Ok(data) => data,
        Err(e) => return failed(e.to_string()),
    };

    let Some(session_data) = data.get("session_data") else {
        tracing::error!("device register reply is missing session_data");
        return failed("device register reply is missing session_data".to_string());
    };

    let cookie = session::encode_device(session_data);
    (
        StatusCode::CREATED,
        [(
            SET_COOKIE,
            session::set_cookie(DEVICE_COOKIE, &cookie, state.config.cookie_ttl_days),
        )],
        response::ok(json!({"message": "device registered, locator cookie was set"})),
    )
        .into_response()
}

pub async fn push_info() -> Response {
    GatewayError::not_implemented("push info is not available yet").into_response()
}
