//! User report hook — forwards app reports to the team chat.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::{response, AppState};
use crate::error::GatewayError;

#[derive(Deserialize)]
pub struct ReportRequest {
    pub report: String,
}

pub async fn report(State(state): State<AppState>, Json(req): Json<ReportRequest>) -> Response {
    if req.report.trim().is_empty() {
        return GatewayError::bad_request("report must not be empty").into_response();
    }
    state
        .alerts
        .info(format!("!REPORT INCOMING!: {}", req.report));
    response::ok(json!({"ok": true})).into_response()
}
