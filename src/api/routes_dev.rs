//! Development routes, mounted only with `dev_routes: true`.

use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::api::response;
use crate::context::CallerContext;

pub async fn ping() -> Response {
    response::ok(json!({"pong": true})).into_response()
}

/// Echo the caller context the middleware derived, for cookie debugging.
pub async fn show_context(ctx: CallerContext) -> Response {
    response::ok(json!({
        "user_id": ctx.user_id(),
        "device_id": ctx.device_id(),
        "authenticated": ctx.is_authenticated(),
    }))
    .into_response()
}
