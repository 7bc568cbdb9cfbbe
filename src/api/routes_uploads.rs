//! Upload routes — the handlers that talk to the upload service.
//!
//! An upload is forwarded to the file service first; its reply names the
//! stored asset, which is then registered against the target entity with a
//! mesh dispatch. When the backend rejects that registration the asset is
//! already stored, so a best-effort DELETE is issued to the upload service
//! while the rejection goes back to the caller unchanged.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::api::{response, AppState};
use crate::context::CallerContext;
use crate::error::GatewayError;
use crate::fileserve::{LocationUpload, StoredFile, UploadOutcome};
use crate::mesh::spawn_secondary;
use crate::pattern::Role;

async fn forward(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<UploadOutcome, Response> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    match state.fileserve.forward_upload("file", content_type, body).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!(error = %e, "unable to reach upload service");
            Err(GatewayError::bad_request("upload failed").into_response())
        }
    }
}

/// Pass an upload-service rejection through with its own status code.
fn rejection(outcome: &UploadOutcome) -> Response {
    let status =
        StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::BAD_REQUEST);
    response::err(status, "UPLOAD_REJECTED", &outcome.message())
}

pub async fn upload_image_impression(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    media_impression(state, ctx, location_id, "image", headers, body).await
}

pub async fn upload_video_impression(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    media_impression(state, ctx, location_id, "video", headers, body).await
}

pub async fn upload_audio_impression(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    media_impression(state, ctx, location_id, "audio", headers, body).await
}

async fn media_impression(
    state: AppState,
    ctx: CallerContext,
    location_id: String,
    kind: &'static str,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let outcome = match forward(&state, &headers, body).await {
        Ok(outcome) => outcome,
        Err(reply) => return reply,
    };
    if !outcome.accepted() {
        return rejection(&outcome);
    }

    let stored: StoredFile = match serde_json::from_value(outcome.body) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(error = %e, "unable to read upload service reply");
            return GatewayError::bad_request("upload failed").into_response();
        }
    };

    let pattern = ctx.seed().kind(kind).build(
        "addimpression",
        json!({
            "location_id": location_id,
            "user_id": ctx.user_id(),
            "file": {"id": stored.id, "name": stored.filename},
        }),
        Role::Location,
    );

    let envelope = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => envelope,
        Err(e) => return GatewayError::Mesh(e).into_response(),
    };
    match response::unwrap(envelope) {
        Ok(data) => {
            state
                .alerts
                .info(format!("new {kind} impression at location {location_id}"));
            if let Some(user) = &ctx.user {
                let push = ctx.seed().entity("newImpression").build(
                    "notify",
                    json!({
                        "location_id": location_id,
                        "user_id": user.id,
                        "user_name": user.name,
                        "type": kind,
                    }),
                    Role::Notifications,
                );
                spawn_secondary(state.mesh.clone(), push, "new impression push");
            }
            response::ok(data).into_response()
        }
        Err(e) => {
            // The asset is stored but nothing references it; clean it up.
            state.fileserve.spawn_delete(stored.id);
            e.into_response()
        }
    }
}

/// Create a location from an image upload: the file service stores the
/// image (with resized variants) and echoes the location metadata the app
/// shipped alongside it; the gateway enriches that with a place name and
/// registers the new location downstream.
pub async fn create_location(
    State(state): State<AppState>,
    ctx: CallerContext,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let outcome = match forward(&state, &headers, body).await {
        Ok(outcome) => outcome,
        Err(reply) => return reply,
    };
    if !outcome.accepted() {
        return rejection(&outcome);
    }

    let upload: LocationUpload = match serde_json::from_value(outcome.body) {
        Ok(upload) => upload,
        Err(e) => {
            tracing::error!(error = %e, "unable to read upload service reply");
            return GatewayError::bad_request("upload failed").into_response();
        }
    };

    let image_base = "/api/v2/locations/impression/image";
    let name = &upload.images.name;
    let mut location = json!({
        "user_id": ctx.user_id(),
        "title": upload.location.title,
        "categories": upload.location.categories,
        "favorites": [],
        "public": true,
        "geotag": {
            "type": "Point",
            "coordinates": [upload.location.long, upload.location.lat],
        },
        "images": {
            "xlarge": format!("{image_base}/{}/{name}", upload.images.xlarge),
            "large": format!("{image_base}/{}/{name}", upload.images.large),
            "normal": format!("{image_base}/{}/{name}", upload.images.normal),
            "small": format!("{image_base}/{}/{name}", upload.images.small),
        },
        "city": {"title": "Unknown", "place_id": "Unknown"},
    });

    match state
        .geocoder
        .reverse(upload.location.long, upload.location.lat)
        .await
    {
        Ok(place) => {
            location["city"] = json!({"title": place.title, "place_id": place.place_id});
        }
        Err(e) => {
            tracing::warn!(error = %e, "place lookup failed, keeping placeholder city");
        }
    }

    let pattern = ctx
        .seed()
        .build("addnewlocation", location, Role::Location);
    let envelope = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => envelope,
        Err(e) => return GatewayError::Mesh(e).into_response(),
    };
    let data = match response::unwrap(envelope) {
        Ok(data) => data,
        Err(e) => return e.into_response(),
    };

    state.alerts.info(format!(
        "new location '{}' created",
        upload.location.title
    ));

    let location_id = data.get("_id").and_then(Value::as_str);
    if let (Some(location_id), Some(user)) = (location_id, &ctx.user) {
        let push = ctx.seed().entity("newLocation").build(
            "notify",
            json!({
                "location_id": location_id,
                "user_id": user.id,
                "user_name": user.name,
            }),
            Role::Notifications,
        );
        spawn_secondary(state.mesh.clone(), push, "new location push");
    }

    response::ok(data).into_response()
}

/// Proxy a stored impression image back to the app. The trailing name
/// segment is cosmetic; the asset is addressed by its id.
pub async fn serve_impression_image(
    State(state): State<AppState>,
    Path((file_id, _name)): Path<(String, String)>,
) -> Response {
    let upstream = match state.fileserve.fetch(&file_id).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(error = %e, file_id = %file_id, "asset fetch failed");
            return GatewayError::not_found("file_id").into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = Body::from_stream(upstream.bytes_stream());

    match Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(body)
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "failed to build proxy response");
            GatewayError::Internal.into_response()
        }
    }
}
