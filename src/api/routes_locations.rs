//! Location routes — queries, favorites, and text impressions.
//!
//! The backend reports an unknown location id as failure text containing
//! "Invalid id"; the handlers that take a location id from the path map
//! that onto a 404 with subject `location_id` instead of a generic 400.

use axum::extract::{Path, Query, State};
use axum::http::header::CACHE_CONTROL;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{self, response, AppState};
use crate::context::CallerContext;
use crate::error::GatewayError;
use crate::mesh::{spawn_secondary, MeshError};
use crate::pattern::{self, Role};

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub long: f64,
    pub lat: f64,
    #[serde(rename = "maxDistance", default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_max_distance() -> f64 {
    2.0
}

fn default_limit() -> u32 {
    20
}

// Bubble screen defaults: the home-screen view of the city center.
#[derive(Deserialize)]
pub struct BubblesQuery {
    #[serde(default = "default_bubble_long")]
    pub long: f64,
    #[serde(default = "default_bubble_lat")]
    pub lat: f64,
    #[serde(rename = "maxDistance", default = "default_bubble_distance")]
    pub max_distance: f64,
    #[serde(default = "default_bubble_limit")]
    pub limit: u32,
}

fn default_bubble_long() -> f64 {
    9.173626899719238
}

fn default_bubble_lat() -> f64 {
    47.66972243634168
}

fn default_bubble_distance() -> f64 {
    30_000.0
}

fn default_bubble_limit() -> u32 {
    6
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "locationName")]
    pub location_name: Option<String>,
    pub long: Option<f64>,
    pub lat: Option<f64>,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub location_id: String,
}

#[derive(Deserialize)]
pub struct TextImpressionRequest {
    pub data: String,
}

#[derive(Deserialize)]
pub struct SchoenhierRequest {
    pub long: f64,
    pub lat: f64,
}

fn invalid_id(e: &MeshError) -> bool {
    matches!(
        e,
        MeshError::Backend { message, .. }
            if message.contains("Invalid id") || message.contains("invalid location_id")
    )
}

fn nearby_data(query: &NearbyQuery) -> Value {
    json!({
        "long": query.long,
        "lat": query.lat,
        "maxDistance": query.max_distance,
        "limit": query.limit,
    })
}

pub async fn nearby(
    State(state): State<AppState>,
    ctx: CallerContext,
    Query(query): Query<NearbyQuery>,
) -> Response {
    let pattern = ctx
        .seed()
        .build("nearby", nearby_data(&query), Role::Location);
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn bubbles(
    State(state): State<AppState>,
    Query(query): Query<BubblesQuery>,
) -> Response {
    let pattern = pattern::build(
        "nearby",
        json!({
            "long": query.long,
            "lat": query.lat,
            "maxDistance": query.max_distance,
            "limit": query.limit,
        }),
        Role::Location,
    );
    match api::dispatch(&state, pattern).await {
        Ok(data) => (
            [(CACHE_CONTROL, "max-age=30")],
            response::ok(json!({"locations": data})),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Combined search: the backend by name (or nearby when no name is given)
/// plus the external place lookup, queried in parallel. Geocoder failures
/// degrade to an empty list; the backend result decides the reply.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let pattern = match &query.location_name {
        Some(name) => pattern::build(
            "locationbyname",
            json!({"locationName": name}),
            Role::Location,
        ),
        None => pattern::build(
            "nearby",
            json!({"long": query.long, "lat": query.lat}),
            Role::Location,
        ),
    };

    let (backend, places) = tokio::join!(
        api::dispatch(&state, pattern),
        state
            .geocoder
            .search(query.location_name.as_deref(), query.long, query.lat)
    );

    let locator = match backend {
        Ok(data) => data,
        Err(GatewayError::Mesh(e)) => {
            tracing::warn!(error = %e, "location search dispatch failed");
            return GatewayError::bad_request("location search failed").into_response();
        }
        Err(e) => return e.into_response(),
    };
    let google = places.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "place lookup failed, returning backend results only");
        Vec::new()
    });

    response::ok(json!({
        "google": google,
        "locator": locator,
    }))
    .into_response()
}

pub async fn location_by_id(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
) -> Response {
    let pattern = ctx.seed().build(
        "locationById",
        json!({"location_id": location_id}),
        Role::Location,
    );
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn location_stream(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
) -> Response {
    let pattern = pattern::build(
        "getlocationstream",
        json!({"location_id": location_id, "user_id": ctx.user_id()}),
        Role::Location,
    );
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => response::ok(data).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) if invalid_id(&e) => GatewayError::not_found("location_id").into_response(),
        Err(e) => GatewayError::Mesh(e).into_response(),
    }
}

pub async fn post_text_impression(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
    Json(req): Json<TextImpressionRequest>,
) -> Response {
    if req.data.trim().is_empty() {
        return GatewayError::bad_request("impression text must not be empty").into_response();
    }

    let pattern = ctx.seed().kind("text").build(
        "addimpression",
        json!({
            "location_id": location_id,
            "user_id": ctx.user_id(),
            "message": req.data,
        }),
        Role::Location,
    );

    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => {
                state.alerts.info(format!("new text impression: {}", req.data));
                response::ok(data).into_response()
            }
            Err(e) => e.into_response(),
        },
        Err(e) if invalid_id(&e) => GatewayError::not_found("location_id").into_response(),
        Err(e) => GatewayError::Mesh(e).into_response(),
    }
}

fn notify_new_favorator(state: &AppState, ctx: &CallerContext, location_id: &str) {
    let pattern = ctx.seed().entity("location").action("newFavorator").build(
        "notify",
        json!({
            "loc_id": location_id,
            "favorator_id": ctx.user_id(),
        }),
        Role::Notifications,
    );
    spawn_secondary(state.mesh.clone(), pattern, "new favorator push");
}

pub async fn toggle_favor(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
) -> Response {
    let pattern = ctx.seed().build(
        "toggleFavor",
        json!({"location_id": location_id, "user_id": ctx.user_id()}),
        Role::Location,
    );

    let data = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => data,
            Err(e) => return e.into_response(),
        },
        Err(e) if invalid_id(&e) => {
            return GatewayError::not_found("location_id").into_response()
        }
        Err(e) => return GatewayError::Mesh(e).into_response(),
    };

    let added = data.get("added").and_then(Value::as_bool).unwrap_or(false);
    let reply = response::ok(data).into_response();
    if added {
        notify_new_favorator(&state, &ctx, &location_id);
    }
    reply
}

async fn favor_op(
    state: &AppState,
    ctx: &CallerContext,
    location_id: &str,
    cmd: &str,
) -> Result<Response, Response> {
    let pattern = ctx.seed().build(
        cmd,
        json!({"location_id": location_id, "user_id": ctx.user_id()}),
        Role::Location,
    );
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => Ok(response::ok(data).into_response()),
            Err(e) => Err(e.into_response()),
        },
        Err(e) if invalid_id(&e) => Err(GatewayError::not_found("location_id").into_response()),
        Err(e) => Err(GatewayError::Mesh(e).into_response()),
    }
}

pub async fn favor(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
) -> Response {
    match favor_op(&state, &ctx, &location_id, "favor").await {
        Ok(reply) => {
            notify_new_favorator(&state, &ctx, &location_id);
            reply
        }
        Err(reply) => reply,
    }
}

pub async fn unfavor(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(location_id): Path<String>,
) -> Response {
    match favor_op(&state, &ctx, &location_id, "unfavor").await {
        Ok(reply) | Err(reply) => reply,
    }
}

async fn favorites_for(state: &AppState, user_id: &str) -> Response {
    let pattern = pattern::build(
        "getfavoritelocationbyuserid",
        json!({"user_id": user_id}),
        Role::Location,
    );
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => response::ok(data).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) if invalid_id(&e) => GatewayError::not_found("user_id").into_response(),
        Err(e) => GatewayError::Mesh(e).into_response(),
    }
}

pub async fn my_favorites(State(state): State<AppState>, ctx: CallerContext) -> Response {
    favorites_for(&state, ctx.user_id()).await
}

pub async fn favorites_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    favorites_for(&state, &user_id).await
}

pub async fn locations_by_user(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(user_id): Path<String>,
) -> Response {
    let pattern = ctx
        .seed()
        .build("getlocbyuserid", json!({"user_id": user_id}), Role::Location);
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(GatewayError::Mesh(e)) => {
            tracing::warn!(error = %e, "locations by user dispatch failed");
            GatewayError::bad_request("could not load locations").into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_location(
    State(state): State<AppState>,
    ctx: CallerContext,
    Query(query): Query<DeleteQuery>,
) -> Response {
    let pattern = ctx.seed().build(
        "deletelocation",
        json!({"location_id": query.location_id}),
        Role::Location,
    );
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(GatewayError::Mesh(e)) => {
            tracing::warn!(error = %e, "delete location dispatch failed");
            GatewayError::bad_request("could not delete location").into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn post_schoenhier(
    State(state): State<AppState>,
    Json(req): Json<SchoenhierRequest>,
) -> Response {
    let pattern = pattern::build(
        "addschoenhier",
        json!({"long": req.long, "lat": req.lat}),
        Role::Location,
    );
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(GatewayError::Mesh(e)) => {
            tracing::warn!(error = %e, "schoenhier dispatch failed");
            GatewayError::bad_request("could not store marker").into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn schoenhier_nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Response {
    let pattern = pattern::build("nearbyschoenhier", nearby_data(&query), Role::Location);
    match api::dispatch(&state, pattern).await {
        Ok(data) => response::ok(data).into_response(),
        Err(GatewayError::Mesh(e)) => {
            tracing::warn!(error = %e, "schoenhier nearby dispatch failed");
            GatewayError::bad_request("could not search markers").into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_location(Path(_location_id): Path<String>) -> Response {
    GatewayError::not_implemented("location update is not available yet").into_response()
}
