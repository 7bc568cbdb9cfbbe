//! HTTP API — one thin handler per operation.
//!
//! Every handler follows the same shape: build a pattern (caller context
//! merged in by the middleware-provided seed), dispatch it over the mesh,
//! unwrap the envelope into a reply. Secondary dispatches (notifications,
//! chat alerts, upload cleanup) run detached after the reply is built.
//!
//! Routes: users (auth, follows, profiles), locations (queries,
//! favorites, impressions, uploads), devices, and the report hook.

pub mod response;
pub mod routes_dev;
pub mod routes_devices;
pub mod routes_locations;
pub mod routes_report;
pub mod routes_uploads;
pub mod routes_users;
pub mod validate;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};

use crate::alerts::AlertSink;
use crate::config::Config;
use crate::context;
use crate::error::Result;
use crate::fileserve::FileServe;
use crate::geocode::Geocoder;
use crate::mesh::Mesh;
use crate::pattern::Pattern;

#[derive(Clone)]
pub struct AppState {
    pub mesh: Arc<dyn Mesh>,
    pub alerts: Arc<dyn AlertSink>,
    pub geocoder: Arc<Geocoder>,
    pub fileserve: Arc<FileServe>,
    pub config: Arc<Config>,
}

/// Dispatch a primary pattern and unwrap its envelope. The canonical path
/// for every handler that does not need its own failure mapping.
pub(crate) async fn dispatch(state: &AppState, pattern: Pattern) -> Result<serde_json::Value> {
    let envelope = state.mesh.dispatch(pattern).await?;
    response::unwrap(envelope)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/report", post(routes_report::report))
        // Users
        .route("/api/v2/users/login", post(routes_users::login))
        .route("/api/v2/users/register", post(routes_users::register))
        .route("/api/v2/users/logout", post(routes_users::logout))
        .route(
            "/api/v2/users/follow/:to_follow",
            post(routes_users::follow),
        )
        .route("/api/v2/users/me", get(routes_users::get_me))
        .route(
            "/api/v2/users/me/following",
            get(routes_users::get_my_following),
        )
        .route(
            "/api/v2/users/me/followers",
            get(routes_users::get_my_followers),
        )
        .route("/api/v2/users/avatar", post(routes_users::upload_avatar))
        .route("/api/v2/users/:user_id", get(routes_users::get_user_by_id))
        .route(
            "/api/v2/users/:user_id/following",
            get(routes_users::get_following_by_user),
        )
        .route(
            "/api/v2/users/:user_id/followers",
            get(routes_users::get_followers_by_user),
        )
        // Locations
        .route(
            "/api/v2/locations",
            post(routes_uploads::create_location).delete(routes_locations::delete_location),
        )
        .route("/api/v2/locations/nearby", get(routes_locations::nearby))
        .route("/api/v2/locations/bubbles", get(routes_locations::bubbles))
        .route("/api/v2/locations/search", get(routes_locations::search))
        .route(
            "/api/v2/locations/schoenhier",
            post(routes_locations::post_schoenhier),
        )
        .route(
            "/api/v2/locations/schoenhier/nearby",
            get(routes_locations::schoenhier_nearby),
        )
        .route(
            "/api/v2/locations/favorites/me",
            get(routes_locations::my_favorites),
        )
        .route(
            "/api/v2/locations/favorites/:user_id",
            get(routes_locations::favorites_by_user),
        )
        .route(
            "/api/v2/locations/user/:user_id",
            get(routes_locations::locations_by_user),
        )
        .route(
            "/api/v2/locations/impression/image/:file_id/:name",
            get(routes_uploads::serve_impression_image),
        )
        .route(
            "/api/v2/locations/:location_id",
            get(routes_locations::location_by_id).put(routes_locations::update_location),
        )
        .route(
            "/api/v2/locations/:location_id/stream",
            get(routes_locations::location_stream),
        )
        .route(
            "/api/v2/locations/:location_id/impressions/text",
            post(routes_locations::post_text_impression),
        )
        .route(
            "/api/v2/locations/:location_id/impressions/image",
            post(routes_uploads::upload_image_impression),
        )
        .route(
            "/api/v2/locations/:location_id/impressions/video",
            post(routes_uploads::upload_video_impression),
        )
        .route(
            "/api/v2/locations/:location_id/impressions/audio",
            post(routes_uploads::upload_audio_impression),
        )
        .route(
            "/api/v2/locations/:location_id/favor",
            post(routes_locations::favor),
        )
        .route(
            "/api/v2/locations/:location_id/unfavor",
            post(routes_locations::unfavor),
        )
        .route(
            "/api/v2/locations/:location_id/togglefavor",
            post(routes_locations::toggle_favor),
        )
        // Devices
        .route("/api/v2/devices", post(routes_devices::register))
        .route("/api/v2/devices/pushinfo", post(routes_devices::push_info));

    if state.config.dev_routes {
        router = router
            .route("/develop/ping", get(routes_dev::ping))
            .route("/develop/context", get(routes_dev::show_context));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            context::attach_context,
        ))
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024)) // uploads pass through
        .with_state(state)
}
