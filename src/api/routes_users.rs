//! User routes — auth, follows, and profile reads.
//!
//! Login and register are the two handlers that touch cookies: both
//! require a registered device (412 otherwise), set the session cookie
//! from the backend's profile reply, and clear the device cookie it
//! replaces. Logout replies first and unregisters the device with a
//! secondary dispatch.

use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{self, response, validate, AppState};
use crate::context::CallerContext;
use crate::error::GatewayError;
use crate::mesh::{spawn_secondary, MeshError};
use crate::pattern::Role;
use crate::session::{self, SessionUser, DEVICE_COOKIE, SESSION_COOKIE};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub mail: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub mail: String,
    pub password: String,
    pub name: String,
    pub residence: String,
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    pub count: Option<String>,
}

/// Map a raw dispatch failure onto a 400, forwarding backend-produced
/// failure text and hiding transport noise.
fn bad_request_from(e: MeshError) -> GatewayError {
    match e {
        MeshError::Backend { message, .. } => GatewayError::bad_request(message),
        other => {
            tracing::warn!(error = %other, "dispatch failed");
            GatewayError::bad_request("backend unavailable")
        }
    }
}

/// Session cookie content from a login/register profile reply.
fn session_from_profile(profile: &Value, device_id: &str) -> Option<SessionUser> {
    Some(SessionUser {
        id: profile.get("_id")?.as_str()?.to_string(),
        mail: profile.get("mail")?.as_str()?.to_string(),
        name: profile.get("name")?.as_str()?.to_string(),
        device_id: device_id.to_string(),
    })
}

fn reply_with_session(
    state: &AppState,
    status: StatusCode,
    profile: Value,
    device_id: &str,
) -> Response {
    let Some(user) = session_from_profile(&profile, device_id) else {
        tracing::error!("auth reply is missing profile fields, cannot build session");
        return GatewayError::Internal.into_response();
    };
    let value = session::encode_session(
        &user,
        state.config.cookie_secret.as_bytes(),
        state.config.cookie_ttl_days,
    );
    (
        status,
        AppendHeaders([
            (
                SET_COOKIE,
                session::set_cookie(SESSION_COOKIE, &value, state.config.cookie_ttl_days),
            ),
            // The device is now bound to the session; drop the loose cookie.
            (SET_COOKIE, session::clear_cookie(DEVICE_COOKIE)),
        ]),
        response::ok(profile),
    )
        .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    ctx: CallerContext,
    Json(req): Json<LoginRequest>,
) -> Response {
    if ctx.is_authenticated() {
        return response::ok(json!({"message": "already registered and authenticated"}))
            .into_response();
    }
    let Some(device_id) = ctx.device_id.clone() else {
        return GatewayError::precondition("Register your device!").into_response();
    };
    if !validate::mail_ok(&req.mail) || !validate::password_ok(&req.password) {
        return GatewayError::bad_request("invalid mail or password format").into_response();
    }

    let pattern = ctx.seed().build(
        "login",
        json!({
            "mail": req.mail,
            "password": req.password,
            "requesting_device_id": device_id,
        }),
        Role::User,
    );

    let envelope = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "login dispatch failed");
            return GatewayError::Unauthorized.into_response();
        }
    };
    match response::unwrap(envelope) {
        Ok(profile) => reply_with_session(&state, StatusCode::OK, profile, &device_id),
        Err(e) => e.into_response(),
    }
}

pub async fn register(
    State(state): State<AppState>,
    ctx: CallerContext,
    Json(req): Json<RegisterRequest>,
) -> Response {
    if ctx.is_authenticated() {
        tracing::warn!(user_id = %ctx.user_id(), "already authenticated user wants to register");
        return response::ok(json!({"message": "already registered and authenticated"}))
            .into_response();
    }
    let Some(device_id) = ctx.device_id.clone() else {
        return GatewayError::precondition("Register your device!").into_response();
    };
    if !validate::mail_ok(&req.mail) || !validate::password_ok(&req.password) {
        return GatewayError::bad_request("invalid mail or password format").into_response();
    }
    if req.name.trim().is_empty() || req.residence.trim().is_empty() {
        return GatewayError::bad_request("name and residence are required").into_response();
    }

    let pattern = ctx.seed().entity("user").build(
        "register",
        json!({
            "mail": req.mail,
            "password": req.password,
            "name": req.name,
            "residence": req.residence,
            "requesting_device_id": device_id,
        }),
        Role::User,
    );

    let envelope = match state.mesh.dispatch(pattern).await {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "user register dispatch failed");
            return bad_request_from(e).into_response();
        }
    };
    match response::unwrap(envelope) {
        Ok(profile) => reply_with_session(&state, StatusCode::CREATED, profile, &device_id),
        Err(e) => e.into_response(),
    }
}

pub async fn logout(State(state): State<AppState>, ctx: CallerContext) -> Response {
    let user = match ctx.require_user() {
        Ok(user) => user.clone(),
        Err(e) => return e.into_response(),
    };

    // The device outlives the session: hand its id back as a device cookie
    // so the app can log in again without re-registering.
    let device_cookie = session::encode_device(&json!({"device_id": user.device_id}));
    let reply = (
        AppendHeaders([
            (SET_COOKIE, session::clear_cookie(SESSION_COOKIE)),
            (
                SET_COOKIE,
                session::set_cookie(DEVICE_COOKIE, &device_cookie, state.config.cookie_ttl_days),
            ),
        ]),
        response::ok(json!({"message": "You are logged out"})),
    )
        .into_response();

    let pattern = ctx.seed().entity("device").build(
        "unregister",
        json!({"device_id": user.device_id}),
        Role::User,
    );
    spawn_secondary(state.mesh.clone(), pattern, "device unregister");

    reply
}

pub async fn follow(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(to_follow): Path<String>,
) -> Response {
    let pattern = ctx.seed().build(
        "follow",
        json!({"to_follow": to_follow, "user_id": ctx.user_id()}),
        Role::User,
    );
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => response::ok(data).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => bad_request_from(e).into_response(),
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    ctx: CallerContext,
    Query(query): Query<ProfileQuery>,
) -> Response {
    if !ctx.is_authenticated() {
        return GatewayError::Unauthorized.into_response();
    }
    let user_id = ctx.user_id().to_string();
    profile(state, ctx, user_id, query).await
}

pub async fn get_user_by_id(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(user_id): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Response {
    profile(state, ctx, user_id, query).await
}

/// Profile read with optional count fan-out: the profile dispatch plus up
/// to two parallel `count` dispatches, merged into one reply.
async fn profile(
    state: AppState,
    ctx: CallerContext,
    user_id: String,
    query: ProfileQuery,
) -> Response {
    let filter = match query.count.as_deref() {
        None => validate::CountFilter::default(),
        Some(raw) => match validate::parse_count(raw) {
            Some(filter) => filter,
            None => {
                return GatewayError::bad_request("count must be locations, followers or both")
                    .into_response()
            }
        },
    };

    let seed = ctx.seed();
    let user_pattern = seed.build("getUserById", json!({"user_id": user_id}), Role::User);
    let location_pattern = filter.locations.then(|| {
        seed.clone().entity("location").by("userId").build(
            "count",
            json!({"user_id": user_id}),
            Role::Location,
        )
    });
    let follower_pattern = filter.followers.then(|| {
        seed.clone().entity("follower").by("userId").build(
            "count",
            json!({"user_id": user_id}),
            Role::User,
        )
    });

    let location_count = async {
        match location_pattern {
            Some(pattern) => Some(api::dispatch(&state, pattern).await),
            None => None,
        }
    };
    let follower_count = async {
        match follower_pattern {
            Some(pattern) => Some(api::dispatch(&state, pattern).await),
            None => None,
        }
    };
    let (profile_result, location_count, follower_count) = tokio::join!(
        api::dispatch(&state, user_pattern),
        location_count,
        follower_count
    );

    let mut profile = match profile_result {
        Ok(profile) => profile,
        Err(GatewayError::Mesh(e)) => return bad_request_from(e).into_response(),
        Err(e) => return e.into_response(),
    };
    if profile.is_null() {
        return GatewayError::not_found("user_id").into_response();
    }

    for (key, result) in [
        ("location_count", location_count),
        ("follower_count", follower_count),
    ] {
        let Some(result) = result else { continue };
        match result {
            Ok(value) => {
                let count = value.get("count").and_then(Value::as_u64).unwrap_or(0);
                if let Some(obj) = profile.as_object_mut() {
                    obj.insert(key.to_string(), json!(count));
                }
            }
            Err(GatewayError::Mesh(e)) => return bad_request_from(e).into_response(),
            Err(e) => return e.into_response(),
        }
    }

    response::ok(profile).into_response()
}

async fn following_for(state: &AppState, ctx: &CallerContext, user_id: &str) -> Response {
    let pattern = ctx
        .seed()
        .build("getfollowing", json!({"user_id": user_id}), Role::User);
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => response::ok(data).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => bad_request_from(e).into_response(),
    }
}

async fn followers_for(state: &AppState, ctx: &CallerContext, user_id: &str) -> Response {
    let pattern = ctx
        .seed()
        .build("getfollowers", json!({"user_id": user_id}), Role::User);
    match state.mesh.dispatch(pattern).await {
        Ok(envelope) => match response::unwrap(envelope) {
            Ok(data) => response::ok(data).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => bad_request_from(e).into_response(),
    }
}

pub async fn get_my_following(State(state): State<AppState>, ctx: CallerContext) -> Response {
    let user_id = ctx.user_id().to_string();
    following_for(&state, &ctx, &user_id).await
}

pub async fn get_following_by_user(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(user_id): Path<String>,
) -> Response {
    following_for(&state, &ctx, &user_id).await
}

pub async fn get_my_followers(State(state): State<AppState>, ctx: CallerContext) -> Response {
    let user_id = ctx.user_id().to_string();
    followers_for(&state, &ctx, &user_id).await
}

pub async fn get_followers_by_user(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(user_id): Path<String>,
) -> Response {
    followers_for(&state, &ctx, &user_id).await
}

pub async fn upload_avatar() -> Response {
    GatewayError::not_implemented("avatar registration is not available yet").into_response()
}
