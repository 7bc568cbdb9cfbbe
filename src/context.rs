//! Caller context — per-request identity derived from cookies.
//!
//! A middleware stage builds the context exactly once per request from the
//! session and device cookies and stores it in the request extensions;
//! handlers receive it as an extractor parameter. There is no ambient or
//! global caller state anywhere else.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::AppState;
use crate::error::{GatewayError, Result};
use crate::pattern::PatternSeed;
use crate::session::{self, SessionUser, DEVICE_COOKIE, SESSION_COOKIE};

/// Sentinel used on the wire when the caller is not authenticated or has
/// no device cookie. Downstream services rely on it for authorization.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Authenticated user, decoded from a valid session cookie.
    pub user: Option<SessionUser>,
    /// Device id from the device cookie, set by device registration.
    pub device_id: Option<String>,
}

impl CallerContext {
    pub fn from_headers(headers: &HeaderMap, cookie_secret: &[u8]) -> Self {
        let user = cookie_value(headers, SESSION_COOKIE)
            .and_then(|v| session::decode_session(&v, cookie_secret));
        let device_id =
            cookie_value(headers, DEVICE_COOKIE).and_then(|v| session::decode_device(&v));
        CallerContext { user, device_id }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn require_user(&self) -> Result<&SessionUser> {
        self.user.as_ref().ok_or(GatewayError::Unauthorized)
    }

    /// Identity of the caller as dispatched downstream.
    pub fn user_id(&self) -> &str {
        self.user.as_ref().map(|u| u.id.as_str()).unwrap_or(UNKNOWN)
    }

    pub fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or(UNKNOWN)
    }

    /// Fresh pattern seed carrying this caller's identity.
    pub fn seed(&self) -> PatternSeed {
        PatternSeed::new(self.user_id(), self.device_id())
    }
}

/// Find a cookie by name across all `Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Middleware: derive the caller context once and attach it to the request.
pub async fn attach_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = CallerContext::from_headers(request.headers(), state.config.cookie_secret.as_bytes());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn anonymous_without_cookies() {
        let ctx = CallerContext::from_headers(&HeaderMap::new(), SECRET);
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user_id(), UNKNOWN);
        assert_eq!(ctx.device_id(), UNKNOWN);
    }

    #[test]
    fn context_from_both_cookies() {
        let user = SessionUser {
            id: "u1".into(),
            mail: "a@b.de".into(),
            name: "alice".into(),
            device_id: "d-1".into(),
        };
        let session = session::encode_session(&user, SECRET, 365);
        let device = session::encode_device(&json!({"device_id": "d-1"}));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("locator_session={session}; locator={device}")).unwrap(),
        );

        let ctx = CallerContext::from_headers(&headers, SECRET);
        assert_eq!(ctx.user_id(), "u1");
        assert_eq!(ctx.device_id(), "d-1");

        let seed = ctx.seed();
        assert_eq!(seed.requesting_user_id, "u1");
        assert_eq!(seed.requesting_device_id, "d-1");
    }

    #[test]
    fn invalid_session_cookie_degrades_to_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("locator_session=garbage"));
        let ctx = CallerContext::from_headers(&headers, SECRET);
        assert!(!ctx.is_authenticated());
        assert!(ctx.require_user().is_err());
    }
}
