//! Cookie codec — the signed session cookie and the plain device cookie.
//!
//! The session cookie carries the authenticated user (id, mail, name,
//! device id) as base64 JSON plus an HMAC-SHA256 tag over the payload:
//! `<payload_b64>.<mac_b64>`. Decoding verifies the tag and the embedded
//! expiry; any failure makes the caller anonymous, it never errors a
//! request. The device cookie is unsigned base64 JSON (`{device_id}`), set
//! by device registration and cleared again on login/register.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const SESSION_COOKIE: &str = "locator_session";
pub const DEVICE_COOKIE: &str = "locator";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub mail: String,
    pub name: String,
    pub device_id: String,
}

#[derive(Serialize, Deserialize)]
struct SessionPayload {
    #[serde(flatten)]
    user: SessionUser,
    issued_at: i64,
    expires_at: i64,
}

fn mac_b64(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac key of any length");
    mac.update(payload);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Encode and sign a session cookie value.
pub fn encode_session(user: &SessionUser, secret: &[u8], ttl_days: i64) -> String {
    let now = Utc::now().timestamp();
    let payload = SessionPayload {
        user: user.clone(),
        issued_at: now,
        expires_at: now + ttl_days * 86_400,
    };
    // Serialization of a plain struct with string/int fields cannot fail.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    let payload_b64 = URL_SAFE_NO_PAD.encode(&json);
    let tag = mac_b64(secret, payload_b64.as_bytes());
    format!("{payload_b64}.{tag}")
}

/// Decode a session cookie value. Returns None for bad structure, bad MAC,
/// or an expired session; all three are logged at debug and treated as
/// "not logged in".
pub fn decode_session(value: &str, secret: &[u8]) -> Option<SessionUser> {
    let (payload_b64, tag) = value.split_once('.')?;

    let expected = mac_b64(secret, payload_b64.as_bytes());
    if !constant_time_eq(tag.as_bytes(), expected.as_bytes()) {
        tracing::debug!("session cookie failed MAC verification");
        return None;
    }

    let json = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload: SessionPayload = serde_json::from_slice(&json).ok()?;

    if payload.expires_at <= Utc::now().timestamp() {
        tracing::debug!("session cookie expired");
        return None;
    }

    Some(payload.user)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Encode the device cookie value from arbitrary session data handed back
/// by device registration (base64 JSON, matching the mobile app's cookie
/// format).
pub fn encode_device(session_data: &serde_json::Value) -> String {
    let json = serde_json::to_vec(session_data).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Extract the device id from a device cookie value, if any.
pub fn decode_device(value: &str) -> Option<String> {
    let json = URL_SAFE_NO_PAD.decode(value).ok()?;
    let data: serde_json::Value = serde_json::from_slice(&json).ok()?;
    data.get("device_id")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

pub fn set_cookie(name: &str, value: &str, ttl_days: i64) -> String {
    format!(
        "{name}={value}; Path=/; HttpOnly; Max-Age={}",
        ttl_days * 86_400
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn user() -> SessionUser {
        SessionUser {
            id: "56e82bd5".into(),
            mail: "a@b.de".into(),
            name: "alice".into(),
            device_id: "d-1".into(),
        }
    }

    #[test]
    fn session_round_trip() {
        let cookie = encode_session(&user(), SECRET, 365);
        assert_eq!(decode_session(&cookie, SECRET), Some(user()));
    }

    #[test]
    fn tampered_session_is_rejected() {
        let cookie = encode_session(&user(), SECRET, 365);
        let (payload, _tag) = cookie.split_once('.').unwrap();

        // Re-sign with a different key: MAC must not verify.
        let forged = format!("{payload}.{}", mac_b64(b"other-secret", payload.as_bytes()));
        assert_eq!(decode_session(&forged, SECRET), None);

        // Flip payload bytes under the original tag.
        let mut chars: Vec<char> = cookie.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let flipped: String = chars.into_iter().collect();
        assert_eq!(decode_session(&flipped, SECRET), None);
    }

    #[test]
    fn expired_session_is_rejected() {
        let cookie = encode_session(&user(), SECRET, -1);
        assert_eq!(decode_session(&cookie, SECRET), None);
    }

    #[test]
    fn garbage_session_is_rejected() {
        assert_eq!(decode_session("not-a-cookie", SECRET), None);
        assert_eq!(decode_session("a.b", SECRET), None);
        assert_eq!(decode_session("", SECRET), None);
    }

    #[test]
    fn device_cookie_round_trip() {
        let value = encode_device(&json!({"device_id": "d-42", "push_token": "t"}));
        assert_eq!(decode_device(&value), Some("d-42".to_string()));
    }

    #[test]
    fn device_cookie_without_id_yields_none() {
        let value = encode_device(&json!({"something": "else"}));
        assert_eq!(decode_device(&value), None);
        assert_eq!(decode_device("%%%"), None);
    }

    #[test]
    fn cookie_builders() {
        let set = set_cookie(DEVICE_COOKIE, "abc", 365);
        assert!(set.starts_with("locator=abc; "));
        assert!(set.contains("Max-Age=31536000"));

        let clear = clear_cookie(SESSION_COOKIE);
        assert!(clear.contains("Max-Age=0"));
    }
}
