//! Mesh client — delivers dispatch patterns to the backend RPC mesh.
//!
//! The mesh itself (routing, service discovery, persistence) lives
//! downstream and is consumed through a single operation:
//! `dispatch(pattern) -> envelope`. One attempt per call, no retry; the
//! only policy this layer adds is a fixed per-dispatch deadline.
//!
//! Secondary dispatches (push notifications, device unregister) go through
//! [`spawn_secondary`]: a detached task whose outcome is logged and never
//! joined with the reply path.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::pattern::Pattern;

/// The backend's reply shape. Exactly one of `error`/`data` is meaningful;
/// the unwrapper in `api::response` enforces that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub msg: String,
    /// Human-readable detail, passed through to mapped client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Envelope {
    pub fn data(value: Value) -> Self {
        Envelope {
            error: None,
            data: Some(value),
        }
    }

    pub fn error(msg: impl Into<String>, detail: impl Into<String>) -> Self {
        Envelope {
            error: Some(EnvelopeError {
                msg: msg.into(),
                detail: Some(detail.into()),
            }),
            data: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mesh dispatch timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The mesh answered outside 2xx. `message` is whatever the transport
    /// surfaced; it is matched by a few handlers for known failure text
    /// and otherwise treated as opaque.
    #[error("mesh rejected dispatch ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("mesh envelope decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Abstract dispatch seam. Object-safe so handlers can share one
/// `Arc<dyn Mesh>` and tests can substitute a recording implementation.
pub trait Mesh: Send + Sync {
    fn dispatch(&self, pattern: Pattern) -> BoxFuture<'_, Result<Envelope, MeshError>>;
}

/// Production transport: POSTs the pattern as JSON to the mesh endpoint.
pub struct HttpMesh {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpMesh {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        HttpMesh {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn send(&self, pattern: &Pattern) -> Result<Envelope, MeshError> {
        let response = self.client.post(&self.url).json(pattern).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            // Failure bodies are `{message}` when the backend produced
            // them, arbitrary text when a proxy did.
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(MeshError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl Mesh for HttpMesh {
    fn dispatch(&self, pattern: Pattern) -> BoxFuture<'_, Result<Envelope, MeshError>> {
        Box::pin(async move {
            let secs = self.timeout.as_secs();
            match tokio::time::timeout(self.timeout, self.send(&pattern)).await {
                Ok(result) => result,
                Err(_) => Err(MeshError::Timeout { secs }),
            }
        })
    }
}

/// Fire-and-forget dispatch for notifications and cleanup. The primary
/// reply is already built when this is called; whatever happens here is
/// only logged.
pub fn spawn_secondary(mesh: Arc<dyn Mesh>, pattern: Pattern, what: &'static str) {
    tokio::spawn(async move {
        let cmd = pattern.cmd.clone();
        match mesh.dispatch(pattern).await {
            Ok(envelope) => match envelope.error {
                Some(err) => {
                    tracing::warn!(what, cmd = %cmd, code = %err.msg, "secondary dispatch rejected")
                }
                None => tracing::debug!(what, cmd = %cmd, "secondary dispatch delivered"),
            },
            Err(e) => tracing::warn!(what, cmd = %cmd, error = %e, "secondary dispatch failed"),
        }
    });
}
