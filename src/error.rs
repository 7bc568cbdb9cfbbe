//! Error types — caller-facing client errors and backend dispatch failures.

use thiserror::Error;

use crate::mesh::MeshError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend reported that the requested entity does not exist.
    /// `subject` becomes the client-visible message verbatim.
    #[error("{subject}")]
    NotFound { subject: String },

    #[error("{reason}")]
    BadRequest { reason: String },

    #[error("missing authentication")]
    Unauthorized,

    #[error("{reason}")]
    PreconditionFailed { reason: String },

    #[error("{reason}")]
    NotImplemented { reason: String },

    /// The backend signalled an error code absent from the mapping table.
    /// Never shown to the caller; surfaces as a generic internal error.
    #[error("backend error code {code} has no client mapping")]
    UnmappedService { code: String },

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error("internal gateway error")]
    Internal,
}

impl GatewayError {
    pub fn not_found(subject: impl Into<String>) -> Self {
        GatewayError::NotFound {
            subject: subject.into(),
        }
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        GatewayError::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        GatewayError::PreconditionFailed {
            reason: reason.into(),
        }
    }

    pub fn not_implemented(reason: impl Into<String>) -> Self {
        GatewayError::NotImplemented {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
