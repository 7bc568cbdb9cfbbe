//! Upload service client — forwards uploads, fetches assets, and issues
//! the compensating delete for orphaned files.

use std::time::Duration;

use axum::body::Bytes;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileServeError {
    #[error("upload service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload service timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("upload service reply was not JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A stored file as reported back by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub filename: String,
}

/// Upload service reply for the create-location flow: the client ships the
/// location metadata alongside the image and gets back resized variants.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpload {
    pub location: UploadedLocationMeta,
    pub images: UploadedImages,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedLocationMeta {
    pub title: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub long: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImages {
    pub xlarge: String,
    pub large: String,
    pub normal: String,
    pub small: String,
    pub name: String,
}

/// Outcome of forwarding an upload: the service's status plus parsed body.
/// Status >= 400 means the upload was rejected and the body is the
/// service's error shape, passed through to the caller.
pub struct UploadOutcome {
    pub status: u16,
    pub body: Value,
}

impl UploadOutcome {
    pub fn accepted(&self) -> bool {
        self.status < 400
    }

    /// Error message from a rejection body, if the service provided one.
    pub fn message(&self) -> String {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("upload rejected")
            .to_string()
    }
}

pub struct FileServe {
    client: reqwest::Client,
    base: String,
    timeout: Duration,
}

impl FileServe {
    pub fn new(base: impl Into<String>, timeout_secs: u64) -> Self {
        FileServe {
            client: reqwest::Client::new(),
            base: base.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Forward a raw upload body to the service and parse its JSON reply.
    pub async fn forward_upload(
        &self,
        path: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UploadOutcome, FileServeError> {
        let mut request = self.client.post(format!("{}/{path}", self.base)).body(body);
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }

        let secs = self.timeout.as_secs();
        let fut = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            Ok::<_, FileServeError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| FileServeError::Timeout { secs })??;

        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(UploadOutcome { status, body })
    }

    /// Stream a stored asset back to the caller (image proxy route).
    pub async fn fetch(&self, file_id: &str) -> Result<reqwest::Response, FileServeError> {
        let secs = self.timeout.as_secs();
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .get(format!("{}/file/{file_id}", self.base))
                .send(),
        )
        .await
        .map_err(|_| FileServeError::Timeout { secs })??;
        Ok(response)
    }

    /// Best-effort delete for an asset whose metadata registration was
    /// rejected downstream. Runs detached; failure is only logged.
    pub fn spawn_delete(&self, file_id: String) {
        let client = self.client.clone();
        let url = format!("{}/file/{file_id}", self.base);
        let timeout = self.timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, client.delete(&url).send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    tracing::debug!(file_id = %file_id, "orphaned upload deleted");
                }
                Ok(Ok(response)) => {
                    tracing::warn!(file_id = %file_id, status = %response.status(), "orphaned upload delete rejected");
                }
                Ok(Err(e)) => {
                    tracing::warn!(file_id = %file_id, error = %e, "orphaned upload delete failed");
                }
                Err(_) => {
                    tracing::warn!(file_id = %file_id, "orphaned upload delete timed out");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_accepted_threshold() {
        let ok = UploadOutcome {
            status: 201,
            body: json!({"_id": "f1", "filename": "a.jpg"}),
        };
        assert!(ok.accepted());

        let rejected = UploadOutcome {
            status: 413,
            body: json!({"message": "too large"}),
        };
        assert!(!rejected.accepted());
        assert_eq!(rejected.message(), "too large");
    }

    #[test]
    fn rejection_without_message_has_fallback() {
        let rejected = UploadOutcome {
            status: 500,
            body: json!({}),
        };
        assert_eq!(rejected.message(), "upload rejected");
    }

    #[test]
    fn stored_file_parses_service_shape() {
        let stored: StoredFile =
            serde_json::from_value(json!({"_id": "abc", "filename": "pic.jpg"})).unwrap();
        assert_eq!(stored.id, "abc");
        assert_eq!(stored.filename, "pic.jpg");
    }

    #[test]
    fn location_upload_parses_service_shape() {
        let upload: LocationUpload = serde_json::from_value(json!({
            "location": {"title": "Harbor", "categories": ["food"], "long": 9.17, "lat": 47.66},
            "images": {"xlarge": "x", "large": "l", "normal": "n", "small": "s", "name": "pic.jpg"},
        }))
        .unwrap();
        assert_eq!(upload.location.title, "Harbor");
        assert_eq!(upload.images.name, "pic.jpg");
    }
}
