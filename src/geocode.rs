//! Place lookup — enriches locations with human-readable place names.
//!
//! The collaborator is optional: without a configured URL every call
//! returns [`GeocodeError::Disabled`] and callers fall back to placeholder
//! values. Failures here never fail a request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub title: String,
    pub place_id: String,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder is not configured")]
    Disabled,

    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("geocoder timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("geocoder returned status {status}")]
    Status { status: u16 },
}

pub struct Geocoder {
    client: reqwest::Client,
    base: Option<String>,
    key: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    results: Vec<Place>,
}

impl Geocoder {
    pub fn new(base: Option<String>, key: Option<String>, timeout_secs: u64) -> Self {
        Geocoder {
            client: reqwest::Client::new(),
            base,
            key,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, None, 5)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GeocodeError> {
        let base = self.base.as_ref().ok_or(GeocodeError::Disabled)?;
        let mut request = self.client.get(format!("{base}/{path}")).query(query);
        if let Some(key) = &self.key {
            request = request.query(&[("key", key.as_str())]);
        }

        let secs = self.timeout.as_secs();
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| GeocodeError::Timeout { secs })??;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Name the place at a coordinate pair.
    pub async fn reverse(&self, long: f64, lat: f64) -> Result<Place, GeocodeError> {
        self.get(
            "reverse",
            &[("long", long.to_string()), ("lat", lat.to_string())],
        )
        .await
    }

    /// Free-text place search, optionally biased towards a coordinate pair.
    pub async fn search(
        &self,
        name: Option<&str>,
        long: Option<f64>,
        lat: Option<f64>,
    ) -> Result<Vec<Place>, GeocodeError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(name) = name {
            query.push(("query", name.to_string()));
        }
        if let (Some(long), Some(lat)) = (long, lat) {
            query.push(("long", long.to_string()));
            query.push(("lat", lat.to_string()));
        }
        let reply: SearchReply = self.get("search", &query).await?;
        Ok(reply.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_geocoder_errors_without_network() {
        let geocoder = Geocoder::disabled();
        assert!(matches!(
            geocoder.reverse(9.17, 47.66).await,
            Err(GeocodeError::Disabled)
        ));
        assert!(matches!(
            geocoder.search(Some("harbor"), None, None).await,
            Err(GeocodeError::Disabled)
        ));
    }
}
