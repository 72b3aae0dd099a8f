//! HTTP client for the key directory.

use nest_codec::claim;

use crate::{DirectoryError, KeyRecord};

/// Client over the directory's two operations: `POST /addkey` and
/// `GET /key/{kid}`.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Publish a key record. Returns the server's opaque acknowledgement.
    pub async fn add_key(&self, record: &KeyRecord) -> Result<String, DirectoryError> {
        let url = format!("{}/addkey", self.base_url);
        tracing::debug!(kid = %record.kid, %url, "publishing key record");
        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))
    }

    /// Fetch every record for the `kid` named by a payload segment.
    pub async fn get_keys(&self, payload_b64: &str) -> Result<Vec<KeyRecord>, DirectoryError> {
        let claims = nest_codec::decode_claims(payload_b64)?;
        let kid = claims
            .get(claim::KID)
            .and_then(|v| v.as_str())
            .ok_or(DirectoryError::MissingKid)?;
        self.get_keys_by_kid(kid).await
    }

    pub async fn get_keys_by_kid(&self, kid: &str) -> Result<Vec<KeyRecord>, DirectoryError> {
        let url = format!("{}/key/{}", self.base_url, kid);
        tracing::debug!(%kid, %url, "fetching key records");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        let records: Vec<KeyRecord> = response
            .json()
            .await
            .map_err(|e| DirectoryError::MalformedRecord(e.to_string()))?;
        if records.is_empty() {
            return Err(DirectoryError::NoKeys(kid.to_string()));
        }
        tracing::debug!(%kid, count = records.len(), "received key records");
        Ok(records)
    }
}
