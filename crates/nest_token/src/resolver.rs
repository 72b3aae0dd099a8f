//! Per-hop public key resolution.
//!
//! The verifier is configured with one resolver and never learns which mode
//! it is running in: directory-backed P-256 lookup or the in-band edwards
//! point carried by the `iss` claim.

use async_trait::async_trait;
use chrono::Utc;
use curve25519_dalek::edwards::EdwardsPoint;
use nest_codec::claim;
use nest_directory::{DirectoryClient, DirectoryError};
use p256::ecdsa::VerifyingKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("issuer key unusable: {0}")]
    Issuer(String),
    #[error(transparent)]
    Payload(#[from] nest_codec::TokenError),
}

/// A candidate key for one hop.
#[derive(Debug, Clone)]
pub enum ResolvedKey {
    P256(VerifyingKey),
    Schnorr(EdwardsPoint),
}

/// Maps a payload segment to the candidate keys that may have signed it.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, payload_b64: &str) -> Result<Vec<ResolvedKey>, ResolveError>;
}

/// Directory-backed resolution: read `kid` from the payload, fetch every
/// record for it, drop expired ones, decode the rest from PEM. Candidate
/// order follows the directory's response order.
#[derive(Debug, Clone)]
pub struct DirectoryKeys {
    client: DirectoryClient,
}

impl DirectoryKeys {
    pub fn new(client: DirectoryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyResolver for DirectoryKeys {
    async fn resolve(&self, payload_b64: &str) -> Result<Vec<ResolvedKey>, ResolveError> {
        let records = self.client.get_keys(payload_b64).await?;
        let kid = records[0].kid.clone();
        let now = Utc::now().timestamp();
        let live: Vec<_> = records.into_iter().filter(|r| !r.is_expired(now)).collect();
        if live.is_empty() {
            return Err(DirectoryError::NoKeys(kid).into());
        }

        let mut keys = Vec::with_capacity(live.len());
        for record in &live {
            match record
                .pem()
                .map_err(|e| e.to_string())
                .and_then(|pem| {
                    nest_ecdsa::decode_public_key_pem(&pem).map_err(|e| e.to_string())
                }) {
                Ok(key) => keys.push(ResolvedKey::P256(key)),
                Err(reason) => {
                    tracing::debug!(kid = %record.kid, %reason, "skipping undecodable key record")
                }
            }
        }
        if keys.is_empty() {
            return Err(
                DirectoryError::MalformedRecord(format!("no record for {kid} decoded")).into(),
            );
        }
        Ok(keys)
    }
}

/// In-band resolution: the issuer claim is the base64url compressed public
/// point itself.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedIssuer;

#[async_trait]
impl KeyResolver for EmbeddedIssuer {
    async fn resolve(&self, payload_b64: &str) -> Result<Vec<ResolvedKey>, ResolveError> {
        let claims = nest_codec::decode_claims(payload_b64)?;
        let iss = claims
            .get(claim::ISS)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ResolveError::Issuer("payload has no iss claim".into()))?;
        let point =
            nest_schnorr::point_from_b64(iss).map_err(|e| ResolveError::Issuer(e.to_string()))?;
        Ok(vec![ResolvedKey::Schnorr(point)])
    }
}
