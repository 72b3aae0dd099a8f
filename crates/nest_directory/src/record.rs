//! Key records as they live in the directory.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::DirectoryError;

/// Default record lifetime: one hour from issuance.
pub const KEY_TTL_SECS: i64 = 3600;

/// One directory entry. Multiple records may share a `kid` (rotation,
/// parallel issuance); records are never deleted, only outlived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyRecord {
    /// base64url of the issuing workload's SPIFFE ID bytes.
    pub kid: String,
    /// Algorithm tag, `"EC256"` for P-256 records.
    pub alg: String,
    /// base64url of the PEM-encoded public key bytes.
    pub pkey: String,
    /// Unix-second expiry.
    pub exp: i64,
}

impl KeyRecord {
    /// A fresh `EC256` record expiring [`KEY_TTL_SECS`] from now.
    pub fn new_ec256(kid: impl Into<String>, pem: &str) -> Self {
        Self {
            kid: kid.into(),
            alg: "EC256".into(),
            pkey: nest_codec::b64_encode(pem.as_bytes()),
            exp: Utc::now().timestamp() + KEY_TTL_SECS,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.exp <= now
    }

    /// Recover the PEM text from the `pkey` field.
    pub fn pem(&self) -> Result<String, DirectoryError> {
        let bytes = nest_codec::b64_decode(&self.pkey)
            .map_err(|e| DirectoryError::MalformedRecord(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| DirectoryError::MalformedRecord(e.to_string()))
    }
}
