//! Nest Identity — the workload's own identity, straight from the SPIFFE
//! Workload API.
//!
//! One blocking-style fetch per operation: SPIFFE ID, X.509 SVID chain, and
//! the SVID private key converted into a P-256 signing key. The private key
//! never leaves this struct.

use p256::ecdsa::SigningKey;
use p256::pkcs8::der::Decode;
use p256::pkcs8::{DecodePrivateKey, Document, LineEnding};
use spiffe::WorkloadApiClient;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("workload API: {0}")]
    WorkloadApi(String),
    #[error("SVID private key is not a usable P-256 key: {0}")]
    Key(String),
    #[error("SVID certificate encode failed: {0}")]
    Certificate(String),
}

/// Everything the token builder needs to speak for this workload.
pub struct WorkloadIdentity {
    /// URI-shaped identity, e.g. `spiffe://example.org/subject`.
    pub spiffe_id: String,
    /// PEM-encoded SVID certificate chain.
    pub svid_pem: String,
    /// The SVID's P-256 private key.
    pub signing_key: SigningKey,
}

impl WorkloadIdentity {
    /// `kid` under which this workload publishes keys: base64url of the
    /// SPIFFE ID bytes.
    pub fn kid(&self) -> String {
        nest_codec::b64_encode(self.spiffe_id.as_bytes())
    }
}

/// Fetch the default X.509 SVID over the configured Workload API socket.
pub async fn fetch_identity() -> Result<WorkloadIdentity, IdentityError> {
    let socket = nest_config::SOCKET_PATH.as_str();
    tracing::debug!(%socket, "connecting to workload API");
    let mut client = WorkloadApiClient::new_from_path(socket)
        .await
        .map_err(|e| IdentityError::WorkloadApi(e.to_string()))?;
    let svid = client
        .fetch_x509_svid()
        .await
        .map_err(|e| IdentityError::WorkloadApi(e.to_string()))?;

    let spiffe_id = svid.spiffe_id().to_string();
    let signing_key = SigningKey::from_pkcs8_der(svid.private_key().as_ref())
        .map_err(|e| IdentityError::Key(e.to_string()))?;
    let svid_pem = chain_to_pem(svid.cert_chain().iter().map(|c| c.as_ref()))?;
    tracing::info!(%spiffe_id, "workload identity fetched");

    Ok(WorkloadIdentity {
        spiffe_id,
        svid_pem,
        signing_key,
    })
}

/// PEM-encode a DER certificate chain, leaf first.
fn chain_to_pem<'a>(
    certs: impl Iterator<Item = &'a [u8]>,
) -> Result<String, IdentityError> {
    let mut pem = String::new();
    for der in certs {
        let doc =
            Document::from_der(der).map_err(|e| IdentityError::Certificate(e.to_string()))?;
        pem.push_str(
            &doc.to_pem("CERTIFICATE", LineEnding::LF)
                .map_err(|e| IdentityError::Certificate(e.to_string()))?,
        );
    }
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::EncodePublicKey;

    #[test]
    fn kid_is_base64url_of_spiffe_id() {
        let identity = WorkloadIdentity {
            spiffe_id: "spiffe://example.org/subject".into(),
            svid_pem: String::new(),
            signing_key: SigningKey::from_bytes(&[5u8; 32].into()).unwrap(),
        };
        let decoded = nest_codec::b64_decode(&identity.kid()).unwrap();
        assert_eq!(decoded, b"spiffe://example.org/subject");
    }

    #[test]
    fn chain_to_pem_wraps_each_der_block() {
        // Any well-formed DER document will do; a public key SPKI is one.
        let key = SigningKey::from_bytes(&[9u8; 32].into()).unwrap();
        let der = key.verifying_key().to_public_key_der().unwrap();
        let pem = chain_to_pem([der.as_bytes(), der.as_bytes()].into_iter()).unwrap();
        assert_eq!(pem.matches("-----BEGIN CERTIFICATE-----").count(), 2);
        assert_eq!(pem.matches("-----END CERTIFICATE-----").count(), 2);
    }
}
