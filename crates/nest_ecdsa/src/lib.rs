//! Nest ECDSA — P-256 signatures over SHA-256 digests of composed segments.
//!
//! Signatures go on the wire as base64url ASN.1 DER. Public keys travel as
//! PEM (`EC PUBLIC KEY`) over PKIX/SPKI DER so the key directory can store
//! them as opaque text.

use p256::ecdsa::signature::{DigestVerifier, RandomizedDigestSigner};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, Document, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

const PEM_LABEL: &str = "EC PUBLIC KEY";

#[derive(Debug, Error)]
pub enum EcdsaError {
    #[error("signing failed: {0}")]
    Sign(String),
    #[error("key decode failed: {0}")]
    Decode(String),
    #[error("signature verification failed")]
    VerifyFailed,
}

/// Sign a fresh or extending assertion. The covered message is the payload
/// alone, or `payload.prior` when extending, where `prior` is the complete
/// previous token, signature segments included.
pub fn sign_assertion(
    payload_b64: &str,
    prior: Option<&str>,
    key: &SigningKey,
) -> Result<String, EcdsaError> {
    let message = nest_codec::compose(payload_b64, prior);
    let digest = Sha256::new_with_prefix(message.as_bytes());
    let sig: Signature = key
        .try_sign_digest_with_rng(&mut OsRng, digest)
        .map_err(|e| EcdsaError::Sign(e.to_string()))?;
    Ok(nest_codec::b64_encode(sig.to_der().as_bytes()))
}

/// Verify a DER signature over the SHA-256 digest of `message`.
pub fn verify_message(
    message: &str,
    sig_der: &[u8],
    key: &VerifyingKey,
) -> Result<(), EcdsaError> {
    let sig = Signature::from_der(sig_der).map_err(|e| EcdsaError::Decode(e.to_string()))?;
    let digest = Sha256::new_with_prefix(message.as_bytes());
    key.verify_digest(digest, &sig)
        .map_err(|_| EcdsaError::VerifyFailed)
}

/// PEM-encode a verifying key (PKIX DER in an `EC PUBLIC KEY` envelope).
pub fn encode_public_key_pem(key: &VerifyingKey) -> Result<String, EcdsaError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| EcdsaError::Decode(e.to_string()))?;
    der.to_pem(PEM_LABEL, LineEnding::LF)
        .map_err(|e| EcdsaError::Decode(e.to_string()))
}

/// Parse a PEM public key back. The envelope label is not enforced; the
/// body must be PKIX DER for a P-256 point.
pub fn decode_public_key_pem(pem: &str) -> Result<VerifyingKey, EcdsaError> {
    let (_, der) = Document::from_pem(pem).map_err(|e| EcdsaError::Decode(e.to_string()))?;
    VerifyingKey::from_public_key_der(der.as_bytes())
        .map_err(|e| EcdsaError::Decode(e.to_string()))
}
