//! Nest Schnorr — Schnorr signatures over the edwards25519 base point.
//!
//! The scheme is the textbook one: `R = k·G`, `c = H(pub ‖ R ‖ message)`,
//! `S = k + c·x`, verified by `S·G == R + c·pub`. Keys are self-contained:
//! the compressed public point rides inside the token's `iss` claim, so no
//! directory lookup is needed to verify.
//!
//! Wire form of a signature is `compress(R) ‖ S`, 64 bytes, point first.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchnorrError {
    #[error("curve decode failed: {0}")]
    CurveDecode(String),
    #[error("signature verification failed")]
    VerifyFailed,
}

/// A Schnorr keypair on edwards25519.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub secret: Scalar,
    pub public: EdwardsPoint,
}

impl Keypair {
    /// Fresh keypair from the system RNG.
    pub fn random() -> Self {
        Self::from_scalar(Scalar::random(&mut OsRng))
    }

    /// Deterministic keypair: the seed string is hashed into the scalar
    /// field, so equal seeds always yield equal keys.
    pub fn from_seed(seed: &str) -> Self {
        let digest = blake3::hash(seed.as_bytes());
        Self::from_scalar(Scalar::from_bytes_mod_order(*digest.as_bytes()))
    }

    pub fn from_scalar(secret: Scalar) -> Self {
        let public = EdwardsPoint::mul_base(&secret);
        Self { secret, public }
    }
}

/// Signature pair `(R, S)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: EdwardsPoint,
    pub s: Scalar,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.r.compress().as_bytes());
        out[32..].copy_from_slice(self.s.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchnorrError> {
        if bytes.len() != 64 {
            return Err(SchnorrError::CurveDecode(format!(
                "signature must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let r = decompress_point(&bytes[..32])?;
        let mut s_bytes = [0u8; 32];
        s_bytes.copy_from_slice(&bytes[32..]);
        let s = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes))
            .ok_or_else(|| SchnorrError::CurveDecode("non-canonical scalar".into()))?;
        Ok(Self { r, s })
    }

    pub fn to_b64(&self) -> String {
        nest_codec::b64_encode(self.to_bytes())
    }

    pub fn from_b64(s: &str) -> Result<Self, SchnorrError> {
        let bytes =
            nest_codec::b64_decode(s).map_err(|e| SchnorrError::CurveDecode(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Sign a message string.
pub fn sign(message: &str, keypair: &Keypair) -> Signature {
    let k = Scalar::random(&mut OsRng);
    let r = EdwardsPoint::mul_base(&k);
    let c = challenge(&keypair.public, &r, message);
    Signature {
        r,
        s: k + c * keypair.secret,
    }
}

/// Verify a message string against a public point.
pub fn verify(message: &str, sig: &Signature, public: &EdwardsPoint) -> Result<(), SchnorrError> {
    let c = challenge(public, &sig.r, message);
    if EdwardsPoint::mul_base(&sig.s) == sig.r + public * c {
        Ok(())
    } else {
        Err(SchnorrError::VerifyFailed)
    }
}

/// Compressed point as it appears in `iss`/`aud` claims.
pub fn point_to_b64(point: &EdwardsPoint) -> String {
    nest_codec::b64_encode(point.compress().as_bytes())
}

pub fn point_from_b64(s: &str) -> Result<EdwardsPoint, SchnorrError> {
    let bytes = nest_codec::b64_decode(s).map_err(|e| SchnorrError::CurveDecode(e.to_string()))?;
    decompress_point(&bytes)
}

fn decompress_point(bytes: &[u8]) -> Result<EdwardsPoint, SchnorrError> {
    let compressed = CompressedEdwardsY::from_slice(bytes)
        .map_err(|_| SchnorrError::CurveDecode(format!("point must be 32 bytes, got {}", bytes.len())))?;
    compressed
        .decompress()
        .ok_or_else(|| SchnorrError::CurveDecode("not a curve point".into()))
}

/// `c = H(compress(pub) ‖ compress(R) ‖ message)` reduced into the scalar
/// field.
fn challenge(public: &EdwardsPoint, r: &EdwardsPoint, message: &str) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(public.compress().as_bytes());
    hasher.update(r.compress().as_bytes());
    hasher.update(message.as_bytes());
    Scalar::from_bytes_mod_order(hasher.finalize().into())
}
