//! Outer-to-inner token verification.

use nest_codec::{claim, Token, TokenError};
use thiserror::Error;

use crate::resolver::{KeyResolver, ResolveError, ResolvedKey};

/// What went wrong at one hop.
#[derive(Debug, Error)]
pub enum VerifyFailure {
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("issuer/audience link broken: {0}")]
    LinkBroken(String),
    #[error("malformed segment: {0}")]
    MalformedSegment(String),
}

/// Verification is all-or-nothing; the error names the first failing
/// segment and the failure kind.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Malformed(#[from] TokenError),
    #[error("segment {segment}: {kind}")]
    Layer { segment: usize, kind: VerifyFailure },
}

impl VerifyError {
    fn at(segment: usize, kind: VerifyFailure) -> Self {
        Self::Layer { segment, kind }
    }

    /// Failing segment index, when the token at least parsed.
    pub fn segment(&self) -> Option<usize> {
        match self {
            Self::Layer { segment, .. } => Some(*segment),
            Self::Malformed(_) => None,
        }
    }
}

/// Walks a token outermost-hop first, checking each signature against the
/// keys its resolver offers. With the link check enabled (trace mode) the
/// issuer/audience chain is enforced before any signature is tried at that
/// hop.
pub struct Verifier<R> {
    resolver: R,
    link_check: bool,
}

impl<R: KeyResolver> Verifier<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            link_check: false,
        }
    }

    pub fn with_link_check(mut self) -> Self {
        self.link_check = true;
        self
    }

    pub async fn verify(&self, raw: &str) -> Result<(), VerifyError> {
        let token = Token::parse(raw)?;
        let hops = token.payload_count();

        for i in 0..hops {
            if self.link_check {
                self.check_link(&token, i, hops)?;
            }

            let sig_bytes = nest_codec::b64_decode(token.signature(i)).map_err(|e| {
                VerifyError::at(i, VerifyFailure::MalformedSegment(e.to_string()))
            })?;
            let candidates = self
                .resolver
                .resolve(token.payload(i))
                .await
                .map_err(|e| VerifyError::at(i, resolve_failure(e)))?;

            let message = token.message(i);
            let verified = candidates
                .iter()
                .any(|key| key_matches(key, &message, &sig_bytes));
            if !verified {
                return Err(VerifyError::at(i, VerifyFailure::SignatureInvalid));
            }
            tracing::debug!(segment = i, "signature verified");
        }
        Ok(())
    }

    /// Trace-mode chain rule: every payload names its next hop in `aud`,
    /// and each outer issuer must be the audience the inner hop delegated
    /// to.
    fn check_link(&self, token: &Token, i: usize, hops: usize) -> Result<(), VerifyError> {
        let claims = token
            .claims(i)
            .map_err(|e| VerifyError::at(i, VerifyFailure::MalformedSegment(e.to_string())))?;
        if !claims.contains_key(claim::AUD) {
            return Err(VerifyError::at(
                i,
                VerifyFailure::LinkBroken("payload has no aud claim".into()),
            ));
        }
        if i + 1 < hops {
            let inner = token
                .claims(i + 1)
                .map_err(|e| {
                    VerifyError::at(i + 1, VerifyFailure::MalformedSegment(e.to_string()))
                })?;
            if claims.get(claim::ISS) != inner.get(claim::AUD) {
                return Err(VerifyError::at(
                    i,
                    VerifyFailure::LinkBroken("issuer is not the inner hop's audience".into()),
                ));
            }
        }
        Ok(())
    }
}

fn resolve_failure(err: ResolveError) -> VerifyFailure {
    use nest_directory::DirectoryError;
    match err {
        ResolveError::Directory(e) => match &e {
            DirectoryError::MissingKid | DirectoryError::Payload(_) => {
                VerifyFailure::MalformedSegment(e.to_string())
            }
            _ => VerifyFailure::KeyNotFound(e.to_string()),
        },
        ResolveError::Issuer(reason) => VerifyFailure::MalformedSegment(reason),
        ResolveError::Payload(e) => VerifyFailure::MalformedSegment(e.to_string()),
    }
}

fn key_matches(key: &ResolvedKey, message: &str, sig: &[u8]) -> bool {
    match key {
        ResolvedKey::P256(vk) => nest_ecdsa::verify_message(message, sig, vk).is_ok(),
        ResolvedKey::Schnorr(point) => match nest_schnorr::Signature::from_bytes(sig) {
            Ok(sig) => nest_schnorr::verify(message, &sig, point).is_ok(),
            Err(_) => false,
        },
    }
}
