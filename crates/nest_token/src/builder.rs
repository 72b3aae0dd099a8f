//! Token construction for both signature modes.

use chrono::Utc;
use curve25519_dalek::edwards::EdwardsPoint;
use nest_codec::{claim, ClaimSet, Token, TokenError};
use nest_directory::{DirectoryClient, DirectoryError, KeyRecord};
use nest_ecdsa::EcdsaError;
use nest_identity::WorkloadIdentity;
use nest_schnorr::{Keypair, SchnorrError};
use serde_json::json;
use thiserror::Error;

use crate::resolver::DirectoryKeys;
use crate::verifier::{Verifier, VerifyError};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown issuer mode `{0}` (expected spiffeid, svid, or anonymous)")]
    UnknownIssuerMode(String),
    #[error("cannot extend an invalid token: {0}")]
    CannotExtendInvalid(Box<VerifyError>),
    #[error("appending key does not match the prior token's audience")]
    AudMismatch,
    #[error(transparent)]
    Ecdsa(#[from] EcdsaError),
    #[error(transparent)]
    Schnorr(#[from] SchnorrError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// How the ECDSA issuer identifies itself in the `iss` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerMode {
    /// The SPIFFE ID string.
    SpiffeId,
    /// The PEM-encoded SVID certificate bundle.
    Svid,
    /// The PEM-encoded public key, nothing traceable to the workload.
    Anonymous,
}

impl std::str::FromStr for IssuerMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spiffeid" => Ok(Self::SpiffeId),
            "svid" => Ok(Self::Svid),
            "anonymous" => Ok(Self::Anonymous),
            other => Err(BuildError::UnknownIssuerMode(other.to_string())),
        }
    }
}

/// Builds ECDSA assertions for one workload and publishes its public key to
/// the directory so downstream verifiers can find it.
pub struct EcdsaBuilder<'a> {
    identity: &'a WorkloadIdentity,
    directory: DirectoryClient,
}

impl<'a> EcdsaBuilder<'a> {
    pub fn new(identity: &'a WorkloadIdentity, directory: DirectoryClient) -> Self {
        Self {
            identity,
            directory,
        }
    }

    /// Build a fresh assertion, or extend `prior` after verifying it.
    pub async fn assert(
        &self,
        claim_key: &str,
        claim_value: &str,
        mode: IssuerMode,
        prior: Option<&str>,
    ) -> Result<String, BuildError> {
        if let Some(prior) = prior {
            self.verify_prior(prior).await?;
        }
        self.assert_unchecked(claim_key, claim_value, mode, prior)
            .await
    }

    /// Extend `count` times in one call. The incoming token is verified
    /// once; the hops added here are our own.
    pub async fn assert_many(
        &self,
        prior: &str,
        claim_key: &str,
        claim_value: &str,
        count: u32,
        mode: IssuerMode,
    ) -> Result<String, BuildError> {
        self.verify_prior(prior).await?;
        let mut token = prior.to_string();
        for i in 0..count {
            token = self
                .assert_unchecked(
                    &format!("{claim_key}{i}"),
                    &format!("{claim_value}{i}"),
                    mode,
                    Some(&token),
                )
                .await?;
        }
        Ok(token)
    }

    async fn verify_prior(&self, prior: &str) -> Result<(), BuildError> {
        Verifier::new(DirectoryKeys::new(self.directory.clone()))
            .verify(prior)
            .await
            .map_err(|e| BuildError::CannotExtendInvalid(Box::new(e)))
    }

    async fn assert_unchecked(
        &self,
        claim_key: &str,
        claim_value: &str,
        mode: IssuerMode,
        prior: Option<&str>,
    ) -> Result<String, BuildError> {
        let pem = nest_ecdsa::encode_public_key_pem(self.identity.signing_key.verifying_key())?;
        let kid = self.identity.kid();
        let iss = match mode {
            IssuerMode::SpiffeId => self.identity.spiffe_id.clone(),
            IssuerMode::Svid => self.identity.svid_pem.clone(),
            IssuerMode::Anonymous => pem.clone(),
        };

        let mut claims = ClaimSet::new();
        claims.insert(claim::ISS.into(), json!(iss));
        claims.insert(claim::IAT.into(), json!(Utc::now().timestamp()));
        claims.insert(claim::KID.into(), json!(kid));
        claims.insert(claim_key.into(), json!(claim_value));

        let payload = nest_codec::encode_claims(&claims);
        let sig = nest_ecdsa::sign_assertion(&payload, prior, &self.identity.signing_key)?;
        let token = nest_codec::assemble(&payload, prior, &sig);

        // The record must be findable before anyone can hold the token.
        let record = KeyRecord::new_ec256(kid, &pem);
        self.directory.add_key(&record).await?;
        Ok(token)
    }
}

/// Fresh or appending Schnorr assertion. `audience` names the next hop for
/// trace tokens; without it the token only supports plain verification.
pub fn schnorr_assert(
    claim_key: &str,
    claim_value: &str,
    keypair: &Keypair,
    audience: Option<&EdwardsPoint>,
    prior: Option<&str>,
) -> Result<String, BuildError> {
    if let Some(prior) = prior {
        Token::parse(prior)?;
    }
    let mut claims = ClaimSet::new();
    claims.insert(claim::ISS.into(), json!(nest_schnorr::point_to_b64(&keypair.public)));
    if let Some(aud) = audience {
        claims.insert(claim::AUD.into(), json!(nest_schnorr::point_to_b64(aud)));
    }
    claims.insert(claim::IAT.into(), json!(Utc::now().timestamp()));
    claims.insert(claim_key.into(), json!(claim_value));
    Ok(sign_and_assemble(&claims, keypair, prior))
}

/// Seeded single-hop trace token: issuer and audience are both fixed by
/// their seeds.
pub fn trace_new(
    claim_key: &str,
    claim_value: &str,
    issuer: &Keypair,
    audience: &EdwardsPoint,
) -> Result<String, BuildError> {
    schnorr_assert(claim_key, claim_value, issuer, Some(audience), None)
}

/// Add the next hop to a trace token. The caller must hold the key the
/// prior hop delegated to: its public point has to equal the outermost
/// `aud` claim.
pub fn trace_extend(
    prior: &str,
    keypair: &Keypair,
    next_audience: &EdwardsPoint,
) -> Result<String, BuildError> {
    let token = Token::parse(prior)?;
    let outer = token.claims(0)?;
    let expected = outer.get(claim::AUD).and_then(|v| v.as_str());
    if expected != Some(nest_schnorr::point_to_b64(&keypair.public).as_str()) {
        return Err(BuildError::AudMismatch);
    }

    let mut claims = ClaimSet::new();
    claims.insert(claim::ISS.into(), json!(nest_schnorr::point_to_b64(&keypair.public)));
    claims.insert(claim::IAT.into(), json!(Utc::now().timestamp()));
    claims.insert(
        claim::AUD.into(),
        json!(nest_schnorr::point_to_b64(next_audience)),
    );
    Ok(sign_and_assemble(&claims, keypair, Some(prior)))
}

/// Append with a throwaway keypair and a fresh next-hop keypair. Returns
/// the token and the next hop's keypair; hand its secret to whoever extends
/// next.
pub fn schnorr_append(
    prior: &str,
    claim_key: &str,
    claim_value: &str,
) -> Result<(String, Keypair), BuildError> {
    let keypair = Keypair::random();
    let next = Keypair::random();
    let token = schnorr_assert(claim_key, claim_value, &keypair, Some(&next.public), Some(prior))?;
    Ok((token, next))
}

/// Append using the prior token's outermost signature scalar as the next
/// private key. Binds the new layer to the previous signature without
/// transporting a key, at the cost of reusing signature material as key
/// material. Kept for compatibility; not recommended for new chains.
pub fn concatenate(
    prior: &str,
    claim_key: &str,
    claim_value: &str,
) -> Result<String, BuildError> {
    let token = Token::parse(prior)?;
    let outer_sig = nest_schnorr::Signature::from_b64(token.signature(0))?;
    let keypair = Keypair::from_scalar(outer_sig.s);
    schnorr_assert(claim_key, claim_value, &keypair, None, Some(prior))
}

fn sign_and_assemble(claims: &ClaimSet, keypair: &Keypair, prior: Option<&str>) -> String {
    let payload = nest_codec::encode_claims(claims);
    let message = nest_codec::compose(&payload, prior);
    let sig = nest_schnorr::sign(&message, keypair);
    nest_codec::assemble(&payload, prior, &sig.to_b64())
}
