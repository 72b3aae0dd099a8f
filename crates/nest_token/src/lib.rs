//! Nest Token — building and verifying nested assertion tokens.
//!
//! A token records a chain of workload-to-workload delegations: each hop
//! prepends its signed claim set onto the token it received, and each
//! signature covers that hop's payload together with the entire inner token.
//! Two modes share the format: ECDSA/P-256 with directory-resolved keys, and
//! Schnorr/edwards25519 with the issuer key embedded in the `iss` claim.
//!
//! A Galindo–García aggregate-signature mode is planned but not implemented;
//! it would collapse the per-hop signatures into a single aggregate and
//! change the verification walk accordingly.

mod builder;
mod resolver;
mod verifier;

pub use builder::{
    concatenate, schnorr_append, schnorr_assert, trace_extend, trace_new, BuildError,
    EcdsaBuilder, IssuerMode,
};
pub use resolver::{DirectoryKeys, EmbeddedIssuer, KeyResolver, ResolveError, ResolvedKey};
pub use verifier::{Verifier, VerifyError, VerifyFailure};
