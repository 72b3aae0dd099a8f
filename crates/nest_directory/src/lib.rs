//! Nest Directory — the key-id → public-key record store.
//!
//! ECDSA verification is directory-backed: issuers publish their PEM public
//! keys under a `kid` (the base64url of their SPIFFE ID), and verifiers
//! fetch every record for that `kid` and try each in turn. The store is
//! trusted and colocated; transport is plain HTTP.

mod client;
mod record;
pub mod server;

pub use client::DirectoryClient;
pub use record::{KeyRecord, KEY_TTL_SECS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("key directory unreachable: {0}")]
    Unreachable(String),
    #[error("no keys found for kid {0}")]
    NoKeys(String),
    #[error("malformed key record: {0}")]
    MalformedRecord(String),
    #[error("payload has no kid claim")]
    MissingKid,
    #[error("payload decode failed: {0}")]
    Payload(#[from] nest_codec::TokenError),
}
