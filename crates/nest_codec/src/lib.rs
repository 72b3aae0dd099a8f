//! Nest Codec — the token wire format.
//!
//! A token is a dot-joined sequence of base64url segments: `k` payloads
//! outermost-first, then `k` signatures in reverse order, so the payload at
//! index `i` pairs with the signature at index `2k-1-i`. base64url (no
//! padding) never contains `.`, which is what keeps dot-splitting
//! unambiguous.

use base64::Engine;
use serde_json::Value;
use thiserror::Error;

const BASE64: base64::engine::general_purpose::GeneralPurpose =
    base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Reserved claim names.
pub mod claim {
    pub const ISS: &str = "iss";
    pub const IAT: &str = "iat";
    pub const AUD: &str = "aud";
    pub const KID: &str = "kid";
}

/// An unordered claim map. Serialization orders keys deterministically, so
/// any insertion order produces the same byte sequence.
pub type ClaimSet = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("empty token")]
    Empty,
    #[error("segment count {0} is not an even payload/signature pairing")]
    OddSegments(usize),
    #[error("segment {0} is empty")]
    EmptySegment(usize),
    #[error("segment {segment}: invalid base64url: {source}")]
    Base64 {
        segment: usize,
        source: base64::DecodeError,
    },
    #[error("segment {segment}: payload is not a JSON object: {reason}")]
    Json { segment: usize, reason: String },
}

/// base64url (no padding) encode.
pub fn b64_encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64.encode(bytes)
}

/// base64url (no padding) decode.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(s)
}

/// Serialize a claim set into a payload segment.
pub fn encode_claims(claims: &ClaimSet) -> String {
    let json = Value::Object(claims.clone()).to_string();
    BASE64.encode(json.as_bytes())
}

/// Decode a payload segment back into a claim set.
pub fn decode_claims(payload_b64: &str) -> Result<ClaimSet, TokenError> {
    let bytes = BASE64.decode(payload_b64).map_err(|source| TokenError::Base64 {
        segment: 0,
        source,
    })?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TokenError::Json {
            segment: 0,
            reason: format!("expected object, got {other}"),
        }),
        Err(e) => Err(TokenError::Json {
            segment: 0,
            reason: e.to_string(),
        }),
    }
}

/// The message a new signature covers: the fresh payload joined with the
/// entire prior token, signatures included.
pub fn compose(payload_b64: &str, prior: Option<&str>) -> String {
    match prior {
        Some(prior) => format!("{payload_b64}.{prior}"),
        None => payload_b64.to_string(),
    }
}

/// Extend a token: prepend the new payload, append the new signature.
/// Existing segments are never touched.
pub fn assemble(payload_b64: &str, prior: Option<&str>, sig_b64: &str) -> String {
    match prior {
        Some(prior) => format!("{payload_b64}.{prior}.{sig_b64}"),
        None => format!("{payload_b64}.{sig_b64}"),
    }
}

/// A parsed token. Parsing only checks segment arithmetic; payloads are
/// decoded lazily by [`Token::claims`].
#[derive(Debug, Clone)]
pub struct Token {
    segments: Vec<String>,
}

impl Token {
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        if raw.is_empty() {
            return Err(TokenError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.len() < 2 || segments.len() % 2 != 0 {
            return Err(TokenError::OddSegments(segments.len()));
        }
        if let Some(idx) = segments.iter().position(String::is_empty) {
            return Err(TokenError::EmptySegment(idx));
        }
        Ok(Self { segments })
    }

    /// Number of hops (payload/signature pairs).
    pub fn payload_count(&self) -> usize {
        self.segments.len() / 2
    }

    /// Payload segment for hop `i` (0 = outermost).
    pub fn payload(&self, i: usize) -> &str {
        &self.segments[i]
    }

    /// Signature segment for hop `i`, mirrored from the tail.
    pub fn signature(&self, i: usize) -> &str {
        &self.segments[self.segments.len() - 1 - i]
    }

    /// The exact byte sequence signature `i` covers: segment `i` through the
    /// innermost token it wrapped, i.e. `segments[i ..= 2k-2-i]` dot-joined.
    /// For the innermost hop this is the bare payload.
    pub fn message(&self, i: usize) -> String {
        let end = self.segments.len() - 1 - i;
        self.segments[i..end].join(".")
    }

    /// Decoded claim set for hop `i`.
    pub fn claims(&self, i: usize) -> Result<ClaimSet, TokenError> {
        decode_claims(self.payload(i)).map_err(|e| match e {
            TokenError::Base64 { source, .. } => TokenError::Base64 { segment: i, source },
            TokenError::Json { reason, .. } => TokenError::Json { segment: i, reason },
            other => other,
        })
    }

    /// Drop the outermost hop, yielding the prior token, or `None` for a
    /// single-hop token.
    pub fn strip_outer(&self) -> Option<String> {
        if self.payload_count() < 2 {
            return None;
        }
        Some(self.segments[1..self.segments.len() - 1].join("."))
    }

    pub fn as_segments(&self) -> &[String] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn claims_fixture() -> ClaimSet {
        let mut c = ClaimSet::new();
        c.insert(claim::ISS.into(), json!("spiffe://example.org/subject"));
        c.insert(claim::IAT.into(), json!(1_700_000_000));
        c.insert("role".into(), json!("admin"));
        c
    }

    #[test]
    fn claims_roundtrip() {
        let claims = claims_fixture();
        let payload = encode_claims(&claims);
        assert!(!payload.contains('.'));
        let back = decode_claims(&payload).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn payload_is_clean_base64url() {
        let payload = encode_claims(&claims_fixture());
        assert!(payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn single_hop_layout() {
        let tok = Token::parse("payload.sig").unwrap();
        assert_eq!(tok.payload_count(), 1);
        assert_eq!(tok.payload(0), "payload");
        assert_eq!(tok.signature(0), "sig");
        assert_eq!(tok.message(0), "payload");
        assert!(tok.strip_outer().is_none());
    }

    #[test]
    fn two_hop_layout() {
        // Extension of "p1.s1" with payload p0: p0.p1.s1.s0
        let tok = Token::parse("p0.p1.s1.s0").unwrap();
        assert_eq!(tok.payload_count(), 2);
        assert_eq!(tok.payload(0), "p0");
        assert_eq!(tok.payload(1), "p1");
        assert_eq!(tok.signature(0), "s0");
        assert_eq!(tok.signature(1), "s1");
        assert_eq!(tok.message(0), "p0.p1.s1");
        assert_eq!(tok.message(1), "p1");
        assert_eq!(tok.strip_outer().unwrap(), "p1.s1");
    }

    #[test]
    fn three_hop_messages() {
        let tok = Token::parse("p0.p1.p2.s2.s1.s0").unwrap();
        assert_eq!(tok.message(0), "p0.p1.p2.s2.s1");
        assert_eq!(tok.message(1), "p1.p2.s2");
        assert_eq!(tok.message(2), "p2");
    }

    #[test]
    fn assemble_matches_message() {
        let inner = assemble("p1", None, "s1");
        assert_eq!(inner, "p1.s1");
        let outer = assemble("p0", Some(&inner), "s0");
        assert_eq!(outer, "p0.p1.s1.s0");
        let tok = Token::parse(&outer).unwrap();
        assert_eq!(tok.message(0), compose("p0", Some(&inner)));
    }

    #[test]
    fn empty_token_rejected() {
        assert!(matches!(Token::parse(""), Err(TokenError::Empty)));
    }

    #[test]
    fn odd_segment_count_rejected() {
        assert!(matches!(
            Token::parse("p0.p1.s1"),
            Err(TokenError::OddSegments(3))
        ));
        assert!(matches!(
            Token::parse("alone"),
            Err(TokenError::OddSegments(1))
        ));
    }

    #[test]
    fn empty_segment_rejected() {
        assert!(matches!(
            Token::parse("p0..s1.s0"),
            Err(TokenError::EmptySegment(1))
        ));
    }

    #[test]
    fn non_object_payload_rejected() {
        let payload = b64_encode("[1,2,3]");
        assert!(matches!(
            decode_claims(&payload),
            Err(TokenError::Json { .. })
        ));
    }

    #[test]
    fn garbage_base64_rejected() {
        assert!(matches!(
            decode_claims("not!base64"),
            Err(TokenError::Base64 { .. })
        ));
    }

    proptest! {
        #[test]
        fn b64_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = b64_encode(&bytes);
            prop_assert!(!encoded.contains('.'));
            prop_assert!(!encoded.contains('='));
            prop_assert_eq!(b64_decode(&encoded).unwrap(), bytes);
        }

        #[test]
        fn extension_keeps_inner_segments(
            hops in proptest::collection::vec(("[a-z]{1,8}", "[A-Z]{1,8}"), 1..6)
        ) {
            let mut token: Option<String> = None;
            for (p, s) in &hops {
                token = Some(assemble(p, token.as_deref(), s));
            }
            let tok = Token::parse(token.as_deref().unwrap()).unwrap();
            prop_assert_eq!(tok.payload_count(), hops.len());
            // hop j of the finished token is the (len-1-j)-th one built
            for (j, (p, s)) in hops.iter().rev().enumerate() {
                prop_assert_eq!(tok.payload(j), p.as_str());
                prop_assert_eq!(tok.signature(j), s.as_str());
            }
        }
    }
}
