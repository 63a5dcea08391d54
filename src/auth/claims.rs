//! Username extraction from bearer-token claims.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::{IdentityError, IdentityProvider};

/// Reads the username from one claim of a JWT payload.
///
/// Only the payload segment is decoded; signature verification already
/// happened upstream. Claim values are lowercased to match how usernames
/// are keyed in the permission registry.
pub struct ClaimIdentity {
    claim: String,
}

impl ClaimIdentity {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }
}

impl IdentityProvider for ClaimIdentity {
    fn identify(&self, bearer_token: &str) -> Result<String, IdentityError> {
        let mut segments = bearer_token.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(_header), Some(payload)) => payload,
            _ => return Err(IdentityError::Malformed),
        };

        // Compact JWTs use unpadded base64url; tolerate padded producers.
        let raw = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| IdentityError::Malformed)?;
        let claims: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|_| IdentityError::Malformed)?;

        let value = claims
            .get(&self.claim)
            .and_then(|value| value.as_str())
            .ok_or_else(|| IdentityError::MissingClaim {
                claim: self.claim.clone(),
            })?;

        let username = value.trim().to_lowercase();
        if username.is_empty() {
            return Err(IdentityError::MissingClaim {
                claim: self.claim.clone(),
            });
        }
        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_payload(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn extracts_and_lowercases_the_claim() {
        let token = token_with_payload(json!({"unique_name": "Alice@Corp.Example"}));
        let identity = ClaimIdentity::new("unique_name");
        assert_eq!(identity.identify(&token).unwrap(), "alice@corp.example");
    }

    #[test]
    fn honors_a_configured_claim_name() {
        let token = token_with_payload(json!({"preferred_username": "bob@corp.example"}));
        let identity = ClaimIdentity::new("preferred_username");
        assert_eq!(identity.identify(&token).unwrap(), "bob@corp.example");
    }

    #[test]
    fn rejects_tokens_without_the_claim() {
        let token = token_with_payload(json!({"sub": "subject-id"}));
        let err = ClaimIdentity::new("unique_name").identify(&token).unwrap_err();
        assert!(matches!(err, IdentityError::MissingClaim { .. }));
    }

    #[test]
    fn rejects_non_string_claims() {
        let token = token_with_payload(json!({"unique_name": 42}));
        let err = ClaimIdentity::new("unique_name").identify(&token).unwrap_err();
        assert!(matches!(err, IdentityError::MissingClaim { .. }));
    }

    #[test]
    fn rejects_garbage_tokens() {
        let identity = ClaimIdentity::new("unique_name");
        for bad in ["", "not-a-jwt", "a.@@@.c", "onesegment"] {
            assert!(
                matches!(identity.identify(bad), Err(IdentityError::Malformed)),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn accepts_padded_payload_segments() {
        use base64::engine::general_purpose::URL_SAFE;
        let payload = URL_SAFE.encode(json!({"unique_name": "x@yz"}).to_string().as_bytes());
        assert!(payload.ends_with('='), "fixture must exercise padding");
        let token = format!("h.{payload}.s");
        assert_eq!(
            ClaimIdentity::new("unique_name").identify(&token).unwrap(),
            "x@yz"
        );
    }
}
