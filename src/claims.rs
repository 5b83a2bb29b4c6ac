//! Unverified JWT claim decoding.
//!
//! SECURITY BOUNDARY: these helpers decode the payload segment of a JWT
//! without verifying its signature. The primary IdP's token is signature-
//! checked upstream (by the hosting server's auth layer) before it reaches
//! this crate, and the realm's tokens come straight off a TLS response from
//! the realm itself. Do not use this module on tokens from any other source.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Decode the claims of a JWT without verifying the signature.
///
/// Accepts standard three-segment JWS compact serialization (the signature
/// segment may be empty). Returns the payload as a JSON object map.
pub fn decode_unverified(token: &str) -> Result<Map<String, Value>, AuthError> {
    let mut segments = token.split('.');
    let _header = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::ClaimDecode("empty token".to_string()))?;
    let payload = segments
        .next()
        .ok_or_else(|| AuthError::ClaimDecode("token has no payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::ClaimDecode(format!("payload is not base64url: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::ClaimDecode(format!("payload is not JSON: {}", e)))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AuthError::ClaimDecode(format!(
            "payload is not a JSON object: {}",
            other
        ))),
    }
}

/// Read a string claim from a decoded claims map.
///
/// Non-string values are ignored; empty strings count as absent, matching
/// how claim fallback chains (`oid` then `sub`) are applied.
pub fn claim_str(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}


#[cfg(test)]
mod tests {
    use super::testutil::unsigned_jwt;
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_claims_from_unsigned_token() {
        let token = unsigned_jwt(&json!({"sub": "user-1", "email": "u@example.com"}));
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["email"], "u@example.com");
    }

    #[test]
    fn rejects_garbage_token() {
        let err = decode_unverified("not-a-jwt").unwrap_err();
        assert!(matches!(err, AuthError::ClaimDecode(_)));
    }

    #[test]
    fn rejects_non_object_payload() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let token = format!("{}.{}.", header, payload);
        let err = decode_unverified(&token).unwrap_err();
        assert!(matches!(err, AuthError::ClaimDecode(_)));
    }

    #[test]
    fn rejects_empty_token() {
        assert!(decode_unverified("").is_err());
    }

    #[test]
    fn claim_str_ignores_non_strings_and_empties() {
        let token = unsigned_jwt(&json!({"sub": "u1", "exp": 12345, "oid": ""}));
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claim_str(&claims, "sub").as_deref(), Some("u1"));
        assert_eq!(claim_str(&claims, "exp"), None);
        assert_eq!(claim_str(&claims, "oid"), None);
        assert_eq!(claim_str(&claims, "missing"), None);
    }
}
