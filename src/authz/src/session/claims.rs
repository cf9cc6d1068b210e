//! Token wire format
//!
//! Tokens are three base64url parts: `header.payload.signature`. Only the
//! header and payload are decoded here. The signature is NOT verified, so a
//! decoded session must not be trusted on its own in a deployment that
//! accepts tokens from untrusted callers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use icom_core::{NetworkType, Realm};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::{Session, SessionMode};
use crate::error::DecodeError;

/// Token header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    pub app_id: String,
    pub tenant_id: String,
    pub mode: SessionMode,
    pub realm: Realm,
    pub network_type: NetworkType,
    /// Space-delimited string or JSON array on the wire
    #[serde(
        default,
        serialize_with = "serialize_scope",
        deserialize_with = "deserialize_scope"
    )]
    pub scope: Vec<String>,
    /// Acting principal, delegated mode only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<String>,
    /// Token id
    pub jti: String,
    /// Issued at, seconds since epoch
    pub iat: i64,
    /// Expires at, seconds since epoch
    pub exp: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    Delimited(String),
    List(Vec<String>),
}

fn deserialize_scope<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ScopeClaim::deserialize(deserializer)? {
        ScopeClaim::Delimited(s) => s.split_whitespace().map(str::to_string).collect(),
        ScopeClaim::List(list) => list,
    })
}

fn serialize_scope<S>(scope: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&scope.join(" "))
}

/// Decode a raw token into a session
///
/// Validates the token shape and the session invariants; does not verify
/// the signature.
pub fn decode(raw: &str) -> Result<Session, DecodeError> {
    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(DecodeError::Malformed(parts.len()));
    }

    let header: TokenHeader = decode_part(parts[0], "header")?;
    let claims: Claims = decode_part(parts[1], "payload")?;

    debug!(
        "Decoded token jti={} alg={} (signature not verified)",
        claims.jti, header.alg
    );

    Session::from_claims(claims)
}

/// Produce an unsigned token carrying `claims`
///
/// For fixtures and local tooling. The signature part is empty.
pub fn encode_unsigned(claims: &Claims) -> String {
    let header = TokenHeader {
        alg: "none".to_string(),
        typ: Some("JWT".to_string()),
    };

    format!(
        "{}.{}.",
        encode_part(&header),
        encode_part(claims)
    )
}

fn decode_part<T: for<'de> Deserialize<'de>>(
    part: &str,
    name: &'static str,
) -> Result<T, DecodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64 {
            part: name,
            message: e.to_string(),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json {
        part: name,
        message: e.to_string(),
    })
}

fn encode_part<T: Serialize>(value: &T) -> String {
    // Serializing these plain structs to JSON cannot fail
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "user-1".to_string(),
            app_id: "console".to_string(),
            tenant_id: "tenant-a".to_string(),
            mode: SessionMode::Service,
            realm: Realm::Government,
            network_type: NetworkType::Government,
            scope: vec!["icom:chat:send".to_string()],
            act: None,
            jti: "tok-9".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_600,
        }
    }

    #[test]
    fn test_decode_unsigned_token() {
        let token = encode_unsigned(&claims());
        let session = decode(&token).unwrap();

        assert_eq!(session.token_id(), "tok-9");
        assert_eq!(session.realm(), Realm::Government);
        assert!(session.scopes().contains("icom:chat:send"));
    }

    #[test]
    fn test_decode_rejects_wrong_part_count() {
        assert_eq!(decode("abc").unwrap_err(), DecodeError::Malformed(1));
        assert_eq!(decode("a.b.c.d").unwrap_err(), DecodeError::Malformed(4));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode("!!!.e30.").unwrap_err();
        assert!(matches!(err, DecodeError::Base64 { part: "header", .. }));
    }

    #[test]
    fn test_decode_rejects_missing_claims() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"u"}"#);
        let err = decode(&format!("{}.{}.", header, payload)).unwrap_err();
        assert!(matches!(err, DecodeError::Json { part: "payload", .. }));
    }

    #[test]
    fn test_scope_claim_accepts_array() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            br#"{"sub":"u","app_id":"a","tenant_id":"t","mode":"service",
                "realm":"citizen","network_type":"commercial",
                "scope":["icom:chat:send","icom:call:use"],
                "jti":"j","iat":1700000000,"exp":1700000060}"#,
        );

        let session = decode(&format!("{}.{}.sig", header, payload)).unwrap();
        assert_eq!(session.scopes().len(), 2);
    }

    #[test]
    fn test_scope_claim_serializes_delimited() {
        let mut c = claims();
        c.scope.push("icom:call:use".to_string());
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["scope"], "icom:chat:send icom:call:use");
    }
}
