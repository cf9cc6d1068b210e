//! Session / claims model
//!
//! A [`Session`] is one decoded, currently-held credential. Sessions are
//! immutable: refresh produces a new session with a new token id, and the
//! old token id is retired through the revocation store.
//!
//! ```text
//! raw token ──decode──► Session ──refresh──► Session' (old jti revoked)
//!                          │
//!                          └──revoke──► terminal
//! ```

mod claims;
mod manager;

pub use claims::{decode, encode_unsigned, Claims, TokenHeader};
pub use manager::{SessionManager, SessionSettings};

use chrono::{DateTime, Duration, Utc};
use icom_core::{AppId, NetworkType, Realm, SubjectId, TenantId, TokenId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;
use crate::scope::{ScopeRequirement, ScopeSet};

/// How the principal holds its credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    PlatformAdmin,
    TenantAdmin,
    Service,
    /// Acting on behalf of another principal; carries an `actor_id`
    Delegated,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::PlatformAdmin => "platform_admin",
            SessionMode::TenantAdmin => "tenant_admin",
            SessionMode::Service => "service",
            SessionMode::Delegated => "delegated",
        };
        f.write_str(name)
    }
}

/// A decoded principal identity and its scope set
///
/// Invariant: `actor_id` is present if and only if `mode` is
/// [`SessionMode::Delegated`]. Every constructor enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    subject: SubjectId,
    app_id: AppId,
    tenant_id: TenantId,
    mode: SessionMode,
    realm: Realm,
    network_type: NetworkType,
    scopes: ScopeSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor_id: Option<SubjectId>,
    token_id: TokenId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from decoded claims, validating invariants
    pub fn from_claims(claims: Claims) -> Result<Self, DecodeError> {
        let issued_at = timestamp(claims.iat, "iat")?;
        let expires_at = timestamp(claims.exp, "exp")?;

        if expires_at < issued_at {
            return Err(DecodeError::InvalidClaims(
                "exp precedes iat".to_string(),
            ));
        }

        for (name, value) in [
            ("sub", &claims.sub),
            ("app_id", &claims.app_id),
            ("tenant_id", &claims.tenant_id),
            ("jti", &claims.jti),
        ] {
            if value.trim().is_empty() {
                return Err(DecodeError::InvalidClaims(format!("{} is empty", name)));
            }
        }

        match (claims.mode, &claims.act) {
            (SessionMode::Delegated, None) => {
                return Err(DecodeError::InvalidClaims(
                    "delegated session requires act".to_string(),
                ));
            }
            (SessionMode::Delegated, Some(actor)) if actor.trim().is_empty() => {
                return Err(DecodeError::InvalidClaims("act is empty".to_string()));
            }
            (mode, Some(_)) if mode != SessionMode::Delegated => {
                return Err(DecodeError::InvalidClaims(format!(
                    "act is only allowed in delegated mode, not {}",
                    mode
                )));
            }
            _ => {}
        }

        Ok(Self {
            subject: claims.sub,
            app_id: claims.app_id,
            tenant_id: claims.tenant_id,
            mode: claims.mode,
            realm: claims.realm,
            network_type: claims.network_type,
            scopes: claims.scope.into_iter().collect(),
            actor_id: claims.act,
            token_id: claims.jti,
            issued_at,
            expires_at,
        })
    }

    /// Claims equivalent to this session
    pub fn to_claims(&self) -> Claims {
        Claims {
            sub: self.subject.clone(),
            app_id: self.app_id.clone(),
            tenant_id: self.tenant_id.clone(),
            mode: self.mode,
            realm: self.realm,
            network_type: self.network_type,
            scope: self.scopes.literals().map(str::to_string).collect(),
            act: self.actor_id.clone(),
            jti: self.token_id.clone(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
        }
    }

    /// Same identity and scopes under a new token id and lifetime
    pub(crate) fn reissue(
        &self,
        token_id: TokenId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id,
            issued_at,
            expires_at,
            ..self.clone()
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The acting principal of a delegated session
    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `expires_at - now`; zero or negative means expired
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_in(now) <= Duration::zero()
    }

    /// Whether the session's scopes satisfy `requirement`
    pub fn has_scope(&self, requirement: &ScopeRequirement) -> bool {
        self.scopes.satisfies(requirement)
    }
}

fn timestamp(secs: i64, claim: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| DecodeError::InvalidClaims(format!("{} out of range: {}", claim, secs)))
}
