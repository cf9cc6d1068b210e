//! Authorization decision types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a decision came out the way it did
///
/// The deny codes form a closed set, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Every check passed
    Allowed,
    /// Session expired or revoked
    SessionInvalid,
    /// The realm-pair table does not permit the channel
    RealmPolicyDenied,
    /// The channel requires a different network type
    NetworkGateFailed,
    /// The channel requires a different acting realm
    RealmGateFailed,
    /// No held scope satisfies the channel's requirement
    MissingScope,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 6] = [
        ReasonCode::Allowed,
        ReasonCode::SessionInvalid,
        ReasonCode::RealmPolicyDenied,
        ReasonCode::NetworkGateFailed,
        ReasonCode::RealmGateFailed,
        ReasonCode::MissingScope,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Allowed => "ALLOWED",
            ReasonCode::SessionInvalid => "SESSION_INVALID",
            ReasonCode::RealmPolicyDenied => "REALM_POLICY_DENIED",
            ReasonCode::NetworkGateFailed => "NETWORK_GATE_FAILED",
            ReasonCode::RealmGateFailed => "REALM_GATE_FAILED",
            ReasonCode::MissingScope => "MISSING_SCOPE",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `can_communicate` evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason_code: ReasonCode,
    pub human_reason: String,
}

impl AuthorizationDecision {
    /// Allow decision
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason_code: ReasonCode::Allowed,
            human_reason: reason.into(),
        }
    }

    /// Deny decision
    pub fn deny(code: ReasonCode, reason: impl Into<String>) -> Self {
        debug_assert!(code != ReasonCode::Allowed, "deny with ALLOWED code");
        Self {
            allowed: false,
            reason_code: code,
            human_reason: reason.into(),
        }
    }

    pub fn is_denied_with(&self, code: ReasonCode) -> bool {
        !self.allowed && self.reason_code == code
    }
}
