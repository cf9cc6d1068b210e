//! Facade over the session, policy and decision components
//!
//! This is the surface external callers use; the server binary is a thin
//! JSON layer over it.

use icom_core::{Channel, Clock, Realm, SystemClock, TokenId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthzConfig;
use crate::engine::{AuthorizationDecision, DecisionEngine, ReasonCode};
use crate::error::{DecodeError, Result};
use crate::policy::{PolicyDocument, PolicySnapshot, PolicyStore};
use crate::revocation::{InMemoryRevocationStore, RevocationStore};
use crate::scope::{self, ScopeSet};
use crate::session::{Session, SessionManager};

pub struct AuthzService {
    sessions: Arc<SessionManager>,
    policies: Arc<PolicyStore>,
    engine: DecisionEngine,
}

impl std::fmt::Debug for AuthzService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthzService").finish_non_exhaustive()
    }
}

impl AuthzService {
    /// Build a service with an in-memory revocation store and the system clock
    pub fn from_config(config: &AuthzConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(InMemoryRevocationStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Build a service over an explicit revocation store and clock
    pub fn with_parts(
        config: &AuthzConfig,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let policy = config.load_policy()?;
        let sessions = Arc::new(SessionManager::new(
            revocations,
            clock,
            config.session_settings(),
        ));
        let policies = Arc::new(PolicyStore::new(policy));
        let engine = DecisionEngine::new(
            config.engine_config(),
            Arc::clone(&sessions),
            Arc::clone(&policies),
        );

        Ok(Self {
            sessions,
            policies,
            engine,
        })
    }

    pub fn decode(&self, raw: &str) -> std::result::Result<Session, DecodeError> {
        self.sessions.decode(raw)
    }

    pub fn refresh(&self, session: &Session) -> Result<Session> {
        self.sessions.refresh(session)
    }

    pub fn revoke(&self, session: &Session) {
        self.sessions.revoke(session)
    }

    pub fn is_revoked(&self, session: &Session) -> bool {
        self.sessions.is_revoked(session)
    }

    pub fn can_communicate(
        &self,
        session: &Session,
        target: Realm,
        channel: Channel,
    ) -> AuthorizationDecision {
        self.engine.can_communicate(session, target, channel)
    }

    /// `can_communicate` for a raw token; an undecodable token is denied
    pub fn can_communicate_with_token(
        &self,
        raw: &str,
        target: Realm,
        channel: Channel,
    ) -> AuthorizationDecision {
        match self.decode(raw) {
            Ok(session) => self.can_communicate(&session, target, channel),
            Err(e) => {
                warn!("Denying undecodable token: {}", e);
                AuthorizationDecision::deny(
                    ReasonCode::SessionInvalid,
                    format!("token could not be decoded: {}", e),
                )
            }
        }
    }

    pub fn get_available_channels(&self, session: &Session, target: Realm) -> BTreeSet<Channel> {
        self.engine.get_available_channels(session, target)
    }

    /// Available channels for a raw token; empty when undecodable
    pub fn get_available_channels_with_token(&self, raw: &str, target: Realm) -> BTreeSet<Channel> {
        match self.decode(raw) {
            Ok(session) => self.get_available_channels(&session, target),
            Err(e) => {
                warn!("Undecodable token has no channels: {}", e);
                BTreeSet::new()
            }
        }
    }

    pub fn get_cross_realm_policy(&self, from: Realm, to: Realm) -> PolicySnapshot {
        self.engine.get_cross_realm_policy(from, to)
    }

    pub fn has_feature_scope(&self, scopes: &ScopeSet, feature: &str) -> bool {
        scope::has_feature_scope(scopes, feature)
    }

    pub fn group_scopes(&self, scopes: &ScopeSet) -> BTreeMap<String, Vec<String>> {
        scope::group(scopes)
    }

    pub fn list_revocations(&self) -> BTreeSet<TokenId> {
        self.sessions.list_revocations()
    }

    pub fn prune_revocations(&self) -> usize {
        self.sessions.prune_revocations()
    }

    /// Validate a document and atomically install it, returning the new version
    pub fn replace_policy(&self, document: PolicyDocument) -> Result<u64> {
        let policy = document.into_policy()?;
        let version = self.policies.replace(policy);
        info!("Policy replaced through service, now at version {}", version);
        Ok(version)
    }

    pub fn policy_version(&self) -> u64 {
        self.policies.version()
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }
}
