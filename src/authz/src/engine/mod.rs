//! Authorization decision engine
//!
//! Decides whether a session may use a channel toward a target realm. The
//! checks run in a fixed order and stop at the first failure:
//!
//! ```text
//! session valid? → realm pair allowed? → network gate? → realm gate? → scope?
//!  SESSION_INVALID  REALM_POLICY_DENIED  NETWORK_GATE_   REALM_GATE_   MISSING_
//!                                        FAILED          FAILED        SCOPE
//! ```
//!
//! Steps 2–5 depend only on the policy table and the session's claims, so
//! they live in [`evaluate_policy`] and are the only part that is cached.

pub mod cache;
pub mod decision;
pub mod metrics;

pub use cache::{CacheConfig, CacheStats, DecisionCache};
pub use decision::{AuthorizationDecision, ReasonCode};
pub use metrics::{EngineMetrics, MetricsCollector};

use icom_core::{Channel, Realm};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::policy::{CrossRealmPolicy, PolicySnapshot, PolicyStore};
use crate::session::{Session, SessionManager};

/// Decision engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Memoize policy/scope outcomes
    pub enable_cache: bool,

    pub cache_config: CacheConfig,

    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_config: CacheConfig::default(),
            enable_metrics: true,
        }
    }
}

/// Evaluates `can_communicate` against shared session and policy state
///
/// # Example
///
/// ```
/// use icom_authz::engine::{DecisionEngine, EngineConfig};
/// use icom_authz::policy::{CrossRealmPolicy, PolicyStore};
/// use icom_authz::revocation::InMemoryRevocationStore;
/// use icom_authz::session::{SessionManager, SessionSettings};
/// use icom_core::{Realm, SystemClock};
/// use std::sync::Arc;
///
/// let sessions = Arc::new(SessionManager::new(
///     Arc::new(InMemoryRevocationStore::new()),
///     Arc::new(SystemClock),
///     SessionSettings::default(),
/// ));
/// let policies = Arc::new(PolicyStore::new(CrossRealmPolicy::builtin().unwrap()));
/// let engine = DecisionEngine::new(EngineConfig::default(), sessions, policies);
///
/// let snapshot = engine.get_cross_realm_policy(Realm::Citizen, Realm::Citizen);
/// assert_eq!(snapshot.version, 1);
/// ```
pub struct DecisionEngine {
    sessions: Arc<SessionManager>,
    policies: Arc<PolicyStore>,
    cache: Option<DecisionCache>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl DecisionEngine {
    pub fn new(
        config: EngineConfig,
        sessions: Arc<SessionManager>,
        policies: Arc<PolicyStore>,
    ) -> Self {
        let cache = config
            .enable_cache
            .then(|| DecisionCache::new(config.cache_config.clone()));
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        info!(
            "DecisionEngine initialized with cache={}, metrics={}",
            config.enable_cache, config.enable_metrics
        );

        Self {
            sessions,
            policies,
            cache,
            metrics,
        }
    }

    /// Decide whether `session` may use `channel` toward `target`
    pub fn can_communicate(
        &self,
        session: &Session,
        target: Realm,
        channel: Channel,
    ) -> AuthorizationDecision {
        let policy = self.policies.load();
        self.decide(&policy, session, target, channel)
    }

    /// Every channel for which [`can_communicate`](Self::can_communicate)
    /// allows, evaluated against a single policy version
    pub fn get_available_channels(&self, session: &Session, target: Realm) -> BTreeSet<Channel> {
        let policy = self.policies.load();
        Channel::ALL
            .into_iter()
            .filter(|channel| self.decide(&policy, session, target, *channel).allowed)
            .collect()
    }

    /// Owned projection of one matrix row
    pub fn get_cross_realm_policy(&self, from: Realm, to: Realm) -> PolicySnapshot {
        self.policies.snapshot(from, to)
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(DecisionCache::stats)
    }

    fn decide(
        &self,
        policy: &CrossRealmPolicy,
        session: &Session,
        target: Realm,
        channel: Channel,
    ) -> AuthorizationDecision {
        let start = Instant::now();

        let decision = if self.sessions.is_expired(session) {
            AuthorizationDecision::deny(ReasonCode::SessionInvalid, "session has expired")
        } else if self.sessions.is_revoked(session) {
            AuthorizationDecision::deny(ReasonCode::SessionInvalid, "session has been revoked")
        } else {
            self.evaluate_cached(policy, session, target, channel)
        };

        debug!(
            subject = session.subject(),
            actor = session.actor_id().unwrap_or("-"),
            token = session.token_id(),
            from = %session.realm(),
            to = %target,
            %channel,
            reason = %decision.reason_code,
            "can_communicate"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&decision, start.elapsed());
        }

        decision
    }

    fn evaluate_cached(
        &self,
        policy: &CrossRealmPolicy,
        session: &Session,
        target: Realm,
        channel: Channel,
    ) -> AuthorizationDecision {
        let Some(cache) = &self.cache else {
            return evaluate_policy(policy, session, target, channel);
        };

        if let Some(decision) = cache.get(session, policy.version(), target, channel) {
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit();
            }
            return decision;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss();
        }

        let decision = evaluate_policy(policy, session, target, channel);
        cache.put(session, policy.version(), target, channel, decision.clone());
        decision
    }
}

/// Steps 2–5 of the decision: realm pair, network gate, realm gate, scope
///
/// Ignores session validity; callers must check expiry and revocation
/// first.
pub fn evaluate_policy(
    policy: &CrossRealmPolicy,
    session: &Session,
    target: Realm,
    channel: Channel,
) -> AuthorizationDecision {
    let from = session.realm();

    if !policy.is_realm_pair_allowed(from, target, channel) {
        return AuthorizationDecision::deny(
            ReasonCode::RealmPolicyDenied,
            format!("{} is not permitted from {} to {}", channel, from, target),
        );
    }

    let gate = policy.network_gate(channel);

    if let Some(required) = gate.network_type {
        if session.network_type() != required {
            return AuthorizationDecision::deny(
                ReasonCode::NetworkGateFailed,
                format!(
                    "{} requires the {} network, session is on {}",
                    channel,
                    required,
                    session.network_type()
                ),
            );
        }
    }

    if let Some(required) = gate.realm {
        if from != required {
            return AuthorizationDecision::deny(
                ReasonCode::RealmGateFailed,
                format!("{} requires the {} realm, session is {}", channel, required, from),
            );
        }
    }

    match policy.requirement(channel) {
        Some(requirement) if session.has_scope(requirement) => AuthorizationDecision::allow(
            format!("{} permitted from {} to {}", channel, from, target),
        ),
        Some(requirement) => AuthorizationDecision::deny(
            ReasonCode::MissingScope,
            format!(
                "{} requires one of: {}",
                channel,
                requirement.literals().join(", ")
            ),
        ),
        None => AuthorizationDecision::deny(
            ReasonCode::MissingScope,
            format!("{} has no scope requirement configured", channel),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NetworkGate;
    use crate::revocation::InMemoryRevocationStore;
    use crate::scope::ScopeRequirement;
    use crate::session::{Claims, SessionMode, SessionSettings};
    use chrono::{Duration, TimeZone, Utc};
    use icom_core::{ManualClock, NetworkType};

    fn session(realm: Realm, network_type: NetworkType, scopes: &[&str]) -> Session {
        let iat = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Session::from_claims(Claims {
            sub: "user-1".to_string(),
            app_id: "console".to_string(),
            tenant_id: "tenant-a".to_string(),
            mode: SessionMode::Service,
            realm,
            network_type,
            scope: scopes.iter().map(|s| s.to_string()).collect(),
            act: None,
            jti: format!("tok-{}-{}", realm, scopes.len()),
            iat: iat.timestamp(),
            exp: (iat + Duration::hours(1)).timestamp(),
        })
        .unwrap()
    }

    fn engine(config: EngineConfig) -> (DecisionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        ));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(InMemoryRevocationStore::new()),
            clock.clone(),
            SessionSettings::default(),
        ));
        let policies = Arc::new(PolicyStore::new(CrossRealmPolicy::builtin().unwrap()));
        (DecisionEngine::new(config, sessions, policies), clock)
    }

    #[test]
    fn test_evaluation_order() {
        let policy = CrossRealmPolicy::builder()
            .allow(Realm::Business, Realm::Business, &[Channel::Correspondence])
            .gate(
                Channel::Correspondence,
                NetworkGate {
                    network_type: Some(NetworkType::Government),
                    realm: Some(Realm::Government),
                },
            )
            .require(
                Channel::Correspondence,
                ScopeRequirement::new(["icom:correspondence:send"]).unwrap(),
            )
            .build();

        // Network gate is reported before the realm gate and the scope.
        let s = session(Realm::Business, NetworkType::Commercial, &[]);
        let decision = evaluate_policy(&policy, &s, Realm::Business, Channel::Correspondence);
        assert!(decision.is_denied_with(ReasonCode::NetworkGateFailed));

        let s = session(Realm::Business, NetworkType::Government, &[]);
        let decision = evaluate_policy(&policy, &s, Realm::Business, Channel::Correspondence);
        assert!(decision.is_denied_with(ReasonCode::RealmGateFailed));

        let decision = evaluate_policy(&policy, &s, Realm::Citizen, Channel::Correspondence);
        assert!(decision.is_denied_with(ReasonCode::RealmPolicyDenied));
    }

    #[test]
    fn test_channel_without_requirement_is_denied() {
        let policy = CrossRealmPolicy::builder()
            .allow(Realm::Citizen, Realm::Citizen, &[Channel::Chat])
            .build();
        let s = session(Realm::Citizen, NetworkType::Commercial, &["icom:chat:send"]);

        let decision = evaluate_policy(&policy, &s, Realm::Citizen, Channel::Chat);
        assert!(decision.is_denied_with(ReasonCode::MissingScope));
    }

    #[test]
    fn test_expired_session_is_invalid() {
        let (engine, clock) = engine(EngineConfig::default());
        let s = session(Realm::Business, NetworkType::Commercial, &["icom:call:use"]);

        assert!(engine.can_communicate(&s, Realm::Business, Channel::Call).allowed);

        clock.advance(Duration::hours(1));
        let decision = engine.can_communicate(&s, Realm::Business, Channel::Call);
        assert!(decision.is_denied_with(ReasonCode::SessionInvalid));
    }

    #[test]
    fn test_revocation_bypasses_cache() {
        let (engine, _) = engine(EngineConfig::default());
        let s = session(Realm::Business, NetworkType::Commercial, &["icom:call:use"]);

        assert!(engine.can_communicate(&s, Realm::Business, Channel::Call).allowed);
        assert!(engine.can_communicate(&s, Realm::Business, Channel::Call).allowed);
        assert_eq!(engine.cache_stats().unwrap().hits, 1);

        engine.sessions().revoke(&s);
        let decision = engine.can_communicate(&s, Realm::Business, Channel::Call);
        assert!(decision.is_denied_with(ReasonCode::SessionInvalid));
    }

    #[test]
    fn test_policy_swap_is_not_served_stale() {
        let (engine, _) = engine(EngineConfig::default());
        let s = session(Realm::Business, NetworkType::Commercial, &["icom:call:use"]);

        assert!(engine.can_communicate(&s, Realm::Business, Channel::Call).allowed);

        engine.policies().replace(CrossRealmPolicy::default());
        let decision = engine.can_communicate(&s, Realm::Business, Channel::Call);
        assert!(decision.is_denied_with(ReasonCode::RealmPolicyDenied));
    }

    #[test]
    fn test_metrics_count_reasons() {
        let (engine, _) = engine(EngineConfig {
            enable_cache: false,
            ..Default::default()
        });
        let s = session(Realm::Citizen, NetworkType::Commercial, &[]);

        engine.can_communicate(&s, Realm::Citizen, Channel::Chat);
        engine.can_communicate(&s, Realm::Citizen, Channel::Correspondence);

        let metrics = engine.metrics().unwrap().get_metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.by_reason[&ReasonCode::MissingScope], 1);
        assert_eq!(metrics.by_reason[&ReasonCode::RealmPolicyDenied], 1);
        assert!(engine.cache_stats().is_none());
    }
}
