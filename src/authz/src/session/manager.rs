//! Session lifecycle: decode, refresh, revoke

use chrono::{DateTime, Duration, Utc};
use icom_core::{Clock, TokenId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{decode, Session};
use crate::error::{AuthzError, DecodeError, Result};
use crate::revocation::{RevocationEntry, RevocationStore};

/// Session lifetime settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Lifetime granted by a refresh
    pub ttl: Duration,

    /// How long after expiry a session may still be refreshed
    pub refresh_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            refresh_grace: Duration::zero(),
        }
    }
}

/// Owns the revocation store and answers lifecycle questions about sessions
///
/// # Example
///
/// ```
/// use icom_authz::revocation::InMemoryRevocationStore;
/// use icom_authz::session::{SessionManager, SessionSettings};
/// use icom_core::SystemClock;
/// use std::sync::Arc;
///
/// let manager = SessionManager::new(
///     Arc::new(InMemoryRevocationStore::new()),
///     Arc::new(SystemClock),
///     SessionSettings::default(),
/// );
/// assert!(manager.list_revocations().is_empty());
/// ```
pub struct SessionManager {
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            revocations,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Decode a raw token
    pub fn decode(&self, raw: &str) -> std::result::Result<Session, DecodeError> {
        decode(raw)
    }

    pub fn is_revoked(&self, session: &Session) -> bool {
        self.revocations.is_revoked(session.token_id())
    }

    pub fn is_expired(&self, session: &Session) -> bool {
        session.is_expired(self.clock.now())
    }

    /// Not expired and not revoked
    pub fn is_valid(&self, session: &Session) -> bool {
        !self.is_expired(session) && !self.is_revoked(session)
    }

    /// Issue a new session with a new token id and extended lifetime
    ///
    /// Identity, realm, network and scopes carry over unchanged. The old
    /// token id is revoked; a token id can be refreshed at most once, so a
    /// concurrent second refresh of the same session fails as revoked.
    pub fn refresh(&self, session: &Session) -> Result<Session> {
        let now = self.clock.now();

        if self.is_revoked(session) {
            warn!("Refresh refused for revoked token {}", session.token_id());
            return Err(AuthzError::SessionRevoked(session.token_id().to_string()));
        }

        if self.is_past_grace(session, now) {
            warn!("Refresh refused for expired token {}", session.token_id());
            return Err(AuthzError::SessionExpired(session.token_id().to_string()));
        }

        let expires_at = now.checked_add_signed(self.settings.ttl).ok_or_else(|| {
            AuthzError::Config(format!(
                "session ttl of {}s overflows the refreshed expiry",
                self.settings.ttl.num_seconds()
            ))
        })?;

        let retired = RevocationEntry::new(session.token_id(), now, session.expires_at());
        if !self.revocations.record(retired) {
            return Err(AuthzError::SessionRevoked(session.token_id().to_string()));
        }

        let refreshed = session.reissue(Uuid::new_v4().to_string(), now, expires_at);

        info!(
            subject = session.subject(),
            actor = session.actor_id().unwrap_or("-"),
            "Refreshed session {} -> {}",
            session.token_id(),
            refreshed.token_id()
        );

        Ok(refreshed)
    }

    /// Expired for at least the refresh grace window
    ///
    /// Agrees with the prune cutoff: an entry is prunable exactly when its
    /// token can no longer be refreshed.
    fn is_past_grace(&self, session: &Session, now: DateTime<Utc>) -> bool {
        match session.expires_at().checked_add_signed(self.settings.refresh_grace) {
            Some(limit) => now >= limit,
            None => false,
        }
    }

    /// Revoke a session; terminal and idempotent
    pub fn revoke(&self, session: &Session) {
        let entry = RevocationEntry::new(session.token_id(), self.clock.now(), session.expires_at());
        if self.revocations.record(entry) {
            info!(
                subject = session.subject(),
                actor = session.actor_id().unwrap_or("-"),
                "Revoked session {}",
                session.token_id()
            );
        }
    }

    /// Revoked token ids (inspection only)
    pub fn list_revocations(&self) -> BTreeSet<TokenId> {
        self.revocations.list()
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    /// Drop revocation entries that can no longer matter
    ///
    /// An entry is kept until its token is past both expiry and the refresh
    /// grace window, since within the grace window a revoked token could
    /// otherwise be refreshed again.
    pub fn prune_revocations(&self) -> usize {
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.settings.refresh_grace) else {
            return 0;
        };
        let removed = self.revocations.prune(cutoff);
        if removed > 0 {
            info!("Pruned {} revocation entries", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revocation::InMemoryRevocationStore;
    use crate::session::{Claims, SessionMode};
    use chrono::TimeZone;
    use icom_core::{ManualClock, NetworkType, Realm};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn session(expires_in: Duration) -> Session {
        Session::from_claims(Claims {
            sub: "user-1".to_string(),
            app_id: "console".to_string(),
            tenant_id: "tenant-a".to_string(),
            mode: SessionMode::Delegated,
            realm: Realm::Business,
            network_type: NetworkType::Commercial,
            scope: vec!["icom:call:use".to_string()],
            act: Some("assistant-1".to_string()),
            jti: "tok-original".to_string(),
            iat: start().timestamp(),
            exp: (start() + expires_in).timestamp(),
        })
        .unwrap()
    }

    fn manager(grace: Duration) -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = SessionManager::new(
            Arc::new(InMemoryRevocationStore::new()),
            clock.clone(),
            SessionSettings {
                ttl: Duration::minutes(30),
                refresh_grace: grace,
            },
        );
        (manager, clock)
    }

    #[test]
    fn test_refresh_retires_old_token() {
        let (manager, _) = manager(Duration::zero());
        let original = session(Duration::minutes(10));

        let refreshed = manager.refresh(&original).unwrap();

        assert_ne!(refreshed.token_id(), original.token_id());
        assert!(manager.is_revoked(&original));
        assert!(!manager.is_revoked(&refreshed));
        assert_eq!(refreshed.expires_at(), start() + Duration::minutes(30));
        assert_eq!(refreshed.scopes(), original.scopes());
        assert_eq!(refreshed.actor_id(), Some("assistant-1"));
    }

    #[test]
    fn test_refresh_is_single_use() {
        let (manager, _) = manager(Duration::zero());
        let original = session(Duration::minutes(10));

        manager.refresh(&original).unwrap();
        assert!(matches!(
            manager.refresh(&original),
            Err(AuthzError::SessionRevoked(_))
        ));
    }

    #[test]
    fn test_refresh_after_revoke_fails() {
        let (manager, _) = manager(Duration::zero());
        let original = session(Duration::minutes(10));

        manager.revoke(&original);
        assert!(matches!(
            manager.refresh(&original),
            Err(AuthzError::SessionRevoked(_))
        ));
    }

    #[test]
    fn test_refresh_respects_grace_window() {
        let (manager, clock) = manager(Duration::minutes(5));
        let original = session(Duration::minutes(10));

        clock.advance(Duration::minutes(14));
        assert!(manager.is_expired(&original));
        let refreshed = manager.refresh(&original).unwrap();
        assert!(manager.is_valid(&refreshed));

        let late = session(Duration::minutes(10)).reissue(
            "tok-late".to_string(),
            start(),
            start() + Duration::minutes(10),
        );
        clock.advance(Duration::minutes(2));
        assert!(matches!(
            manager.refresh(&late),
            Err(AuthzError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let (manager, _) = manager(Duration::zero());
        let original = session(Duration::minutes(10));

        manager.revoke(&original);
        manager.revoke(&original);

        assert!(manager.is_revoked(&original));
        assert_eq!(manager.list_revocations().len(), 1);
    }

    #[test]
    fn test_prune_waits_for_grace() {
        let (manager, clock) = manager(Duration::minutes(5));
        let original = session(Duration::minutes(10));
        manager.revoke(&original);

        clock.advance(Duration::minutes(12));
        assert_eq!(manager.prune_revocations(), 0);
        assert!(manager.is_revoked(&original));

        clock.advance(Duration::minutes(5));
        assert_eq!(manager.prune_revocations(), 1);
        assert!(manager.list_revocations().is_empty());
    }

    #[test]
    fn test_pruned_revocation_cannot_be_refreshed() {
        for grace in [Duration::zero(), Duration::minutes(5)] {
            let (manager, clock) = manager(grace);
            let original = session(Duration::minutes(10));
            manager.revoke(&original);

            clock.set(original.expires_at() + grace);
            assert_eq!(manager.prune_revocations(), 1);
            assert!(!manager.is_revoked(&original));
            assert!(matches!(
                manager.refresh(&original),
                Err(AuthzError::SessionExpired(_))
            ));
        }
    }

    #[test]
    fn test_refresh_at_far_future_expiry() {
        let (manager, _) = manager(Duration::minutes(5));
        let far = Session::from_claims(Claims {
            exp: DateTime::<Utc>::MAX_UTC.timestamp(),
            ..session(Duration::minutes(10)).to_claims()
        })
        .unwrap();

        let refreshed = manager.refresh(&far).unwrap();
        assert_eq!(refreshed.expires_at(), start() + Duration::minutes(30));
        assert!(manager.is_revoked(&far));
        assert_eq!(manager.prune_revocations(), 0);
    }

    #[test]
    fn test_refresh_with_overflowing_ttl_fails() {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::MAX_UTC - Duration::minutes(1)));
        let manager = SessionManager::new(
            Arc::new(InMemoryRevocationStore::new()),
            clock,
            SessionSettings {
                ttl: Duration::hours(1),
                refresh_grace: Duration::zero(),
            },
        );
        let far = Session::from_claims(Claims {
            exp: DateTime::<Utc>::MAX_UTC.timestamp(),
            ..session(Duration::minutes(10)).to_claims()
        })
        .unwrap();

        assert!(matches!(manager.refresh(&far), Err(AuthzError::Config(_))));
        assert!(!manager.is_revoked(&far));
    }
}
