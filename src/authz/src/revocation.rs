//! Revocation store: the registry of token ids that are no longer trusted
//!
//! This is the one piece of shared mutable state in the authorization
//! core. Entries are inserted on explicit revoke and on refresh, and are
//! only ever removed by [`RevocationStore::prune`] once the token they
//! describe can no longer be presented successfully.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use icom_core::TokenId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// A revoked token id plus the bookkeeping needed to prune it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub token_id: TokenId,
    pub revoked_at: DateTime<Utc>,
    /// Original expiry of the revoked token
    pub expires_at: DateTime<Utc>,
}

impl RevocationEntry {
    pub fn new(
        token_id: impl Into<TokenId>,
        revoked_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            revoked_at,
            expires_at,
        }
    }
}

/// Revocation store trait
///
/// Implementations must support concurrent `record`/`is_revoked` without
/// lost updates.
pub trait RevocationStore: Send + Sync {
    /// Idempotent insert
    ///
    /// Returns `true` if the token id was not revoked before this call.
    /// A repeated record keeps the original entry.
    fn record(&self, entry: RevocationEntry) -> bool;

    /// Whether a token id has been revoked
    fn is_revoked(&self, token_id: &str) -> bool;

    /// All revoked token ids (audit/debug only)
    fn list(&self) -> BTreeSet<TokenId>;

    /// All entries, sorted by token id (audit/debug only)
    fn entries(&self) -> Vec<RevocationEntry>;

    /// Removes entries whose token expired at or before `cutoff`
    ///
    /// Returns the number of entries removed. Entries for tokens that have
    /// not expired are always kept.
    fn prune(&self, cutoff: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory revocation store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: DashMap<TokenId, RevocationEntry>,
}

impl InMemoryRevocationStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn record(&self, entry: RevocationEntry) -> bool {
        match self.entries.entry(entry.token_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!("Recording revocation of token {}", entry.token_id);
                slot.insert(entry);
                true
            }
        }
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.contains_key(token_id)
    }

    fn list(&self) -> BTreeSet<TokenId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn entries(&self) -> Vec<RevocationEntry> {
        let mut entries: Vec<RevocationEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.token_id.cmp(&b.token_id));
        entries
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > cutoff);
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            debug!("Pruned {} expired revocation entries", removed);
        }
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_record_is_idempotent() {
        let store = InMemoryRevocationStore::new();
        let entry = RevocationEntry::new("tok-1", t0(), t0() + Duration::hours(1));

        assert!(store.record(entry.clone()));
        assert!(!store.record(RevocationEntry::new(
            "tok-1",
            t0() + Duration::minutes(5),
            t0() + Duration::hours(1),
        )));

        assert!(store.is_revoked("tok-1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].revoked_at, t0());
    }

    #[test]
    fn test_list_is_sorted() {
        let store = InMemoryRevocationStore::new();
        for id in ["c", "a", "b"] {
            store.record(RevocationEntry::new(id, t0(), t0() + Duration::hours(1)));
        }

        let ids: Vec<String> = store.list().into_iter().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prune_keeps_unexpired_entries() {
        let store = InMemoryRevocationStore::new();
        store.record(RevocationEntry::new("expired", t0(), t0() - Duration::minutes(1)));
        store.record(RevocationEntry::new("live", t0(), t0() + Duration::hours(1)));

        assert_eq!(store.prune(t0()), 1);
        assert_eq!(store.prune(t0()), 0);
        assert_eq!(store.prune(t0()), 0);

        assert!(!store.is_revoked("expired"));
        assert!(store.is_revoked("live"));
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let store = Arc::new(InMemoryRevocationStore::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..250 {
                        let id = format!("tok-{}-{}", worker, i);
                        store.record(RevocationEntry::new(id, t0(), t0() + Duration::hours(1)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 2_000);
        assert!(store.is_revoked("tok-7-249"));
    }
}
