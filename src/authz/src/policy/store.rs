//! Versioned, atomically swappable policy holder

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

use super::{CrossRealmPolicy, PolicySnapshot};
use icom_core::Realm;

/// Holds the current [`CrossRealmPolicy`]
///
/// Readers take a cheap `Arc` snapshot and keep evaluating against it even
/// if an update lands mid-request; a reader never sees a half-applied
/// table. Every [`replace`](Self::replace) installs a new table with a
/// strictly greater version.
pub struct PolicyStore {
    current: ArcSwap<CrossRealmPolicy>,
}

impl PolicyStore {
    /// Install `initial` as version 1
    pub fn new(initial: CrossRealmPolicy) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial.with_version(1)),
        }
    }

    /// Current table
    pub fn load(&self) -> Arc<CrossRealmPolicy> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Atomically swap in a new table, returning its version
    pub fn replace(&self, policy: CrossRealmPolicy) -> u64 {
        let previous = self.current.rcu(|current| {
            Arc::new(policy.clone().with_version(current.version() + 1))
        });
        let version = previous.version() + 1;

        info!("Installed cross-realm policy version {}", version);
        version
    }

    /// Snapshot of one row of the current table
    pub fn snapshot(&self, from: Realm, to: Realm) -> PolicySnapshot {
        self.current.load().snapshot(from, to)
    }
}
