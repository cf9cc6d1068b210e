//! Cross-realm policy matrix
//!
//! Static organizational rules: which channel a realm may use toward
//! another realm, which channels carry an additional network/realm gate,
//! and which scopes each channel requires. A [`CrossRealmPolicy`] is never
//! mutated after construction; updates go through [`PolicyStore::replace`],
//! which swaps in a whole new table.

use icom_core::{Channel, NetworkType, Realm};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::scope::ScopeRequirement;

pub mod document;
pub mod store;

pub use document::{PolicyDocument, RuleDocument};
pub use store::PolicyStore;

/// Additional constraint on the acting session for one channel
///
/// A gate with both fields unset imposes nothing beyond the realm-pair
/// table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGate {
    /// Session must be bound to this network type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,

    /// Session must belong to this realm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<Realm>,
}

impl NetworkGate {
    pub fn is_open(&self) -> bool {
        self.network_type.is_none() && self.realm.is_none()
    }
}

/// Immutable cross-realm policy table
#[derive(Debug, Clone, Default)]
pub struct CrossRealmPolicy {
    /// Assigned by the [`PolicyStore`]; 0 for a table never installed
    version: u64,
    rows: HashMap<(Realm, Realm), BTreeMap<Channel, bool>>,
    gates: BTreeMap<Channel, NetworkGate>,
    requirements: BTreeMap<Channel, ScopeRequirement>,
}

impl CrossRealmPolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// The built-in organizational matrix
    pub fn builtin() -> crate::Result<Self> {
        PolicyDocument::builtin()?.into_policy()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Realm-pair lookup; an absent entry is denied
    pub fn is_realm_pair_allowed(&self, from: Realm, to: Realm, channel: Channel) -> bool {
        self.rows
            .get(&(from, to))
            .and_then(|row| row.get(&channel))
            .copied()
            .unwrap_or(false)
    }

    /// Gate for a channel; open when none is configured
    pub fn network_gate(&self, channel: Channel) -> NetworkGate {
        self.gates.get(&channel).copied().unwrap_or_default()
    }

    /// Scope requirement for a channel, if any
    pub fn requirement(&self, channel: Channel) -> Option<&ScopeRequirement> {
        self.requirements.get(&channel)
    }

    /// Owned projection of one matrix row for audit/debug display
    pub fn snapshot(&self, from: Realm, to: Realm) -> PolicySnapshot {
        PolicySnapshot {
            from,
            to,
            version: self.version,
            channels: Channel::ALL
                .into_iter()
                .map(|c| (c, self.is_realm_pair_allowed(from, to, c)))
                .collect(),
            gates: self
                .gates
                .iter()
                .filter(|(_, gate)| !gate.is_open())
                .map(|(c, gate)| (*c, *gate))
                .collect(),
            requirements: self
                .requirements
                .iter()
                .map(|(c, req)| (*c, req.literals()))
                .collect(),
        }
    }
}

/// Read-only view of one `(from, to)` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    pub from: Realm,
    pub to: Realm,
    pub version: u64,
    /// Every known channel with its resolved realm-pair verdict
    pub channels: BTreeMap<Channel, bool>,
    pub gates: BTreeMap<Channel, NetworkGate>,
    pub requirements: BTreeMap<Channel, Vec<String>>,
}

/// Builder for [`CrossRealmPolicy`]
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    policy: CrossRealmPolicy,
}

impl PolicyBuilder {
    /// Allow `channels` from one realm toward another
    pub fn allow(mut self, from: Realm, to: Realm, channels: &[Channel]) -> Self {
        let row = self.policy.rows.entry((from, to)).or_default();
        for channel in channels {
            row.insert(*channel, true);
        }
        self
    }

    /// Explicitly deny `channels`; equivalent to leaving them absent
    pub fn deny(mut self, from: Realm, to: Realm, channels: &[Channel]) -> Self {
        let row = self.policy.rows.entry((from, to)).or_default();
        for channel in channels {
            row.insert(*channel, false);
        }
        self
    }

    pub fn gate(mut self, channel: Channel, gate: NetworkGate) -> Self {
        self.policy.gates.insert(channel, gate);
        self
    }

    pub fn require(mut self, channel: Channel, requirement: ScopeRequirement) -> Self {
        self.policy.requirements.insert(channel, requirement);
        self
    }

    pub fn build(self) -> CrossRealmPolicy {
        self.policy
    }
}
