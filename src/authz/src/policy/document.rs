//! Serialized policy documents (TOML files, JSON over the admin API)

use icom_core::{Channel, Realm};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use super::{CrossRealmPolicy, NetworkGate};
use crate::error::{AuthzError, Result};
use crate::scope::ScopeRequirement;

const BUILTIN_POLICY: &str = include_str!("builtin.toml");

/// One realm-pair row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub from: Realm,
    pub to: Realm,
    #[serde(default)]
    pub allow: Vec<Channel>,
    #[serde(default)]
    pub deny: Vec<Channel>,
}

/// Policy definition as written by administrators
///
/// ```toml
/// [requirements]
/// call = ["icom:call:use"]
///
/// [gate.correspondence]
/// network_type = "government"
///
/// [[rule]]
/// from = "business"
/// to = "business"
/// allow = ["call"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDocument>,

    /// Channel identifier → gate
    #[serde(default, rename = "gate")]
    pub gates: BTreeMap<String, NetworkGate>,

    /// Channel identifier → acceptable scope patterns (any one suffices)
    #[serde(default)]
    pub requirements: BTreeMap<String, Vec<String>>,
}

impl PolicyDocument {
    /// The document behind [`CrossRealmPolicy::builtin`]
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_POLICY)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::InvalidPolicy(format!("Failed to parse policy: {}", e)))
    }

    /// Load a policy document from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        debug!("Loaded policy document from {}", path.as_ref().display());
        Self::from_toml_str(&contents)
    }

    /// Validate and convert into an immutable table
    pub fn into_policy(self) -> Result<CrossRealmPolicy> {
        let mut builder = CrossRealmPolicy::builder();
        let mut seen_pairs = HashSet::new();
        let mut allowed_channels = HashSet::new();

        for rule in &self.rules {
            if !seen_pairs.insert((rule.from, rule.to)) {
                return Err(AuthzError::InvalidPolicy(format!(
                    "duplicate rule for {} -> {}",
                    rule.from, rule.to
                )));
            }

            if let Some(channel) = rule.allow.iter().find(|c| rule.deny.contains(c)) {
                return Err(AuthzError::InvalidPolicy(format!(
                    "{} is both allowed and denied for {} -> {}",
                    channel, rule.from, rule.to
                )));
            }

            allowed_channels.extend(rule.allow.iter().copied());
            builder = builder
                .allow(rule.from, rule.to, &rule.allow)
                .deny(rule.from, rule.to, &rule.deny);
        }

        for (name, gate) in self.gates {
            builder = builder.gate(parse_channel(&name)?, gate);
        }

        let mut required_channels = HashSet::new();
        for (name, patterns) in self.requirements {
            let channel = parse_channel(&name)?;
            builder = builder.require(channel, ScopeRequirement::new(&patterns)?);
            required_channels.insert(channel);
        }

        let mut unguarded: Vec<Channel> = allowed_channels
            .difference(&required_channels)
            .copied()
            .collect();
        if !unguarded.is_empty() {
            unguarded.sort();
            let names: Vec<&str> = unguarded.iter().map(Channel::as_str).collect();
            return Err(AuthzError::InvalidPolicy(format!(
                "allowed channels without a scope requirement: {}",
                names.join(", ")
            )));
        }

        Ok(builder.build())
    }
}

fn parse_channel(name: &str) -> Result<Channel> {
    name.parse()
        .map_err(|e: icom_core::CoreError| AuthzError::InvalidPolicy(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use icom_core::NetworkType;

    #[test]
    fn test_builtin_policy_loads() {
        let policy = CrossRealmPolicy::builtin().unwrap();

        assert!(policy.is_realm_pair_allowed(Realm::Business, Realm::Business, Channel::Call));
        assert!(!policy.is_realm_pair_allowed(Realm::Citizen, Realm::Citizen, Channel::Correspondence));
        assert!(!policy.is_realm_pair_allowed(Realm::Citizen, Realm::Business, Channel::Meeting));

        let gate = policy.network_gate(Channel::Correspondence);
        assert_eq!(gate.network_type, Some(NetworkType::Government));
        assert_eq!(gate.realm, Some(Realm::Government));

        for channel in Channel::ALL {
            assert!(policy.requirement(channel).is_some(), "{} has no requirement", channel);
        }
    }

    #[test]
    fn test_rejects_allow_and_deny_overlap() {
        let doc = PolicyDocument::from_toml_str(
            r#"
            [requirements]
            chat = ["icom:chat:send"]

            [[rule]]
            from = "citizen"
            to = "citizen"
            allow = ["chat"]
            deny = ["chat"]
            "#,
        )
        .unwrap();

        assert!(matches!(doc.into_policy(), Err(AuthzError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rejects_duplicate_pair() {
        let doc = PolicyDocument {
            rules: vec![
                RuleDocument {
                    from: Realm::Citizen,
                    to: Realm::Citizen,
                    allow: vec![],
                    deny: vec![],
                };
                2
            ],
            ..Default::default()
        };

        assert!(matches!(doc.into_policy(), Err(AuthzError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rejects_unknown_channel_and_bad_scope() {
        let doc = PolicyDocument::from_toml_str(
            r#"
            [requirements]
            fax = ["icom:fax:send"]
            "#,
        )
        .unwrap();
        assert!(matches!(doc.into_policy(), Err(AuthzError::InvalidPolicy(_))));

        let doc = PolicyDocument::from_toml_str(
            r#"
            [requirements]
            chat = ["icom:chat:*"]
            "#,
        )
        .unwrap();
        assert!(matches!(doc.into_policy(), Err(AuthzError::InvalidScope(_))));
    }

    #[test]
    fn test_rejects_allowed_channel_without_requirement() {
        let doc = PolicyDocument::from_toml_str(
            r#"
            [[rule]]
            from = "business"
            to = "business"
            allow = ["call"]
            "#,
        )
        .unwrap();

        let err = doc.into_policy().unwrap_err();
        assert!(err.to_string().contains("call"));
    }

    #[test]
    fn test_rejects_unparsable_toml() {
        assert!(matches!(
            PolicyDocument::from_toml_str("[[rule]]\nfrom = \"mars\""),
            Err(AuthzError::InvalidPolicy(_))
        ));
    }
}
