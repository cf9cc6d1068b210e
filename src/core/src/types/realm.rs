//! Organizational realms and network types

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Organizational category of a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    Citizen,
    Government,
    Business,
}

impl Realm {
    /// Every realm, in declaration order
    pub const ALL: [Realm; 3] = [Realm::Citizen, Realm::Government, Realm::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Realm::Citizen => "citizen",
            Realm::Government => "government",
            Realm::Business => "business",
        }
    }
}

impl FromStr for Realm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Realm::Citizen),
            "government" => Ok(Realm::Government),
            "business" => Ok(Realm::Business),
            other => Err(CoreError::UnknownRealm(other.to_string())),
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport/administrative domain a session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Government,
    Commercial,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Government => "government",
            NetworkType::Commercial => "commercial",
        }
    }
}

impl FromStr for NetworkType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "government" => Ok(NetworkType::Government),
            "commercial" => Ok(NetworkType::Commercial),
            other => Err(CoreError::UnknownNetworkType(other.to_string())),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
