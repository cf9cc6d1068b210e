//! Communication channels gated by the authorization core

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A communication feature being gated
///
/// Each channel has a stable string identifier shared with the UI and
/// with policy files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Chat,
    Call,
    Meeting,
    Contact,
    Correspondence,
}

impl Channel {
    /// The known-channel set
    pub const ALL: [Channel; 5] = [
        Channel::Chat,
        Channel::Call,
        Channel::Meeting,
        Channel::Contact,
        Channel::Correspondence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Call => "call",
            Channel::Meeting => "meeting",
            Channel::Contact => "contact",
            Channel::Correspondence => "correspondence",
        }
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownChannel(s.to_string()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_identifiers_are_stable() {
        let ids: Vec<&str> = Channel::ALL.iter().map(Channel::as_str).collect();
        assert_eq!(ids, vec!["chat", "call", "meeting", "contact", "correspondence"]);
    }

    #[test]
    fn test_unknown_channel() {
        assert_eq!("call".parse::<Channel>().unwrap(), Channel::Call);
        assert!(matches!("fax".parse::<Channel>(), Err(CoreError::UnknownChannel(_))));
    }
}
