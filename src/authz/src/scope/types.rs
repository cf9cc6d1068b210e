//! Scope type definitions and validation
//!
//! Provides the core Scope type: a capability literal of the form
//! `resource:action` or `resource:feature:action`.

use std::fmt;
use std::str::FromStr;

/// Wildcard action segment
pub const WILDCARD: &str = "*";

/// Result type for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors that can occur during scope operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Empty scope string provided
    EmptyScope,
    /// Wrong number of segments
    InvalidFormat(String),
    /// Invalid wildcard usage
    InvalidWildcard(String),
    /// Scope segment is empty
    EmptySegment,
    /// A requirement was built from zero patterns
    EmptyRequirement,
    /// A requirement pattern used a wildcard action
    WildcardRequirement(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyScope => write!(f, "Scope cannot be empty"),
            Self::InvalidFormat(msg) => write!(f, "Invalid scope format: {}", msg),
            Self::InvalidWildcard(msg) => write!(f, "Invalid wildcard usage: {}", msg),
            Self::EmptySegment => write!(f, "Scope segment cannot be empty"),
            Self::EmptyRequirement => write!(f, "Scope requirement needs at least one pattern"),
            Self::WildcardRequirement(s) => {
                write!(f, "Scope requirement must name a concrete action: '{}'", s)
            }
        }
    }
}

impl std::error::Error for ScopeError {}

/// A capability string granting a principal the right to perform an action
///
/// - `icom:contact:read` grants reading contacts
/// - `icom:chat:*` grants every chat action
/// - `directory:read` (two segments) has no feature
///
/// Scopes are compared structurally: segments match positionally and the
/// only wildcard is a `*` in the action position of a *held* scope.
///
/// # Examples
///
/// ```
/// use icom_authz::scope::Scope;
///
/// let held = Scope::new("icom:chat:*").unwrap();
/// let required = Scope::new("icom:chat:send").unwrap();
/// assert!(held.grants(&required));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Original scope string
    raw: String,
    resource: String,
    feature: Option<String>,
    action: String,
}

impl Scope {
    /// Parses a scope literal
    ///
    /// # Arguments
    ///
    /// * `s` - The scope string (e.g., "icom:call:use")
    ///
    /// # Returns
    ///
    /// Returns a `ScopeResult<Self>` containing the parsed scope or an error
    pub fn new(s: &str) -> ScopeResult<Self> {
        if s.is_empty() {
            return Err(ScopeError::EmptyScope);
        }

        let segments: Vec<&str> = s.split(':').collect();
        if segments.len() != 2 && segments.len() != 3 {
            return Err(ScopeError::InvalidFormat(format!(
                "expected 2 or 3 segments, got {} in '{}'",
                segments.len(),
                s
            )));
        }

        for (idx, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(ScopeError::EmptySegment);
            }

            let is_action = idx == segments.len() - 1;
            if segment.contains('*') && !(is_action && *segment == WILDCARD) {
                return Err(ScopeError::InvalidWildcard(format!(
                    "only a standalone '*' action is allowed: '{}'",
                    s
                )));
            }
        }

        let (resource, feature, action) = match segments.as_slice() {
            [resource, action] => (*resource, None, *action),
            [resource, feature, action] => (*resource, Some(feature.to_string()), *action),
            _ => unreachable!("segment count checked above"),
        };

        Ok(Self {
            raw: s.to_string(),
            resource: resource.to_string(),
            feature,
            action: action.to_string(),
        })
    }

    /// Returns the raw scope string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns whether the action segment is the wildcard
    pub fn is_wildcard(&self) -> bool {
        self.action == WILDCARD
    }

    /// `resource` or `resource:feature`
    pub fn prefix(&self) -> String {
        match &self.feature {
            Some(feature) => format!("{}:{}", self.resource, feature),
            None => self.resource.clone(),
        }
    }

    /// Whether holding this scope satisfies `required`
    ///
    /// Resource and feature must be identical. A wildcard held action covers
    /// every concrete action; a wildcard *required* action never matches,
    /// since requirements always name a concrete action.
    pub fn grants(&self, required: &Scope) -> bool {
        if required.is_wildcard() {
            return false;
        }

        if self.resource != required.resource || self.feature != required.feature {
            return false;
        }

        self.is_wildcard() || self.action == required.action
    }
}

/// Tests whether a held scope literal satisfies a required scope literal
///
/// Malformed literals on either side never match.
pub fn matches(held: &str, required: &str) -> bool {
    match (Scope::new(held), Scope::new(required)) {
        (Ok(held), Ok(required)) => held.grants(&required),
        _ => false,
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_creation() {
        let scope = Scope::new("icom:call:use").unwrap();
        assert_eq!(scope.resource(), "icom");
        assert_eq!(scope.feature(), Some("call"));
        assert_eq!(scope.action(), "use");
        assert_eq!(scope.prefix(), "icom:call");
        assert!(!scope.is_wildcard());
    }

    #[test]
    fn test_two_segment_scope() {
        let scope = Scope::new("directory:read").unwrap();
        assert_eq!(scope.feature(), None);
        assert_eq!(scope.prefix(), "directory");
    }

    #[test]
    fn test_segment_count() {
        assert!(matches!(Scope::new("icom"), Err(ScopeError::InvalidFormat(_))));
        assert!(matches!(
            Scope::new("icom:chat:send:extra"),
            Err(ScopeError::InvalidFormat(_))
        ));
        assert!(matches!(Scope::new(""), Err(ScopeError::EmptyScope)));
        assert!(matches!(Scope::new("icom::send"), Err(ScopeError::EmptySegment)));
    }

    #[test]
    fn test_wildcard_only_in_action() {
        assert!(Scope::new("icom:chat:*").unwrap().is_wildcard());
        assert!(matches!(Scope::new("icom:*:send"), Err(ScopeError::InvalidWildcard(_))));
        assert!(matches!(Scope::new("icom:chat:se*"), Err(ScopeError::InvalidWildcard(_))));
    }

    #[test]
    fn test_wildcard_grants_any_action() {
        assert!(matches("icom:chat:*", "icom:chat:send"));
        assert!(matches("icom:chat:*", "icom:chat:moderate"));
        assert!(!matches("icom:chat:*", "icom:call:use"));
    }

    #[test]
    fn test_concrete_action_does_not_generalize() {
        assert!(matches("icom:chat:send", "icom:chat:send"));
        assert!(!matches("icom:chat:send", "icom:chat:moderate"));
    }

    #[test]
    fn test_wildcard_requirement_is_meaningless() {
        assert!(!matches("icom:chat:*", "icom:chat:*"));
        assert!(!matches("icom:chat:send", "icom:chat:*"));
    }

    #[test]
    fn test_feature_must_match_positionally() {
        assert!(!matches("icom:send", "icom:chat:send"));
        assert!(!matches("icom:*", "icom:chat:send"));
    }

    #[test]
    fn test_malformed_never_matches() {
        assert!(!matches("icom", "icom:chat:send"));
        assert!(!matches("icom:chat:send", "garbage"));
    }
}
