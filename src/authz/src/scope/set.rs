//! Scope sets and requirements
//!
//! A [`ScopeSet`] is what a session holds; a [`ScopeRequirement`] is what a
//! channel asks for. Holding any one pattern of a requirement satisfies it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{Scope, ScopeError, ScopeResult};

/// Unordered set of scopes, unique by literal string
///
/// Malformed literals are retained so audit surfaces can show exactly what a
/// token carried, but they grant nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet {
    literals: BTreeSet<String>,
    parsed: Vec<Scope>,
}

impl ScopeSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a literal, returning `false` if it was already present
    pub fn insert(&mut self, literal: impl Into<String>) -> bool {
        let literal = literal.into();
        if self.literals.contains(&literal) {
            return false;
        }

        match Scope::new(&literal) {
            Ok(scope) => self.parsed.push(scope),
            Err(e) => warn!("Ignoring malformed scope '{}': {}", literal, e),
        }
        self.literals.insert(literal);
        true
    }

    pub fn contains(&self, literal: &str) -> bool {
        self.literals.contains(literal)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Every literal, sorted
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.literals.iter().map(String::as_str)
    }

    /// Well-formed scopes only
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.parsed.iter()
    }

    /// Whether any held scope grants `required`
    pub fn grants(&self, required: &Scope) -> bool {
        self.parsed.iter().any(|held| held.grants(required))
    }

    /// Whether the set satisfies a requirement (OR over its patterns)
    pub fn satisfies(&self, requirement: &ScopeRequirement) -> bool {
        requirement.any_of.iter().any(|required| self.grants(required))
    }
}

impl PartialEq for ScopeSet {
    fn eq(&self, other: &Self) -> bool {
        self.literals == other.literals
    }
}

impl Eq for ScopeSet {}

impl From<Vec<String>> for ScopeSet {
    fn from(literals: Vec<String>) -> Self {
        literals.into_iter().collect()
    }
}

impl From<ScopeSet> for Vec<String> {
    fn from(set: ScopeSet) -> Self {
        set.literals.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ScopeSet::new();
        for literal in iter {
            set.insert(literal);
        }
        set
    }
}

/// One or more acceptable scope patterns, combined with OR semantics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequirement {
    any_of: Vec<Scope>,
}

impl ScopeRequirement {
    /// Builds a requirement from concrete patterns
    ///
    /// Rejects an empty list and wildcard actions.
    pub fn new<I, S>(patterns: I) -> ScopeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any_of = Vec::new();
        for pattern in patterns {
            let scope = Scope::new(pattern.as_ref())?;
            if scope.is_wildcard() {
                return Err(ScopeError::WildcardRequirement(scope.as_str().to_string()));
            }
            if !any_of.contains(&scope) {
                any_of.push(scope);
            }
        }

        if any_of.is_empty() {
            return Err(ScopeError::EmptyRequirement);
        }

        Ok(Self { any_of })
    }

    pub fn patterns(&self) -> &[Scope] {
        &self.any_of
    }

    /// Pattern literals, in declaration order
    pub fn literals(&self) -> Vec<String> {
        self.any_of.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Groups scopes by resource for display and audit
///
/// Values are `feature:action` (or just `action` for two-segment scopes),
/// sorted; keys are sorted by resource. Malformed literals are omitted.
pub fn group(scopes: &ScopeSet) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for scope in scopes.scopes() {
        let entry = match scope.feature() {
            Some(feature) => format!("{}:{}", feature, scope.action()),
            None => scope.action().to_string(),
        };
        grouped
            .entry(scope.resource().to_string())
            .or_default()
            .insert(entry);
    }

    grouped
        .into_iter()
        .map(|(resource, entries)| (resource, entries.into_iter().collect()))
        .collect()
}

/// Whether any well-formed scope names `feature`
///
/// Three-segment scopes match on their feature segment; two-segment scopes
/// match on their resource segment. Any action counts.
pub fn has_feature_scope(scopes: &ScopeSet, feature: &str) -> bool {
    scopes.scopes().any(|scope| match scope.feature() {
        Some(f) => f == feature,
        None => scope.resource() == feature,
    })
}
