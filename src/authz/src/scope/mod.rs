//! Scope model
//!
//! Parses capability literals and decides whether a held scope set
//! satisfies a requirement.
//!
//! # Examples
//!
//! ```
//! use icom_authz::scope::{ScopeRequirement, ScopeSet};
//!
//! let held: ScopeSet = ["icom:chat:*", "icom:contact:read"].into_iter().collect();
//! let requirement = ScopeRequirement::new(["icom:chat:send"]).unwrap();
//!
//! assert!(held.satisfies(&requirement));
//! ```

mod types;
mod set;


pub use types::{matches, Scope, ScopeError, ScopeResult, WILDCARD};
pub use set::{group, has_feature_scope, ScopeRequirement, ScopeSet};
