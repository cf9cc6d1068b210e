//! # ICOM Core
//!
//! Shared vocabulary for the ICOM communications console: realms, network
//! types, communication channels, identifier aliases and the clock
//! abstraction used by the authorization core.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{Channel, NetworkType, Realm};
pub use traits::{Clock, ManualClock, SystemClock};

/// Unique identifier of one credential issuance
pub type TokenId = String;
/// Principal identifier (`sub` claim)
pub type SubjectId = String;
/// Multi-tenancy tenant identifier
pub type TenantId = String;
/// Client application identifier
pub type AppId = String;
