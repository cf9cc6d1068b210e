//! # ICOM Authorization Core
//!
//! Decides whether a session may use a communication channel toward a
//! target realm, and says why when it may not.
//!
//! ## Components
//!
//! - **Scope model**: `resource[:feature]:action` scopes with wildcard actions
//! - **Sessions**: decoded token claims, refresh and revocation
//! - **Revocation store**: concurrent set of retired token ids
//! - **Cross-realm policy**: realm-pair table, network gates, scope
//!   requirements, swapped atomically
//! - **Decision engine**: fixed-order evaluation with stable reason codes
//!
//! ## Example
//!
//! ```rust
//! use icom_authz::{AuthzConfig, AuthzService, ReasonCode};
//! use icom_authz::session::{encode_unsigned, Claims, SessionMode};
//! use icom_core::{Channel, NetworkType, Realm};
//!
//! let service = AuthzService::from_config(&AuthzConfig::default()).unwrap();
//!
//! let now = chrono::Utc::now().timestamp();
//! let token = encode_unsigned(&Claims {
//!     sub: "user-1".to_string(),
//!     app_id: "console".to_string(),
//!     tenant_id: "tenant-a".to_string(),
//!     mode: SessionMode::Service,
//!     realm: Realm::Business,
//!     network_type: NetworkType::Commercial,
//!     scope: vec!["icom:call:use".to_string()],
//!     act: None,
//!     jti: "tok-1".to_string(),
//!     iat: now,
//!     exp: now + 3600,
//! });
//!
//! let session = service.decode(&token).unwrap();
//! assert!(service.can_communicate(&session, Realm::Business, Channel::Call).allowed);
//!
//! let decision = service.can_communicate(&session, Realm::Business, Channel::Correspondence);
//! assert_eq!(decision.reason_code, ReasonCode::NetworkGateFailed);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod revocation;
pub mod scope;
pub mod server;
pub mod service;
pub mod session;

pub use config::AuthzConfig;
pub use engine::{AuthorizationDecision, DecisionEngine, EngineConfig, ReasonCode};
pub use error::{AuthzError, DecodeError, Result};
pub use policy::{CrossRealmPolicy, NetworkGate, PolicyDocument, PolicySnapshot, PolicyStore};
pub use revocation::{InMemoryRevocationStore, RevocationEntry, RevocationStore};
pub use scope::{Scope, ScopeError, ScopeRequirement, ScopeSet};
pub use service::AuthzService;
pub use session::{Session, SessionManager, SessionMode, SessionSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
