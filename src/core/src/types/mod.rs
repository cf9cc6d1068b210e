//! Shared types for the ICOM platform

pub mod realm;
pub mod channel;

// Re-export commonly used types
pub use realm::{NetworkType, Realm};
pub use channel::Channel;
