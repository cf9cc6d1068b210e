//! Shared traits for the ICOM platform

pub mod clock;

// Re-export commonly used traits
pub use clock::{Clock, ManualClock, SystemClock};
