//! BloodConnect Core - Shared infrastructure
//!
//! Error handling, configuration and logging used by every BloodConnect crate

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
