/*!
 * Core Module
 * Fundamental harness types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod guard;
pub mod limits;
pub mod simd;
pub mod types;

// Re-export for convenience
pub use config::{configuration, ConfigError, Configuration, ExternalMode};
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
pub use types::*;
