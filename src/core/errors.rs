/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

pub use crate::core::config::ConfigError;
pub use crate::core::guard::GuardError;
pub use crate::memory::MemoryError;
pub use crate::runtime::CollectorError;

/// Unified harness error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum BenchError {
    #[error("Memory error: {0}")]
    #[diagnostic(
        code(bench::memory_error),
        help("Raw allocation failed or a released buffer was touched. Check buffer ownership.")
    )]
    Memory(#[from] MemoryError),

    #[error("Guard error: {0}")]
    #[diagnostic(
        code(bench::guard_error),
        help("A scoped resource was released more than once.")
    )]
    Guard(#[from] GuardError),

    #[error("Collector error: {0}")]
    #[diagnostic(
        code(bench::collector_error),
        help("Latency-mode scopes cannot be nested. Leave the current scope first.")
    )]
    Collector(#[from] CollectorError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(bench::configuration_error),
        help("Review the ztp_* environment variables.")
    )]
    Configuration(#[from] ConfigError),

    #[error("Workload failure: {0}")]
    #[diagnostic(code(bench::workload_failure))]
    Workload(String),
}

/// Common result type for harness operations
pub type BenchResult<T> = Result<T, BenchError>;

impl BenchError {
    /// Build a workload failure from any message
    pub fn workload(message: impl Into<String>) -> Self {
        BenchError::Workload(message.into())
    }
}

impl From<String> for BenchError {
    fn from(msg: String) -> Self {
        BenchError::Workload(msg)
    }
}

impl From<&str> for BenchError {
    fn from(msg: &str) -> Self {
        BenchError::Workload(msg.to_string())
    }
}
