/*!
 * Harness Configuration
 *
 * Process-wide, read-only settings resolved once per run from the
 * environment. Tests and embedders build a `Configuration` directly or
 * through `from_lookup` instead of touching the global.
 */

use super::limits::{MAX_GENERATION, PRIMARY_FILL_VALUE, SECONDARY_FILL_VALUE};
use crate::bench::AllocationStrategy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

/// Collection level requested after the bitmap workload (negative = disabled)
pub const ENV_CUSTOM_COLLECT: &str = "ztp_custom_collect";
pub const ENV_POOLING: &str = "ZTP_POOLING";
pub const ENV_UNMANAGED_MODE: &str = "ZTP_UNMANAGED_MODE";
pub const ENV_USE_DISPOSE: &str = "ZTP_USE_DISPOSE";
pub const ENV_PARALLEL_DEGREE: &str = "ZTP_PARALLEL_DEGREE";
pub const ENV_USE_TASKS: &str = "ZTP_USE_TASKS";
pub const ENV_USE_SIMD: &str = "ZTP_USE_SIMD";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown scenario {0:?}: expected bitmap, gc, optimization or all")]
    UnknownScenario(String),
}

/// Where external (unmanaged) buffers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalMode {
    /// Managed paths only (pooled or plain)
    Off,
    /// Process-heap style raw allocation
    HGlobal,
    /// Task-allocator style raw allocation; same buffer type, different fill
    CoTask,
}

impl ExternalMode {
    fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(ExternalMode::Off),
            "1" => Some(ExternalMode::HGlobal),
            "2" => Some(ExternalMode::CoTask),
            _ => None,
        }
    }
}

/// Immutable configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Configuration {
    /// Generation to collect after the bitmap workload; `None` disables it
    pub collection_trigger_level: Option<u8>,
    pub pooling_enabled: bool,
    pub external_mode: ExternalMode,
    /// Scoped release for external buffers; `false` leaves them to the finalizer
    pub explicit_release_requested: bool,
    /// Worker count for the parallel loop; `None` skips it
    pub parallel_degree: Option<NonZeroUsize>,
    pub tasks_enabled: bool,
    pub simd_enabled: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            collection_trigger_level: None,
            pooling_enabled: true,
            external_mode: ExternalMode::HGlobal,
            explicit_release_requested: true,
            parallel_degree: NonZeroUsize::new(1),
            tasks_enabled: true,
            simd_enabled: true,
        }
    }
}

impl Configuration {
    /// Resolve from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CUSTOM_COLLECT) {
            config.collection_trigger_level = parse_collect_level(&raw);
        }
        if let Some(raw) = lookup(ENV_POOLING) {
            config.pooling_enabled = parse_bool(ENV_POOLING, &raw)?;
        }
        if let Some(raw) = lookup(ENV_UNMANAGED_MODE) {
            config.external_mode =
                ExternalMode::from_code(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_UNMANAGED_MODE,
                    value: raw.clone(),
                    expected: "0, 1 or 2",
                })?;
        }
        if let Some(raw) = lookup(ENV_USE_DISPOSE) {
            config.explicit_release_requested = parse_bool(ENV_USE_DISPOSE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PARALLEL_DEGREE) {
            config.parallel_degree = parse_degree(&raw)?;
        }
        if let Some(raw) = lookup(ENV_USE_TASKS) {
            config.tasks_enabled = parse_bool(ENV_USE_TASKS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_USE_SIMD) {
            config.simd_enabled = parse_bool(ENV_USE_SIMD, &raw)?;
        }

        Ok(config)
    }

    /// Allocation path selected by this configuration
    #[inline]
    pub fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::select(self)
    }

    /// Byte written by the bitmap workload
    pub fn fill_value(&self) -> u8 {
        match self.external_mode {
            ExternalMode::CoTask => SECONDARY_FILL_VALUE,
            ExternalMode::HGlobal | ExternalMode::Off => PRIMARY_FILL_VALUE,
        }
    }

    pub fn with_collection_trigger(mut self, level: Option<u8>) -> Self {
        self.collection_trigger_level = level.map(|l| l.min(MAX_GENERATION));
        self
    }

    pub fn with_pooling(mut self, enabled: bool) -> Self {
        self.pooling_enabled = enabled;
        self
    }

    pub fn with_external_mode(mut self, mode: ExternalMode) -> Self {
        self.external_mode = mode;
        self
    }

    pub fn with_explicit_release(mut self, requested: bool) -> Self {
        self.explicit_release_requested = requested;
        self
    }

    pub fn with_parallel_degree(mut self, degree: Option<NonZeroUsize>) -> Self {
        self.parallel_degree = degree;
        self
    }

    pub fn with_tasks(mut self, enabled: bool) -> Self {
        self.tasks_enabled = enabled;
        self
    }

    pub fn with_simd(mut self, enabled: bool) -> Self {
        self.simd_enabled = enabled;
        self
    }
}

/// Global configuration, resolved on first access
static CONFIGURATION: OnceLock<Configuration> = OnceLock::new();

/// Process-wide configuration
///
/// Invalid environment values are logged and replaced by the defaults.
pub fn configuration() -> &'static Configuration {
    CONFIGURATION.get_or_init(|| {
        let config = Configuration::from_env().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid configuration in environment, using defaults");
            Configuration::default()
        });
        info!(
            collection_trigger_level = ?config.collection_trigger_level,
            pooling = config.pooling_enabled,
            external_mode = ?config.external_mode,
            explicit_release = config.explicit_release_requested,
            parallel_degree = ?config.parallel_degree,
            tasks = config.tasks_enabled,
            simd = config.simd_enabled,
            "Configuration resolved"
        );
        config
    })
}

/// Unparseable or negative levels disable the trigger; levels above the
/// oldest generation are clamped to it.
fn parse_collect_level(raw: &str) -> Option<u8> {
    match raw.trim().parse::<i64>() {
        Ok(level) if level >= 0 => Some(level.min(MAX_GENERATION as i64) as u8),
        _ => None,
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            expected: "a boolean (1/0, true/false, yes/no, on/off)",
        }),
    }
}

fn parse_degree(raw: &str) -> Result<Option<NonZeroUsize>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse::<usize>()
        .map(NonZeroUsize::new)
        .map_err(|_| ConfigError::InvalidValue {
            key: ENV_PARALLEL_DEGREE,
            value: raw.to_string(),
            expected: "a non-negative integer or \"none\"",
        })
}
