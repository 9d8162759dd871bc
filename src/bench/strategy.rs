/*!
 * Allocation Strategies
 *
 * The four buffer lifetime paths the harness compares. A strategy is picked
 * once from the configuration and stays fixed for the whole run.
 */

use crate::core::config::{Configuration, ExternalMode};
use crate::core::errors::BenchResult;
use crate::core::guard::Guard;
use crate::memory::buffer_size;
use crate::runtime::Runtime;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Buffer lifetime path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// External buffer released on every exit path of the iteration
    ExternalScoped,
    /// External buffer never released by its owner; the finalizer thread
    /// reclaims it some time after the iteration ends
    ExternalManualRelease,
    /// Region rented from the shared pool and returned at iteration end
    Pooled,
    /// Fresh managed buffer left for the collector
    PlainManaged,
}

impl AllocationStrategy {
    /// Pure, deterministic selection
    pub fn select(config: &Configuration) -> Self {
        if config.external_mode != ExternalMode::Off {
            if config.explicit_release_requested {
                AllocationStrategy::ExternalScoped
            } else {
                AllocationStrategy::ExternalManualRelease
            }
        } else if config.pooling_enabled {
            AllocationStrategy::Pooled
        } else {
            AllocationStrategy::PlainManaged
        }
    }

    /// Whether this path leaves memory behind after the iteration returns
    pub fn defers_reclamation(self) -> bool {
        matches!(
            self,
            AllocationStrategy::ExternalManualRelease | AllocationStrategy::PlainManaged
        )
    }

    /// Allocate a `width*height` buffer, fill it with `value` and end its
    /// lifetime the way this strategy does
    pub fn execute(
        self,
        runtime: &Runtime,
        width: usize,
        height: usize,
        value: u8,
    ) -> BenchResult<()> {
        match self {
            AllocationStrategy::ExternalScoped => {
                let mut buffer = runtime.external().scoped_buffer(width, height)?;
                buffer.fill(value)?;
            }
            AllocationStrategy::ExternalManualRelease => {
                let mut buffer = runtime.external().allocate_buffer(width, height)?;
                buffer.fill(value)?;
                trace!(
                    address = format_args!("0x{:x}", buffer.address()),
                    "Leaving buffer to the finalizer"
                );
            }
            AllocationStrategy::Pooled => {
                let mut region = runtime.pool().rent(buffer_size(width, height)?)?;
                region.fill(value);
                region.release()?;
            }
            AllocationStrategy::PlainManaged => {
                let mut buffer = runtime.heap().allocate(buffer_size(width, height)?)?;
                buffer.fill(value);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AllocationStrategy::ExternalScoped => write!(f, "external (scoped release)"),
            AllocationStrategy::ExternalManualRelease => write!(f, "external (manual release)"),
            AllocationStrategy::Pooled => write!(f, "pooled"),
            AllocationStrategy::PlainManaged => write!(f, "plain managed"),
        }
    }
}
