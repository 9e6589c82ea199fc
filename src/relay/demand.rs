//! Outstanding consumer demand.

use crate::{Result, SluiceError};

/// Demand value treated as unbounded. Once reached, delivery no longer
/// decrements the counter.
pub const UNBOUNDED: u64 = u64::MAX;

/// Requested-but-undelivered item count, saturating at [`UNBOUNDED`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    outstanding: u64,
}

impl Demand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to the outstanding demand. `n` must be positive; overflow
    /// clamps to [`UNBOUNDED`].
    pub fn add(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(SluiceError::InvalidDemand { requested: n });
        }
        self.outstanding = self.outstanding.saturating_add(n);
        Ok(())
    }

    /// Take one unit of demand for a delivery.
    pub fn try_consume(&mut self) -> bool {
        match self.outstanding {
            0 => false,
            UNBOUNDED => true,
            _ => {
                self.outstanding -= 1;
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.outstanding = 0;
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    #[cfg(test)]
    pub fn is_unbounded(&self) -> bool {
        self.outstanding == UNBOUNDED
    }

    #[cfg(test)]
    pub fn has_demand(&self) -> bool {
        self.outstanding > 0
    }
}
