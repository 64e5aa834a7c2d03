use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::config::ComparisonConfig;
use crate::consts::ANI_TOLERANCE;
use crate::errors::{AniCacheError, Result};

///
/// The stored result for one pair key.
///
/// `config` is a denormalised copy of the config the value was computed
/// under, kept for provenance when a store is dumped or merged.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub ani: f64,
    pub aligned_fraction: f64,
    pub aligned_fragments: u64,
    pub total_fragments: u64,
    pub computed_at: DateTime<Utc>,
    pub config: ComparisonConfig,
}

impl CacheRecord {
    ///
    /// Record a fresh measurement, stamped with the current time.
    ///
    /// The stamp is truncated to milliseconds, the resolution stores keep.
    ///
    pub fn new(
        ani: f64,
        aligned_fraction: f64,
        aligned_fragments: u64,
        total_fragments: u64,
        config: ComparisonConfig,
    ) -> Self {
        CacheRecord {
            ani,
            aligned_fraction,
            aligned_fragments,
            total_fragments,
            computed_at: Utc::now().trunc_subsecs(3),
            config,
        }
    }

    /// Restamp the record. Sub-millisecond precision is dropped.
    pub fn with_computed_at(mut self, computed_at: DateTime<Utc>) -> Self {
        self.computed_at = computed_at.trunc_subsecs(3);
        self
    }

    ///
    /// Two records carry the same measurement when ANI and AF agree within
    /// `tolerance` and the fragment counts are equal. Timestamps are ignored.
    ///
    pub fn same_measurement(&self, other: &CacheRecord, tolerance: f64) -> bool {
        (self.ani - other.ani).abs() <= tolerance
            && (self.aligned_fraction - other.aligned_fraction).abs() <= tolerance
            && self.aligned_fragments == other.aligned_fragments
            && self.total_fragments == other.total_fragments
    }

    /// [CacheRecord::same_measurement] with the default tolerance.
    pub fn approx_eq(&self, other: &CacheRecord) -> bool {
        self.same_measurement(other, ANI_TOLERANCE)
    }

    /// Reject values that could never come out of a successful comparison.
    pub fn validate(&self) -> Result<()> {
        if !self.ani.is_finite() || !(0.0..=100.0).contains(&self.ani) {
            return Err(AniCacheError::InvalidRecord(format!(
                "ANI must lie in [0, 100], got {}",
                self.ani
            )));
        }
        if !self.aligned_fraction.is_finite() || !(0.0..=1.0).contains(&self.aligned_fraction) {
            return Err(AniCacheError::InvalidRecord(format!(
                "aligned fraction must lie in [0, 1], got {}",
                self.aligned_fraction
            )));
        }
        if self.computed_at != self.computed_at.trunc_subsecs(3) {
            return Err(AniCacheError::InvalidRecord(format!(
                "computed_at carries sub-millisecond precision: {}",
                self.computed_at.to_rfc3339()
            )));
        }
        if self.aligned_fragments > self.total_fragments {
            return Err(AniCacheError::InvalidRecord(format!(
                "aligned fragments ({}) exceed total fragments ({})",
                self.aligned_fragments, self.total_fragments
            )));
        }
        Ok(())
    }
}
