//! Fetch engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::granularity::Granularities;

/// Candidate sub-range widths tried by default, coarsest first.
pub const DEFAULT_GRANULARITIES: [u64; 5] = [10_000, 1_000, 100, 10, 1];

/// Cap on concurrent `eth_getLogs` calls, to protect the endpoint.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Configuration shared by every job of one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Candidate widths, strictly descending. The last one should be `1`:
    /// a single block per request is the only width guaranteed to fit.
    pub granularities: Vec<u64>,
    /// Maximum concurrent transport calls, across all jobs.
    pub max_concurrent_requests: usize,
    /// Maximum jobs in flight in bulk mode.
    pub max_concurrent_jobs: usize,
    /// Width of the outer slices used for progress reporting.
    /// `None` = the largest granularity.
    pub slice_width: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            granularities: DEFAULT_GRANULARITIES.to_vec(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_concurrent_jobs: 8,
            slice_width: None,
        }
    }
}

impl FetchConfig {
    /// Check the invariants the batcher relies on.
    pub fn validate(&self) -> Result<(), FetchError> {
        self.ladder()?;
        if self.max_concurrent_requests == 0 || self.max_concurrent_jobs == 0 {
            return Err(FetchError::config("concurrency limits must be positive"));
        }
        if self.slice_width == Some(0) {
            return Err(FetchError::config("slice width must be positive"));
        }
        if self.granularities.last() != Some(&1) {
            tracing::warn!(
                finest = ?self.granularities.last(),
                "finest granularity is not 1; dense ranges may be unfetchable"
            );
        }
        Ok(())
    }

    /// The granularity ladder, checked.
    pub fn ladder(&self) -> Result<Granularities, FetchError> {
        Granularities::new(self.granularities.clone())
    }

    /// The outer slice width: explicit, or the coarsest granularity.
    pub fn effective_slice_width(&self) -> u64 {
        self.slice_width
            .or_else(|| self.granularities.first().copied())
            .unwrap_or(1)
    }
}
