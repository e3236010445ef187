//! Fluent builder API for [`FetchConfig`].
//!
//! # Example
//!
//! ```rust
//! use chainfetch_core::FetchConfigBuilder;
//!
//! let config = FetchConfigBuilder::new()
//!     .granularities(vec![5_000, 500, 50, 1])
//!     .max_concurrent_requests(10)
//!     .max_concurrent_jobs(4)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.effective_slice_width(), 5_000);
//! ```

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Fluent builder for `FetchConfig`.
#[derive(Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FetchConfig::default(),
        }
    }

    /// Set the candidate widths, coarsest first.
    pub fn granularities(mut self, widths: Vec<u64>) -> Self {
        self.config.granularities = widths;
        self
    }

    /// Set the cap on concurrent transport calls.
    pub fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.config.max_concurrent_requests = n;
        self
    }

    /// Set how many jobs run at once in bulk mode.
    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = n;
        self
    }

    /// Override the outer slice width used for progress reporting.
    pub fn slice_width(mut self, width: u64) -> Self {
        self.config.slice_width = Some(width);
        self
    }

    /// Validate and return the `FetchConfig`.
    pub fn build(self) -> Result<FetchConfig, FetchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
