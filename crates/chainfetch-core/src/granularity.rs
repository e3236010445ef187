//! The granularity ladder and the per-slice step-down state machine.

use crate::error::{FetchError, TransportError};
use crate::types::{BlockRange, LogRecord};

/// Strictly descending candidate widths, coarsest first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granularities(Vec<u64>);

impl Granularities {
    pub fn new(widths: Vec<u64>) -> Result<Self, FetchError> {
        if widths.is_empty() {
            return Err(FetchError::config("at least one granularity is required"));
        }
        if widths.contains(&0) {
            return Err(FetchError::config("granularities must be positive"));
        }
        if widths.windows(2).any(|w| w[0] <= w[1]) {
            return Err(FetchError::config(format!(
                "granularities must be strictly descending, got {widths:?}"
            )));
        }
        Ok(Self(widths))
    }

    pub fn coarsest(&self) -> u64 {
        self.0[0]
    }

    pub fn finest(&self) -> u64 {
        self.0[self.0.len() - 1]
    }

    /// Width at position `step` (0 = coarsest).
    pub fn width(&self, step: usize) -> u64 {
        self.0[step]
    }

    /// The step after `step`, if there is a finer width left.
    pub fn finer(&self, step: usize) -> Option<usize> {
        (step + 1 < self.0.len()).then_some(step + 1)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

/// Where one outer slice stands in its search for a working width.
#[derive(Debug)]
pub enum SliceState {
    /// About to fetch the slice at `granularities.width(step)`.
    Trying { step: usize },
    /// Every sub-range at `width` succeeded.
    Succeeded { width: u64, records: Vec<LogRecord> },
    /// The finest width still failed for `range`.
    ExhaustedFailed { range: BlockRange, error: TransportError },
}

impl SliceState {
    pub fn start() -> Self {
        Self::Trying { step: 0 }
    }

    /// Transition out of `Trying { step }` given the aggregated outcome of
    /// all sub-ranges at that step.
    pub fn advance(
        step: usize,
        ladder: &Granularities,
        outcome: Result<Vec<LogRecord>, (BlockRange, TransportError)>,
    ) -> Self {
        match outcome {
            Ok(records) => Self::Succeeded {
                width: ladder.width(step),
                records,
            },
            Err((range, error)) => match ladder.finer(step) {
                Some(next) => Self::Trying { step: next },
                None => Self::ExhaustedFailed { range, error },
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Trying { .. })
    }
}
