//! Adaptive range batching.
//!
//! Endpoints cap `eth_getLogs` by block span or result count, and say so
//! with an opaque error. The batcher therefore discovers a working width
//! empirically, slice by slice:
//!
//! ```text
//! range ──► outer slices (coarsest width, progress unit)
//!              │
//!              ▼
//!          Trying(10_000) ──fail──► Trying(1_000) ──fail──► … ──► Trying(1)
//!              │ ok                    │ ok                          │ fail
//!              ▼                       ▼                             ▼
//!          Succeeded ◄─────────────────┘                      ExhaustedFailed
//! ```
//!
//! At each width the slice is split into sub-ranges which are fetched
//! concurrently and joined back by start position. The first failing
//! sub-range aborts the width; its partial results are discarded.

use futures::future::try_join_all;
use futures::stream::{self, Stream, StreamExt};

use crate::decoder::LogDecoder;
use crate::error::{FetchError, TransportError};
use crate::fetcher::RangeFetcher;
use crate::granularity::{Granularities, SliceState};
use crate::transport::LogTransport;
use crate::types::{BlockRange, LogRecord};

/// The records of one completed outer slice.
#[derive(Debug)]
pub struct SliceBatch {
    /// 0-based slice position.
    pub index: usize,
    /// Total number of slices in the range.
    pub total: usize,
    pub range: BlockRange,
    /// The width that succeeded for this slice.
    pub width: u64,
    /// Records in non-decreasing block order.
    pub records: Vec<LogRecord>,
}

/// Finds a working request width per slice and fetches the slice with it.
pub struct AdaptiveBatcher<T, D> {
    fetcher: RangeFetcher<T, D>,
    granularities: Granularities,
    slice_width: u64,
}

impl<T: LogTransport, D: LogDecoder> AdaptiveBatcher<T, D> {
    pub fn new(fetcher: RangeFetcher<T, D>, granularities: Granularities, slice_width: u64) -> Self {
        Self {
            fetcher,
            granularities,
            slice_width: slice_width.max(1),
        }
    }

    /// Stream the range slice by slice, in block order.
    ///
    /// Slices are fetched lazily: slice `n + 1` is not requested until the
    /// consumer has taken slice `n`. After an `Err` the consumer should stop
    /// polling; later slices are still independent and would be fetched.
    pub fn stream(
        &self,
        range: BlockRange,
    ) -> impl Stream<Item = Result<SliceBatch, FetchError>> + '_ {
        let slices = range.partition(self.slice_width);
        let total = slices.len();
        stream::iter(slices.into_iter().enumerate()).then(move |(index, slice)| async move {
            let (width, records) = self.fetch_slice(slice).await?;
            tracing::info!(
                address = %self.fetcher.address(),
                progress = %format_args!("{}/{}", index + 1, total),
                from = slice.from,
                to = slice.to,
                width,
                records = records.len(),
                "slice complete"
            );
            Ok(SliceBatch {
                index,
                total,
                range: slice,
                width,
                records,
            })
        })
    }

    /// Fetch the whole range into memory. Prefer [`stream`](Self::stream)
    /// for large ranges.
    pub async fn fetch_all(&self, range: BlockRange) -> Result<Vec<LogRecord>, FetchError> {
        let mut out = Vec::new();
        let mut batches = std::pin::pin!(self.stream(range));
        while let Some(batch) = batches.next().await {
            out.extend(batch?.records);
        }
        Ok(out)
    }

    /// Run one slice through the step-down state machine.
    async fn fetch_slice(&self, slice: BlockRange) -> Result<(u64, Vec<LogRecord>), FetchError> {
        let mut state = SliceState::start();
        loop {
            state = match state {
                SliceState::Trying { step } => {
                    let width = self.granularities.width(step);
                    let outcome = self.fetch_at_width(slice, width).await;
                    if let Err((range, error)) = &outcome {
                        tracing::debug!(
                            address = %self.fetcher.address(),
                            width,
                            failed = %range,
                            %error,
                            "width rejected, stepping down"
                        );
                    }
                    SliceState::advance(step, &self.granularities, outcome)
                }
                SliceState::Succeeded { width, records } => return Ok((width, records)),
                SliceState::ExhaustedFailed { range, error } => {
                    tracing::warn!(
                        address = %self.fetcher.address(),
                        from = range.from,
                        to = range.to,
                        %error,
                        "finest width failed"
                    );
                    return Err(FetchError::UnfetchableRange {
                        contract: self.fetcher.address().to_string(),
                        from: range.from,
                        to: range.to,
                        source: error,
                    });
                }
            };
        }
    }

    /// Fetch `slice` as sub-ranges of `width`. Fan out, join by position,
    /// short-circuit on the first failure.
    async fn fetch_at_width(
        &self,
        slice: BlockRange,
        width: u64,
    ) -> Result<Vec<LogRecord>, (BlockRange, TransportError)> {
        let parts = slice.partition(width);
        if let [only] = parts.as_slice() {
            return self.fetcher.fetch(*only).await.map_err(|e| (*only, e));
        }

        let fetches = parts.iter().map(|&part| {
            let fetcher = self.fetcher.clone();
            async move { fetcher.fetch(part).await.map_err(|e| (part, e)) }
        });
        let per_part = try_join_all(fetches).await?;

        let mut records: Vec<LogRecord> = per_part.into_iter().flatten().collect();
        // Stable: keeps the transport's order within a block.
        records.sort_by_key(LogRecord::block_number);
        Ok(records)
    }
}
