//! chainfetch-core: adaptive, slice-by-slice backfill of contract event logs.
//!
//! # Architecture
//!
//! ```text
//! JobOrchestrator ──► per job: decoder + end_block snapshot + sink
//!        │
//!        ▼
//! AdaptiveBatcher     (outer slices, granularity step-down)
//!        │
//!        ▼
//! RangeFetcher × N    (one eth_getLogs per sub-range, shared request semaphore)
//!        │
//!        ▼
//! LogTransport        (JSON-RPC over HTTP, or anything else)
//! ```
//!
//! Decoding is pluggable through [`LogDecoder`]; `chainfetch-evm` provides
//! the Solidity ABI implementation.

pub mod batcher;
pub mod builder;
pub mod config;
pub mod decoder;
pub mod error;
pub mod fetcher;
pub mod granularity;
pub mod job;
pub mod orchestrator;
pub mod sink;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use batcher::{AdaptiveBatcher, SliceBatch};
pub use builder::FetchConfigBuilder;
pub use config::{FetchConfig, DEFAULT_GRANULARITIES, DEFAULT_MAX_CONCURRENT_REQUESTS};
pub use decoder::LogDecoder;
pub use error::{FetchError, TransportError};
pub use fetcher::RangeFetcher;
pub use granularity::{Granularities, SliceState};
pub use job::{AbiRef, FetchJob, JobSpec};
pub use orchestrator::{BulkReport, JobOrchestrator, JobReport, JobStats};
pub use sink::{EventSink, FileSinkFactory, JsonlSink, MemorySink, SinkFactory};
pub use transport::LogTransport;
pub use types::{BlockRange, DecodedLog, LogRecord, RawLog};
