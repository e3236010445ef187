//! The decoder seam: turning raw logs into named events.

use crate::error::FetchError;
use crate::types::{LogRecord, RawLog};

/// Per-contract log decoder, built once from the contract's ABI.
///
/// `decode` is infallible: an entry the decoder does not recognise is
/// returned as [`LogRecord::Raw`].
pub trait LogDecoder: Send + Sync + Sized {
    /// Build a decoder from an ABI JSON array.
    fn from_abi(abi: &serde_json::Value) -> Result<Self, FetchError>;

    fn decode(&self, raw: RawLog) -> LogRecord;
}
