//! Error types for the chainfetch pipeline.

use thiserror::Error;

/// Any failure of a transport call.
///
/// The batcher treats every variant the same way: a failed sub-range means
/// "try a finer width". The variants only exist so logs say what happened.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error object returned by the node
    /// (e.g. "query returned more than 10000 results").
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the failure is transient and worth retrying at the
    /// transport level. RPC error objects are not: the node answered.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Errors that can end a fetch job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unable to fetch events for {contract} from block {from} to {to}: {source}")]
    UnfetchableRange {
        contract: String,
        from: u64,
        to: u64,
        #[source]
        source: TransportError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl FetchError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Returns `true` if the job could not even start (bad ABI, bad range,
    /// bad output path).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_unfetchable(&self) -> bool {
        matches!(self, Self::UnfetchableRange { .. })
    }
}
