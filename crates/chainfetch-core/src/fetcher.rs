//! Single sub-range log fetcher.
//!
//! One [`RangeFetcher::fetch`] call is exactly one `eth_getLogs` request for
//! one contract, followed by decoding every returned entry. Concurrency is
//! bounded by a semaphore shared with every other fetcher of the same
//! orchestrator.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::decoder::LogDecoder;
use crate::error::TransportError;
use crate::transport::LogTransport;
use crate::types::{BlockRange, LogRecord};

/// Fetches and decodes the logs of one contract for one sub-range.
pub struct RangeFetcher<T, D> {
    transport: Arc<T>,
    decoder: Arc<D>,
    address: Arc<str>,
    permits: Arc<Semaphore>,
}

impl<T, D> Clone for RangeFetcher<T, D> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            decoder: Arc::clone(&self.decoder),
            address: Arc::clone(&self.address),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<T: LogTransport, D: LogDecoder> RangeFetcher<T, D> {
    pub fn new(
        transport: Arc<T>,
        decoder: Arc<D>,
        address: impl Into<Arc<str>>,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            transport,
            decoder,
            address: address.into(),
            permits,
        }
    }

    /// The contract address this fetcher filters on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fetch and decode all logs in `range`.
    ///
    /// Any failure (transport, timeout, "range too large") comes back as a
    /// `TransportError`; callers do not distinguish causes.
    pub async fn fetch(&self, range: BlockRange) -> Result<Vec<LogRecord>, TransportError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::Other("request pool closed".into()))?;

        let logs = self
            .transport
            .get_logs(&self.address, range.from, range.to)
            .await?;

        tracing::trace!(
            address = %self.address,
            from = range.from,
            to = range.to,
            logs = logs.len(),
            "fetched sub-range"
        );

        Ok(logs.into_iter().map(|raw| self.decoder.decode(raw)).collect())
    }
}
