//! The transport seam: where block and log data come from.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::RawLog;

/// Source of chain data for the engine.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent sub-range fetch of every job.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Current chain head block number.
    async fn block_number(&self) -> Result<u64, TransportError>;

    /// All logs emitted by `address` in `[from, to]`, in the node's order.
    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, TransportError>;
}

#[async_trait]
impl<T: LogTransport + ?Sized> LogTransport for std::sync::Arc<T> {
    async fn block_number(&self) -> Result<u64, TransportError> {
        (**self).block_number().await
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, TransportError> {
        (**self).get_logs(address, from, to).await
    }
}
