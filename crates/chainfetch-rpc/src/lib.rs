//! chainfetch-rpc: JSON-RPC over HTTP as a ChainFetch `LogTransport`.

pub mod client;
pub mod logs;
pub mod request;
pub mod retry;

pub use client::{HttpClientConfig, HttpLogClient};
pub use retry::{RetryConfig, RetryPolicy};
