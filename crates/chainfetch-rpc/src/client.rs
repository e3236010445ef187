//! HTTP JSON-RPC log transport backed by `reqwest`.
//!
//! Transient failures (connection errors, timeouts, HTTP 429 and 5xx) are
//! retried with exponential backoff. JSON-RPC error objects are returned
//! immediately: a node refusing a range is an answer, and the batcher needs
//! it quickly to step down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chainfetch_core::{LogTransport, RawLog, TransportError};
use serde_json::Value;

use crate::logs::{log_filter, parse_logs, parse_quantity};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};

/// Configuration for `HttpLogClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// `LogTransport` over a JSON-RPC HTTP endpoint.
pub struct HttpLogClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpLogClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {body}", status.as_u16());
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                TransportError::Http(message)
            } else {
                TransportError::Other(message)
            });
        }

        resp.json::<JsonRpcResponse>().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                TransportError::Deserialization(e.to_string())
            }
        })
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// Issue one JSON-RPC call, retrying transient failures.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let mut attempt = 0u32;
        let resp = loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(resp) => break resp,
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            method,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::debug!(method, attempt, error = %e, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        };

        resp.into_result().map_err(|err| TransportError::Rpc {
            code: err.code,
            message: err.message,
        })
    }
}

#[async_trait]
impl LogTransport for HttpLogClient {
    async fn block_number(&self) -> Result<u64, TransportError> {
        let result = self.call("eth_blockNumber", vec![]).await?;
        let hex = result.as_str().ok_or_else(|| {
            TransportError::Deserialization(format!("eth_blockNumber returned {result}"))
        })?;
        parse_quantity(hex)
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, TransportError> {
        let result = self
            .call("eth_getLogs", vec![log_filter(address, from, to)])
            .await?;
        parse_logs(result)
    }
}
