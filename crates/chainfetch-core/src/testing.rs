//! Scripted transport and decoder used by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::decoder::LogDecoder;
use crate::error::{FetchError, TransportError};
use crate::transport::LogTransport;
use crate::types::{BlockRange, LogRecord, RawLog};

/// In-memory chain: every `every`-th block carries two logs.
pub struct ScriptedTransport {
    pub head: u64,
    pub every: u64,
    /// Reject any request covering more than this many blocks.
    pub max_width: Option<u64>,
    /// Any request touching one of these blocks fails.
    pub poisoned: HashSet<u64>,
    /// Delay later sub-ranges less, so they complete first.
    pub reverse_completion: bool,
    pub calls: Mutex<Vec<BlockRange>>,
    pub head_calls: Mutex<u32>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            every: 1,
            max_width: None,
            poisoned: HashSet::new(),
            reverse_completion: false,
            calls: Mutex::new(Vec::new()),
            head_calls: Mutex::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn max_width(mut self, width: u64) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn every(mut self, every: u64) -> Self {
        self.every = every;
        self
    }

    pub fn poison(mut self, block: u64) -> Self {
        self.poisoned.insert(block);
        self
    }

    pub fn reverse_completion(mut self) -> Self {
        self.reverse_completion = true;
        self
    }

    pub fn calls(&self) -> Vec<BlockRange> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of `get_logs` calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

pub fn log_at(address: &str, block: u64, index: u64) -> RawLog {
    RawLog {
        block_number: block,
        tx_hash: format!("0x{block:064x}"),
        log_index: index,
        address: address.to_string(),
        topics: vec![format!("0x{:064x}", 0xfeed_u64)],
        data: vec![],
    }
}

#[async_trait]
impl LogTransport for ScriptedTransport {
    async fn block_number(&self) -> Result<u64, TransportError> {
        *self.head_calls.lock().unwrap() += 1;
        Ok(self.head)
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, TransportError> {
        self.calls.lock().unwrap().push(BlockRange::new(from, to));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.reverse_completion {
            let delay = 20u64.saturating_sub(from % 20);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let width = to - from + 1;
        if matches!(self.max_width, Some(max) if width > max) {
            return Err(TransportError::Rpc {
                code: -32005,
                message: format!("block range too large: {width}"),
            });
        }
        if (from..=to).any(|b| self.poisoned.contains(&b)) {
            return Err(TransportError::Http("HTTP 502: bad gateway".into()));
        }

        let mut out = Vec::new();
        for block in from..=to {
            if block % self.every == 0 {
                out.push(log_at(address, block, 0));
                out.push(log_at(address, block, 1));
            }
        }
        Ok(out)
    }
}

/// Decoder that never recognises anything.
pub struct PassthroughDecoder;

impl LogDecoder for PassthroughDecoder {
    fn from_abi(abi: &serde_json::Value) -> Result<Self, FetchError> {
        if abi.is_array() {
            Ok(Self)
        } else {
            Err(FetchError::config("ABI must be a JSON array"))
        }
    }

    fn decode(&self, raw: RawLog) -> LogRecord {
        LogRecord::Raw(raw)
    }
}
