//! Shared types for the fetch pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

// ─── BlockRange ───────────────────────────────────────────────────────────────

/// An inclusive block interval `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Create a range. Callers guarantee `from <= to`.
    pub fn new(from: u64, to: u64) -> Self {
        debug_assert!(from <= to, "empty block range {from}..={to}");
        Self { from, to }
    }

    /// Number of blocks covered (always at least 1).
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Split into consecutive sub-ranges of at most `width` blocks,
    /// start-ascending. The last sub-range is clipped to `self.to`.
    pub fn partition(&self, width: u64) -> Vec<BlockRange> {
        let width = width.max(1);
        let mut out = Vec::with_capacity(self.len().div_ceil(width) as usize);
        let mut start = self.from;
        loop {
            let end = start.saturating_add(width - 1).min(self.to);
            out.push(BlockRange::new(start, end));
            if end == self.to {
                break;
            }
            start = end + 1;
        }
        out
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

// ─── RawLog ───────────────────────────────────────────────────────────────────

/// A log entry as returned by the transport. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub block_number: u64,
    /// Transaction hash (`0x…`, lowercase).
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u64,
    /// Emitting contract (`0x…`, lowercase).
    pub address: String,
    /// `topics[0]` is the event identifier for non-anonymous events.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed parameters.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl RawLog {
    /// The first topic, if any.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

// ─── DecodedLog / LogRecord ──────────────────────────────────────────────────

/// A raw log whose first topic matched a known event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    pub raw: RawLog,
    /// Event name from the ABI, e.g. `"Transfer"`.
    pub event: String,
    /// Arguments keyed by parameter name, in ABI declaration order.
    pub args: IndexMap<String, serde_json::Value>,
}

/// One fetched log, either decoded or passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Raw(RawLog),
    Decoded(DecodedLog),
}

impl LogRecord {
    pub fn raw(&self) -> &RawLog {
        match self {
            Self::Raw(raw) => raw,
            Self::Decoded(decoded) => &decoded.raw,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.raw().block_number
    }

    /// The decoded event name, if this record was decoded.
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Raw(_) => None,
            Self::Decoded(decoded) => Some(&decoded.event),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }
}

/// On-disk shape of a record: one JSON object per line.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord<'a> {
    block_number: u64,
    transaction_hash: &'a str,
    log_index: u64,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a IndexMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topics: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = self.raw();
        let mut record = PersistedRecord {
            block_number: raw.block_number,
            transaction_hash: &raw.tx_hash,
            log_index: raw.log_index,
            address: &raw.address,
            event: None,
            args: None,
            topics: None,
            data: None,
        };
        match self {
            Self::Decoded(decoded) => {
                record.event = Some(&decoded.event);
                record.args = Some(&decoded.args);
            }
            Self::Raw(raw) => {
                record.topics = Some(&raw.topics);
                record.data = Some(format!("0x{}", hex::encode(&raw.data)));
            }
        }
        record.serialize(serializer)
    }
}

/// Serde adapter for `Vec<u8>` as a `0x`-prefixed lowercase hex string.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
