//! `eth_getLogs` request filters and response entries.

use chainfetch_core::{RawLog, TransportError};
use serde::Deserialize;
use serde_json::{json, Value};

/// Encode a block number as a JSON-RPC hex quantity.
pub fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// Parse a JSON-RPC hex quantity (`"0x1b4"`).
pub fn parse_quantity(s: &str) -> Result<u64, TransportError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| TransportError::Deserialization(format!("quantity {s:?} lacks 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| TransportError::Deserialization(format!("quantity {s:?}: {e}")))
}

/// The `eth_getLogs` filter object for one contract and block range.
pub fn log_filter(address: &str, from: u64, to: u64) -> Value {
    json!({
        "address": address,
        "fromBlock": quantity(from),
        "toBlock": quantity(to),
    })
}

/// One log entry as returned by the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl TryFrom<WireLog> for RawLog {
    type Error = TransportError;

    fn try_from(log: WireLog) -> Result<Self, Self::Error> {
        let missing = |field: &str| TransportError::Deserialization(format!("log without {field}"));

        let block_number = parse_quantity(&log.block_number.ok_or_else(|| missing("blockNumber"))?)?;
        let log_index = parse_quantity(&log.log_index.ok_or_else(|| missing("logIndex"))?)?;
        let tx_hash = log.transaction_hash.ok_or_else(|| missing("transactionHash"))?;
        let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
        let data = hex::decode(data)
            .map_err(|e| TransportError::Deserialization(format!("log data: {e}")))?;

        Ok(RawLog {
            block_number,
            tx_hash: tx_hash.to_lowercase(),
            log_index,
            address: log.address.to_lowercase(),
            topics: log.topics.into_iter().map(|t| t.to_lowercase()).collect(),
            data,
        })
    }
}

/// Convert an `eth_getLogs` result into raw logs, dropping entries the node
/// flags as removed by a reorg.
pub fn parse_logs(result: Value) -> Result<Vec<RawLog>, TransportError> {
    let logs: Vec<WireLog> = serde_json::from_value(result)
        .map_err(|e| TransportError::Deserialization(format!("eth_getLogs result: {e}")))?;
    logs.into_iter()
        .filter(|log| !log.removed)
        .map(RawLog::try_from)
        .collect()
}
