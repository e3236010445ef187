//! `EventDecoder`: the `LogDecoder` implementation for Solidity events.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use chainfetch_core::{DecodedLog, FetchError, LogDecoder, LogRecord, RawLog};
use indexmap::IndexMap;
use serde_json::Value;

use crate::abi::{EventSchema, EventSignatureTable};
use crate::{fingerprint, normalizer};

/// Decodes the logs of one contract against its ABI.
///
/// Logs whose `topics[0]` matches no ABI event, and matched logs whose
/// payload does not decode, come back as [`LogRecord::Raw`].
#[derive(Debug, Clone)]
pub struct EventDecoder {
    table: EventSignatureTable,
}

impl EventDecoder {
    pub fn new(table: EventSignatureTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &EventSignatureTable {
        &self.table
    }

    /// Decode the arguments of `raw` as an instance of `schema`, in ABI
    /// declaration order.
    pub fn decode_args(
        schema: &EventSchema,
        raw: &RawLog,
    ) -> Result<IndexMap<String, Value>, String> {
        let topics = raw.topics.get(1..).unwrap_or_default();
        if topics.len() != schema.indexed_count() {
            return Err(format!(
                "expected {} indexed topics, got {}",
                schema.indexed_count(),
                topics.len()
            ));
        }

        let data_types: Vec<DynSolType> = schema
            .params
            .iter()
            .filter(|p| !p.indexed)
            .map(|p| p.ty.clone())
            .collect();
        let data_values = if data_types.is_empty() {
            Vec::new()
        } else {
            match DynSolType::Tuple(data_types).abi_decode_sequence(&raw.data) {
                Ok(DynSolValue::Tuple(values)) => values,
                Ok(other) => vec![other],
                Err(e) => return Err(format!("data: {e}")),
            }
        };

        let mut topics = topics.iter();
        let mut data = data_values.into_iter();
        let mut args = IndexMap::with_capacity(schema.params.len());
        for param in &schema.params {
            let value = if param.indexed {
                let topic = topics.next().ok_or("ran out of topics")?;
                decode_topic(topic, &param.ty).map_err(|e| format!("{}: {e}", param.name))?
            } else {
                let value = data.next().ok_or("ran out of data values")?;
                normalizer::normalize(value)
            };
            args.insert(param.name.clone(), value);
        }
        Ok(args)
    }
}

/// Decode one indexed topic.
///
/// Value types are stored in the topic padded to 32 bytes. Reference types
/// (string, bytes, arrays, tuples) are stored as the keccak256 of their
/// encoding; the value itself is unrecoverable, so the hash is returned.
fn decode_topic(topic: &str, ty: &DynSolType) -> Result<Value, String> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    let bytes = hex::decode(hex).map_err(|e| format!("invalid topic hex: {e}"))?;
    if bytes.len() != 32 {
        return Err(format!("topic is {} bytes, expected 32", bytes.len()));
    }

    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        _ => ty
            .abi_decode(&bytes)
            .map(normalizer::normalize)
            .map_err(|e| e.to_string()),
    }
}

impl LogDecoder for EventDecoder {
    fn from_abi(abi: &Value) -> Result<Self, FetchError> {
        EventSignatureTable::from_json(abi).map(Self::new)
    }

    fn decode(&self, raw: RawLog) -> LogRecord {
        let Some(schema) = fingerprint::from_topics(&raw.topics).and_then(|t| self.table.get(&t))
        else {
            return LogRecord::Raw(raw);
        };

        match Self::decode_args(schema, &raw) {
            Ok(args) => LogRecord::Decoded(DecodedLog {
                event: schema.name.clone(),
                args,
                raw,
            }),
            Err(reason) => {
                tracing::debug!(
                    event = %schema.signature,
                    block = raw.block_number,
                    tx = %raw.tx_hash,
                    log_index = raw.log_index,
                    %reason,
                    "matched log did not decode, keeping raw"
                );
                LogRecord::Raw(raw)
            }
        }
    }
}
