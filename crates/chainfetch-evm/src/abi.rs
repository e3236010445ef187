//! Event signature table: topic identifier → event schema.

use std::collections::HashMap;

use alloy_core::dyn_abi::DynSolType;
use alloy_dyn_abi::Specifier;
use alloy_json_abi::{Event, JsonAbi};
use chainfetch_core::FetchError;

use crate::fingerprint;

/// One event parameter, resolved to its ABI type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    /// Declared name, or `arg{i}` when the ABI leaves it empty.
    pub name: String,
    pub ty: DynSolType,
    pub indexed: bool,
}

/// A non-anonymous event from the ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSchema {
    pub name: String,
    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub signature: String,
    /// keccak256 of `signature`, lowercase `0x` hex.
    pub topic: String,
    /// In ABI declaration order.
    pub params: Vec<ParamSchema>,
}

impl EventSchema {
    fn from_event(event: &Event) -> Result<Self, FetchError> {
        let signature = event.signature();
        let params = event
            .inputs
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let ty = param.resolve().map_err(|e| {
                    FetchError::config(format!("event {signature}: parameter {i}: {e}"))
                })?;
                let name = if param.name.is_empty() {
                    format!("arg{i}")
                } else {
                    param.name.clone()
                };
                Ok(ParamSchema {
                    name,
                    ty,
                    indexed: param.indexed,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(Self {
            name: event.name.clone(),
            topic: fingerprint::keccak256_signature(&signature),
            signature,
            params,
        })
    }

    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }
}

/// Every non-anonymous event of one contract ABI, keyed by topic identifier.
#[derive(Debug, Clone, Default)]
pub struct EventSignatureTable {
    events: HashMap<String, EventSchema>,
}

impl EventSignatureTable {
    /// Build the table from an ABI JSON array. Functions, errors and
    /// anonymous events are ignored.
    pub fn from_json(abi: &serde_json::Value) -> Result<Self, FetchError> {
        let abi: JsonAbi = serde_json::from_value(abi.clone())
            .map_err(|e| FetchError::config(format!("invalid ABI JSON: {e}")))?;
        Self::from_abi(&abi)
    }

    pub fn from_abi(abi: &JsonAbi) -> Result<Self, FetchError> {
        let mut events = HashMap::new();
        for event in abi.events() {
            if event.anonymous {
                tracing::debug!(event = %event.name, "skipping anonymous event");
                continue;
            }
            let schema = EventSchema::from_event(event)?;
            events.insert(schema.topic.clone(), schema);
        }
        Ok(Self { events })
    }

    /// Look up an event by `topics[0]` (lowercase `0x` hex).
    pub fn get(&self, topic: &str) -> Option<&EventSchema> {
        self.events.get(topic)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventSchema> {
        self.events.values()
    }
}
