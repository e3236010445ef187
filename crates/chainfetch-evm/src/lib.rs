//! chainfetch-evm: Solidity ABI event decoding for ChainFetch.
//!
//! Builds a topic-identifier table from a contract ABI and decodes raw
//! `eth_getLogs` entries into named, JSON-normalised arguments.

pub mod abi;
pub mod decoder;
pub mod fingerprint;
pub mod normalizer;

pub use abi::{EventSchema, EventSignatureTable, ParamSchema};
pub use decoder::EventDecoder;
