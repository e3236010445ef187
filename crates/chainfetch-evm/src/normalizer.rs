//! Converts alloy `DynSolValue`s into the JSON values written to sinks.
//!
//! Integers become decimal strings (they routinely exceed 2^53), addresses
//! and byte strings lowercase `0x` hex, arrays and tuples JSON arrays.

use alloy_core::dyn_abi::DynSolValue;
use serde_json::Value;

fn hex_value(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

/// Convert a decoded `DynSolValue` into JSON.
pub fn normalize(val: DynSolValue) -> Value {
    match val {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, _bits) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _bits) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => hex_value(&word[..size.min(32)]),
        DynSolValue::Bytes(b) => hex_value(&b),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Address(a) => hex_value(a.as_slice()),
        DynSolValue::Function(f) => hex_value(&f.to_vec()),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) | DynSolValue::Tuple(vals) => {
            Value::Array(vals.into_iter().map(normalize).collect())
        }
    }
}
