//! Fetch job descriptions.
//!
//! A [`FetchJob`] is fully resolved: its ABI is loaded and its address
//! validated. The only thing left open is `end_block`, which the
//! orchestrator snapshots from the chain head once, when the job starts.
//!
//! Bulk runs describe jobs as [`JobSpec`]s in a JSON file:
//!
//! ```json
//! [
//!   { "address": "0xA0b8…eB48", "name": "USDC", "start_block": 6082465 },
//!   { "address": "0x6B17…1d0F", "abi": "dai.json", "start_block": 8928158, "end_block": 9000000 }
//! ]
//! ```
//!
//! When `abi` is omitted the file `<lowercase name or address>.json` is
//! used, relative to the ABI directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Where a job's ABI comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbiRef {
    /// ABI JSON array given inline.
    Inline(Vec<serde_json::Value>),
    /// Path to an ABI JSON file.
    Path(PathBuf),
}

/// Serialized form of a job, as found in bulk config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<AbiRef>,
    pub start_block: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JobSpec {
    /// Default ABI file name: the label (or address) lower-cased, `.json`.
    pub fn default_abi_file(&self) -> String {
        let key = self.name.as_deref().unwrap_or(&self.address);
        format!("{}.json", key.to_lowercase())
    }

    /// Load the ABI and validate the job. Relative ABI paths are resolved
    /// against `abi_dir` when one is given.
    pub fn resolve(self, abi_dir: Option<&Path>) -> Result<FetchJob, FetchError> {
        let abi = match &self.abi {
            Some(AbiRef::Inline(entries)) => serde_json::Value::Array(entries.clone()),
            Some(AbiRef::Path(path)) => load_abi(&join_abi_path(abi_dir, path))?,
            None => load_abi(&join_abi_path(abi_dir, Path::new(&self.default_abi_file())))?,
        };
        let mut job = FetchJob::new(self.address, abi, self.start_block)?;
        if let Some(end) = self.end_block {
            job = job.with_end_block(end)?;
        }
        if let Some(name) = self.name {
            job = job.with_name(name);
        }
        Ok(job)
    }
}

fn join_abi_path(abi_dir: Option<&Path>, path: &Path) -> PathBuf {
    match abi_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Read an ABI JSON file.
pub fn load_abi(path: &Path) -> Result<serde_json::Value, FetchError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| FetchError::config(format!("cannot read ABI {}: {e}", path.display())))?;
    let abi: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| FetchError::config(format!("cannot parse ABI {}: {e}", path.display())))?;
    if !abi.is_array() {
        return Err(FetchError::config(format!(
            "ABI {} is not a JSON array",
            path.display()
        )));
    }
    Ok(abi)
}

/// One contract to fetch events for.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    address: String,
    abi: serde_json::Value,
    start_block: u64,
    end_block: Option<u64>,
    name: Option<String>,
}

impl FetchJob {
    /// Create a job. The address must be `0x` followed by 40 hex digits;
    /// it is stored lower-cased.
    pub fn new(
        address: impl Into<String>,
        abi: serde_json::Value,
        start_block: u64,
    ) -> Result<Self, FetchError> {
        let address = normalize_address(&address.into())?;
        if !abi.is_array() {
            return Err(FetchError::config(format!("ABI for {address} is not a JSON array")));
        }
        Ok(Self {
            address,
            abi,
            start_block,
            end_block: None,
            name: None,
        })
    }

    /// Fix the last block (inclusive). Without it the chain head at job
    /// start is used.
    pub fn with_end_block(mut self, end_block: u64) -> Result<Self, FetchError> {
        if end_block < self.start_block {
            return Err(FetchError::config(format!(
                "end block {end_block} is before start block {} for {}",
                self.start_block, self.address
            )));
        }
        self.end_block = Some(end_block);
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn abi(&self) -> &serde_json::Value {
        &self.abi
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub fn end_block(&self) -> Option<u64> {
        self.end_block
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The label if set, otherwise the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl std::fmt::Display for FetchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end_block {
            Some(end) => write!(f, "{} [{}..={}]", self.display_name(), self.start_block, end),
            None => write!(f, "{} [{}..=head]", self.display_name(), self.start_block),
        }
    }
}

fn normalize_address(address: &str) -> Result<String, FetchError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| FetchError::config(format!("address {address} must start with 0x")))?;
    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(FetchError::config(format!("invalid address {address}")));
    }
    Ok(format!("0x{}", hex_part.to_lowercase()))
}
