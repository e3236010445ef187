//! End-to-end bulk runs against an in-memory chain, writing real files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chainfetch_core::{
    FetchConfigBuilder, FetchError, FetchJob, FileSinkFactory, JobOrchestrator, JobSpec,
    LogDecoder, LogRecord, LogTransport, RawLog, TransportError,
};
use flate2::read::GzDecoder;
use serde_json::{json, Value};

const TOKEN_A: &str = "0x1111111111111111111111111111111111111111";
const TOKEN_B: &str = "0x2222222222222222222222222222222222222222";

/// One log every 100 blocks; ranges wider than 500 blocks are refused.
struct Chain {
    head: u64,
    head_calls: AtomicU32,
    /// A block no request for this contract ever gets past.
    broken: Option<(&'static str, u64)>,
}

impl Chain {
    fn new(head: u64) -> Self {
        Self { head, head_calls: AtomicU32::new(0), broken: None }
    }

    fn broken_at(mut self, address: &'static str, block: u64) -> Self {
        self.broken = Some((address, block));
        self
    }
}

#[async_trait]
impl LogTransport for Chain {
    async fn block_number(&self) -> Result<u64, TransportError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.head)
    }

    async fn get_logs(&self, address: &str, from: u64, to: u64) -> Result<Vec<RawLog>, TransportError> {
        if to - from + 1 > 500 {
            return Err(TransportError::Rpc {
                code: -32005,
                message: "query returned more than 10000 results".into(),
            });
        }
        if let Some((addr, block)) = self.broken {
            if addr == address && (from..=to).contains(&block) {
                return Err(TransportError::Http("HTTP 502: bad gateway".into()));
            }
        }
        Ok((from..=to)
            .filter(|b| b % 100 == 0)
            .map(|block| RawLog {
                block_number: block,
                tx_hash: format!("0x{block:064x}"),
                log_index: 0,
                address: address.to_string(),
                topics: vec![],
                data: vec![],
            })
            .collect())
    }
}

/// Accepts only ABIs whose entries are all objects.
struct StrictDecoder;

impl LogDecoder for StrictDecoder {
    fn from_abi(abi: &Value) -> Result<Self, FetchError> {
        match abi.as_array() {
            Some(entries) if entries.iter().all(Value::is_object) => Ok(Self),
            _ => Err(FetchError::config("malformed ABI")),
        }
    }

    fn decode(&self, raw: RawLog) -> LogRecord {
        LogRecord::Raw(raw)
    }
}

fn read_gz_lines(path: &std::path::Path) -> Vec<Value> {
    BufReader::new(GzDecoder::new(File::open(path).unwrap()))
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn failing_job_does_not_affect_the_others() {
    let out = tempfile::tempdir().unwrap();
    let chain = Arc::new(Chain::new(2_999));
    let config = FetchConfigBuilder::new()
        .granularities(vec![1_000, 100, 1])
        .max_concurrent_requests(4)
        .max_concurrent_jobs(2)
        .build()
        .unwrap();
    let orch = JobOrchestrator::<Chain, StrictDecoder>::new(Arc::clone(&chain), config).unwrap();

    let jobs = vec![
        FetchJob::new(TOKEN_A, json!([]), 0).unwrap().with_name("A"),
        FetchJob::new(TOKEN_B, json!([42]), 0).unwrap().with_name("B"),
    ];
    let report = orch.run_bulk_jobs(jobs, &FileSinkFactory::new(out.path())).await;

    assert_eq!(report.reports.len(), 2);
    assert_eq!(report.reports[0].name, "A");
    assert!(!report.all_succeeded());

    let a = report.get("A").unwrap().outcome.as_ref().unwrap();
    assert_eq!(a.records, 30);
    assert_eq!(a.slices, 3);
    assert!(report.get("B").unwrap().outcome.as_ref().unwrap_err().is_configuration());

    let lines = read_gz_lines(&out.path().join("A.jsonl.gz"));
    assert_eq!(lines.len(), 30);
    let blocks: Vec<u64> = lines.iter().map(|l| l["blockNumber"].as_u64().unwrap()).collect();
    assert!(blocks.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(lines[0]["address"], TOKEN_A);

    assert!(!out.path().join("B.jsonl.gz").exists());
    // B failed before reaching the head lookup.
    assert_eq!(chain.head_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn job_specs_resolve_against_abi_dir() {
    let abis = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(abis.path().join("a.json"), "[]").unwrap();

    let specs: Vec<JobSpec> = serde_json::from_value(json!([
        { "address": TOKEN_A, "name": "A", "start_block": 100, "end_block": 350 }
    ]))
    .unwrap();
    let jobs = specs
        .into_iter()
        .map(|s| s.resolve(Some(abis.path())))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let chain = Arc::new(Chain::new(10_000));
    let orch = JobOrchestrator::<Chain, StrictDecoder>::new(
        Arc::clone(&chain),
        FetchConfigBuilder::new().granularities(vec![1_000, 10]).build().unwrap(),
    )
    .unwrap();
    let report = orch.run_bulk_jobs(jobs, &FileSinkFactory::new(out.path())).await;

    assert!(report.all_succeeded());
    let blocks: Vec<u64> = read_gz_lines(&out.path().join("A.jsonl.gz"))
        .iter()
        .map(|l| l["blockNumber"].as_u64().unwrap())
        .collect();
    assert_eq!(blocks, vec![100, 200, 300]);
    assert_eq!(chain.head_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unfetchable_range_fails_only_its_own_job() {
    let out = tempfile::tempdir().unwrap();
    let chain = Arc::new(Chain::new(2_999).broken_at(TOKEN_B, 1_555));
    let config = FetchConfigBuilder::new()
        .granularities(vec![1_000, 100, 1])
        .max_concurrent_jobs(2)
        .build()
        .unwrap();
    let orch = JobOrchestrator::<Chain, StrictDecoder>::new(Arc::clone(&chain), config).unwrap();

    let jobs = vec![
        FetchJob::new(TOKEN_A, json!([]), 0).unwrap().with_name("A"),
        FetchJob::new(TOKEN_B, json!([]), 0).unwrap().with_name("C"),
    ];
    let report = orch.run_bulk_jobs(jobs, &FileSinkFactory::new(out.path())).await;

    assert_eq!(report.get("A").unwrap().outcome.as_ref().unwrap().records, 30);
    assert_eq!(read_gz_lines(&out.path().join("A.jsonl.gz")).len(), 30);

    let err = report.get("C").unwrap().outcome.as_ref().unwrap_err();
    assert!(err.is_unfetchable());
    assert!(err.to_string().contains("from block 1555 to 1555"), "{err}");

    // The first slice (blocks 0..=999) was flushed before the failure.
    let lines = read_gz_lines(&out.path().join("C.jsonl.gz"));
    let blocks: Vec<u64> = lines.iter().map(|l| l["blockNumber"].as_u64().unwrap()).collect();
    assert_eq!(blocks, (0..10).map(|i| i * 100).collect::<Vec<_>>());
    assert!(lines.iter().all(|l| l["address"] == TOKEN_B));
}
