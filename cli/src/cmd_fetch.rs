//! `chainfetch fetch-events`: one contract into one file.

use std::path::Path;

use anyhow::{Context, Result};
use chainfetch_core::job::load_abi;
use chainfetch_core::{FetchJob, JobOrchestrator, JsonlSink, LogDecoder};
use chainfetch_evm::EventDecoder;
use chainfetch_rpc::HttpLogClient;

pub async fn run(
    orchestrator: &JobOrchestrator<HttpLogClient, EventDecoder>,
    address: &str,
    abi_path: &Path,
    start_block: u64,
    end_block: Option<u64>,
    output: &Path,
) -> Result<()> {
    let abi = load_abi(abi_path)?;
    let mut job = FetchJob::new(address, abi, start_block)?;
    if let Some(end) = end_block {
        job = job.with_end_block(end)?;
    }

    // Reject a bad ABI before the output file is created.
    EventDecoder::from_abi(job.abi())
        .with_context(|| format!("invalid ABI {}", abi_path.display()))?;

    let mut sink = JsonlSink::create(output)?;
    let stats = orchestrator
        .run_single_job(&job, &mut sink)
        .await
        .with_context(|| format!("failed to fetch events for {job}"))?;

    println!(
        "{}: {} records ({} decoded) from blocks {} in {} slices -> {}",
        job.display_name(),
        stats.records,
        stats.decoded,
        stats.range,
        stats.slices,
        output.display()
    );
    Ok(())
}
