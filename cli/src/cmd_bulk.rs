//! `chainfetch bulk-fetch-events`: many contracts, one file each.
//!
//! A job that fails (bad ABI, unreachable range, unwritable output) is
//! reported and skipped; the command still exits successfully. Only an
//! unreadable job list fails the command.

use std::path::Path;

use anyhow::{Context, Result};
use chainfetch_core::{BulkReport, FileSinkFactory, JobOrchestrator, JobReport, JobSpec};
use chainfetch_evm::EventDecoder;
use chainfetch_rpc::HttpLogClient;

/// Read the JSON job list.
pub fn load_specs(path: &Path) -> Result<Vec<JobSpec>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read job config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("cannot parse job config {}", path.display()))
}

pub async fn run(
    orchestrator: &JobOrchestrator<HttpLogClient, EventDecoder>,
    config: &Path,
    abi_dir: Option<&Path>,
    output: &Path,
    compress: bool,
) -> Result<()> {
    let specs = load_specs(config)?;
    let sinks = if compress {
        FileSinkFactory::new(output)
    } else {
        FileSinkFactory::plain(output)
    };

    // Specs that do not resolve keep their slot so the summary follows the
    // config file order.
    let mut slots: Vec<Option<JobReport>> = Vec::with_capacity(specs.len());
    let mut jobs = Vec::new();
    for spec in specs {
        let name = spec.name.clone().unwrap_or_else(|| spec.address.clone());
        let address = spec.address.clone();
        match spec.resolve(abi_dir) {
            Ok(job) => {
                jobs.push(job);
                slots.push(None);
            }
            Err(e) => {
                tracing::error!(name = %name, address = %address, error = %e, "failed to process job");
                slots.push(Some(JobReport::failed(name, address, e)));
            }
        }
    }

    let mut ran = orchestrator.run_bulk_jobs(jobs, &sinks).await.reports.into_iter();
    let report = BulkReport {
        reports: slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| ran.next()))
            .collect(),
    };

    for job in &report.reports {
        println!("{job}");
    }
    println!(
        "{} succeeded, {} failed",
        report.succeeded().count(),
        report.failed().count()
    );
    Ok(())
}
