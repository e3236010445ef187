//! Job orchestration: single-job streaming and isolated bulk runs.
//!
//! # Per job
//! 1. Build the decoder from the job's ABI
//! 2. Snapshot `end_block` from the chain head if the job left it open
//! 3. Open the sink (bulk mode asks the factory only now, so a job that
//!    fails steps 1–2 leaves no output behind)
//! 4. Stream slices from the batcher, writing and flushing each one
//!
//! # Bulk
//! Jobs run concurrently, bounded by `max_concurrent_jobs`. Every job is
//! attempted; a failing job is logged and reported, never propagated.
//! Display names name the output, so a job repeating an earlier job's name
//! fails with a configuration error instead of overwriting its file.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::batcher::AdaptiveBatcher;
use crate::config::FetchConfig;
use crate::decoder::LogDecoder;
use crate::error::FetchError;
use crate::fetcher::RangeFetcher;
use crate::granularity::Granularities;
use crate::job::FetchJob;
use crate::sink::{EventSink, SinkFactory};
use crate::transport::LogTransport;
use crate::types::BlockRange;

/// What a completed job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    /// The resolved block range.
    pub range: BlockRange,
    pub slices: usize,
    pub records: u64,
    /// How many of `records` matched an ABI event.
    pub decoded: u64,
}

/// Outcome of one job in a bulk run.
#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub address: String,
    pub outcome: Result<JobStats, FetchError>,
}

impl JobReport {
    /// A job that never reached the orchestrator (e.g. its job entry did not
    /// resolve).
    pub fn failed(name: impl Into<String>, address: impl Into<String>, error: FetchError) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl std::fmt::Display for JobReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Ok(stats) => write!(
                f,
                "ok     {} ({}): {} records ({} decoded) from blocks {}",
                self.name, self.address, stats.records, stats.decoded, stats.range
            ),
            Err(e) => write!(f, "FAILED {} ({}): {e}", self.name, self.address),
        }
    }
}

/// Per-job outcomes of a bulk run, in job order.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub reports: Vec<JobReport>,
}

impl BulkReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &JobReport> {
        self.reports.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.reports.iter().all(JobReport::is_success)
    }

    /// Find a report by job display name.
    pub fn get(&self, name: &str) -> Option<&JobReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

/// Runs fetch jobs against one transport.
///
/// The transport and the request semaphore are shared by every job; nothing
/// else is.
pub struct JobOrchestrator<T, D> {
    transport: Arc<T>,
    config: FetchConfig,
    ladder: Granularities,
    permits: Arc<Semaphore>,
    _decoder: PhantomData<fn() -> D>,
}

impl<T: LogTransport, D: LogDecoder> JobOrchestrator<T, D> {
    pub fn new(transport: Arc<T>, config: FetchConfig) -> Result<Self, FetchError> {
        config.validate()?;
        let ladder = config.ladder()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Ok(Self {
            transport,
            config,
            ladder,
            permits,
            _decoder: PhantomData,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Run one job to completion, streaming records into `sink`.
    ///
    /// On failure, everything written before the failing slice stays in the
    /// sink; the sink is finished either way.
    pub async fn run_single_job(
        &self,
        job: &FetchJob,
        sink: &mut dyn EventSink,
    ) -> Result<JobStats, FetchError> {
        let span = tracing::info_span!("job", name = %job.display_name(), address = %job.address());
        async {
            let (batcher, range) = self.prepare(job).await?;
            self.drive(&batcher, range, sink).await
        }
        .instrument(span)
        .await
    }

    /// Run every job, each into its own sink from `sinks`. Never fails as a
    /// whole; see the per-job outcomes in the returned report.
    pub async fn run_bulk_jobs(&self, jobs: Vec<FetchJob>, sinks: &dyn SinkFactory) -> BulkReport {
        tracing::info!(
            jobs = jobs.len(),
            concurrency = self.config.max_concurrent_jobs,
            "starting bulk fetch"
        );

        let mut names = HashSet::new();
        let checked: Vec<(usize, FetchJob, bool)> = jobs
            .into_iter()
            .enumerate()
            .map(|(index, job)| {
                let unique = names.insert(job.display_name().to_string());
                (index, job, unique)
            })
            .collect();

        let mut indexed: Vec<(usize, JobReport)> = stream::iter(checked)
            .map(|(index, job, unique)| async move {
                let span =
                    tracing::info_span!("job", name = %job.display_name(), address = %job.address());
                let outcome = if unique {
                    self.run_into_factory(&job, sinks).instrument(span).await
                } else {
                    Err(FetchError::config(format!(
                        "duplicate job name {:?}; every job needs its own output",
                        job.display_name()
                    )))
                };
                match &outcome {
                    Ok(stats) => tracing::info!(
                        name = %job.display_name(),
                        address = %job.address(),
                        records = stats.records,
                        "completed job"
                    ),
                    Err(e) => tracing::error!(
                        name = %job.display_name(),
                        address = %job.address(),
                        error = %e,
                        "failed to process job"
                    ),
                }
                let report = JobReport {
                    name: job.display_name().to_string(),
                    address: job.address().to_string(),
                    outcome,
                };
                (index, report)
            })
            .buffer_unordered(self.config.max_concurrent_jobs)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let report = BulkReport {
            reports: indexed.into_iter().map(|(_, r)| r).collect(),
        };
        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "bulk fetch finished"
        );
        report
    }

    async fn run_into_factory(
        &self,
        job: &FetchJob,
        sinks: &dyn SinkFactory,
    ) -> Result<JobStats, FetchError> {
        let (batcher, range) = self.prepare(job).await?;
        let mut sink = sinks.create(job)?;
        self.drive(&batcher, range, sink.as_mut()).await
    }

    /// Build the decoder and pin down the block range.
    async fn prepare(
        &self,
        job: &FetchJob,
    ) -> Result<(AdaptiveBatcher<T, D>, BlockRange), FetchError> {
        let decoder = D::from_abi(job.abi())?;

        let end = match job.end_block() {
            Some(end) => end,
            None => self.transport.block_number().await?,
        };
        if end < job.start_block() {
            return Err(FetchError::config(format!(
                "start block {} is past end block {end}",
                job.start_block()
            )));
        }
        let range = BlockRange::new(job.start_block(), end);

        let fetcher = RangeFetcher::new(
            Arc::clone(&self.transport),
            Arc::new(decoder),
            job.address(),
            Arc::clone(&self.permits),
        );
        let batcher = AdaptiveBatcher::new(
            fetcher,
            self.ladder.clone(),
            self.config.effective_slice_width(),
        );
        tracing::info!(from = range.from, to = range.to, "starting job");
        Ok((batcher, range))
    }

    async fn drive(
        &self,
        batcher: &AdaptiveBatcher<T, D>,
        range: BlockRange,
        sink: &mut dyn EventSink,
    ) -> Result<JobStats, FetchError> {
        let mut stats = JobStats {
            range,
            slices: 0,
            records: 0,
            decoded: 0,
        };

        let result = async {
            let mut batches = std::pin::pin!(batcher.stream(range));
            while let Some(batch) = batches.next().await {
                let batch = batch?;
                for record in &batch.records {
                    sink.write(record)?;
                    stats.records += 1;
                    stats.decoded += u64::from(record.is_decoded());
                }
                sink.flush()?;
                stats.slices += 1;
            }
            Ok::<_, FetchError>(())
        }
        .await;

        match result {
            Ok(()) => {
                sink.finish()?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(finish_err) = sink.finish() {
                    tracing::warn!(error = %finish_err, "could not finish sink after failure");
                }
                Err(e)
            }
        }
    }
}
