//! ChainFetch CLI: backfill contract event logs from a JSON-RPC node.
//!
//! # Commands
//! ```text
//! chainfetch fetch-events      <ADDRESS> --abi <path.json> -s <START> [-e <END>] -o <out.jsonl.gz>
//! chainfetch bulk-fetch-events -c <jobs.json> [--abis <dir>] -o <out_dir>
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chainfetch_core::{FetchConfig, FetchConfigBuilder, JobOrchestrator, DEFAULT_GRANULARITIES};
use chainfetch_evm::EventDecoder;
use chainfetch_rpc::{HttpClientConfig, HttpLogClient, RetryConfig};
use clap::{Args, Parser, Subcommand};

mod cmd_bulk;
mod cmd_fetch;
mod logging;

#[derive(Parser)]
#[command(
    name = "chainfetch",
    about = "Backfill contract event logs over JSON-RPC, adapting request size to what the node accepts",
    version
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON-RPC endpoint URL
    #[arg(long, env = "WEB3_PROVIDER_URI", global = true)]
    web3_uri: Option<String>,

    /// Default log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Per-crate log level, e.g. chainfetch-rpc=debug (repeatable)
    #[arg(long = "log-component", global = true)]
    log_components: Vec<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    log_json: bool,

    /// Candidate request widths in blocks, coarsest first
    #[arg(long, value_delimiter = ',', global = true)]
    granularities: Option<Vec<u64>>,

    /// Outer slice width in blocks (default: the largest granularity)
    #[arg(long, global = true)]
    slice_width: Option<u64>,

    /// Maximum concurrent eth_getLogs calls
    #[arg(long, default_value_t = chainfetch_core::DEFAULT_MAX_CONCURRENT_REQUESTS, global = true)]
    max_concurrent_requests: usize,

    /// Maximum jobs in flight in bulk mode
    #[arg(long, default_value_t = 8, global = true)]
    max_concurrent_jobs: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    request_timeout: u64,

    /// Retries for transient HTTP failures
    #[arg(long, default_value_t = 3, global = true)]
    retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all events of one contract into a JSON-lines file
    #[command(name = "fetch-events")]
    FetchEvents {
        /// Contract address
        address: String,
        /// Path to the contract ABI JSON
        #[arg(long)]
        abi: PathBuf,
        /// First block (inclusive)
        #[arg(short = 's', long)]
        start_block: u64,
        /// Last block (inclusive; default: chain head at start)
        #[arg(short = 'e', long)]
        end_block: Option<u64>,
        /// Output file; gzip-compressed when it ends in .gz
        #[arg(short = 'o', long)]
        output: PathBuf,
    },

    /// Fetch events for every job in a JSON config file
    #[command(name = "bulk-fetch-events")]
    BulkFetchEvents {
        /// JSON array of jobs: {address, start_block, end_block?, name?, abi?}
        #[arg(short = 'c', long)]
        config: PathBuf,
        /// Directory relative ABI paths are resolved against
        #[arg(long)]
        abis: Option<PathBuf>,
        /// Output directory; one <name>.jsonl.gz per job
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Write uncompressed .jsonl files
        #[arg(long)]
        no_compress: bool,
    },
}

impl GlobalArgs {
    fn fetch_config(&self) -> Result<FetchConfig> {
        let mut builder = FetchConfigBuilder::new()
            .granularities(
                self.granularities
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GRANULARITIES.to_vec()),
            )
            .max_concurrent_requests(self.max_concurrent_requests)
            .max_concurrent_jobs(self.max_concurrent_jobs);
        if let Some(width) = self.slice_width {
            builder = builder.slice_width(width);
        }
        builder.build().context("invalid fetch configuration")
    }

    fn orchestrator(&self) -> Result<JobOrchestrator<HttpLogClient, EventDecoder>> {
        let url = self
            .web3_uri
            .as_deref()
            .context("no JSON-RPC endpoint: pass --web3-uri or set WEB3_PROVIDER_URI")?;
        let client = HttpLogClient::new(
            url,
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries: self.retries,
                    ..RetryConfig::default()
                },
                request_timeout: Duration::from_secs(self.request_timeout),
            },
        )
        .context("failed to create HTTP client")?;
        Ok(JobOrchestrator::new(Arc::new(client), self.fetch_config()?)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = logging::LogConfig {
        level: cli.global.log_level.clone(),
        json: cli.global.log_json,
        ..Default::default()
    }
    .with_overrides(cli.global.log_components.iter().map(String::as_str))?;
    logging::init_tracing(&log_config);

    let orchestrator = cli.global.orchestrator()?;

    match cli.command {
        Commands::FetchEvents {
            address,
            abi,
            start_block,
            end_block,
            output,
        } => {
            cmd_fetch::run(&orchestrator, &address, &abi, start_block, end_block, &output).await
        }

        Commands::BulkFetchEvents {
            config,
            abis,
            output,
            no_compress,
        } => cmd_bulk::run(&orchestrator, &config, abis.as_deref(), &output, !no_compress).await,
    }
}
