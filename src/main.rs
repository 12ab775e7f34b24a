//! flowgraph-features entrypoint: lists hosts, or extracts per-host connection
//! tables / neighbourhood feature rows from the graph store.

use clap::{ArgGroup, Parser};
use flowgraph_features::{
    config::ExtractorConfig,
    graph::DgraphHttpClient,
    logging::StructuredLogger,
    orchestrator::{self, Mode, WorkerPool},
    output::read_host_list,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["ips_mode", "connections_mode", "neighbourhood_mode"])
))]
struct Cli {
    /// Write every host IP of the store, one per line
    #[arg(long)]
    ips_mode: bool,

    /// Write the flattened connection listing of each host, per direction
    #[arg(long)]
    connections_mode: bool,

    /// Write full neighbourhood feature rows of each host's connections
    #[arg(long)]
    neighbourhood_mode: bool,

    /// Graph store host (overrides config file)
    #[arg(long, env = "FLOWGRAPH_STORE_HOST")]
    store_host: Option<String>,

    /// Graph store HTTP port (overrides config file)
    #[arg(long, env = "FLOWGRAPH_STORE_PORT")]
    store_port: Option<u16>,

    /// Connections per page
    #[arg(long)]
    page_size: Option<u64>,

    /// Output file base name; `.csv` and host/direction suffixes are appended
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Output directory (overrides config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Host list written by `--ips-mode`; required by the per-host modes
    #[arg(long)]
    ips_file: Option<PathBuf>,

    /// Parallel host jobs
    #[arg(long)]
    workers: Option<usize>,

    /// Half-width of the neighbourhood window, in seconds
    #[arg(long)]
    window_secs: Option<i64>,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.ips_mode {
            Mode::Hosts
        } else if self.connections_mode {
            Mode::Connections
        } else {
            Mode::Neighbourhood
        }
    }

    fn apply(&self, config: &mut ExtractorConfig) {
        if let Some(host) = &self.store_host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.store_port {
            config.store.port = port;
        }
        if let Some(page_size) = self.page_size {
            config.extraction.page_size = page_size;
        }
        if let Some(workers) = self.workers {
            config.extraction.pool_size = workers;
        }
        if let Some(window) = self.window_secs {
            config.extraction.window_secs = window;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(file) = &self.output_file {
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.output.directory = parent.to_path_buf();
            }
            if let Some(stem) = file.file_stem() {
                config.output.base_name = stem.to_string_lossy().into_owned();
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config_path = std::env::var("FLOWGRAPH_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let mut config = ExtractorConfig::load(&config_path);
    cli.apply(&mut config);

    StructuredLogger::init(&config.log);

    let mode = cli.mode();
    let started = Instant::now();
    info!(
        mode = mode.as_str(),
        store = %config.store.base_url(),
        page_size = config.extraction.page_size,
        workers = config.extraction.pool_size,
        "flowgraph-features starting"
    );

    let job = match orchestrator::host_job::<DgraphHttpClient>(mode) {
        None => {
            let client = DgraphHttpClient::connect(&config.store)?;
            orchestrator::run_hosts_mode(&client, &config.output)?;
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "finished");
            return Ok(());
        }
        Some(job) => job,
    };

    let ips_file = cli
        .ips_file
        .as_deref()
        .ok_or("--ips-file is required with --connections-mode and --neighbourhood-mode")?;
    let hosts = read_host_list(ips_file)?;
    info!(hosts = hosts.len(), file = %ips_file.display(), "host list loaded");

    let pool = WorkerPool::new(config.extraction.pool_size);
    let clients = (0..pool.workers_for(hosts.len()))
        .map(|_| DgraphHttpClient::connect(&config.store))
        .collect::<Result<Vec<_>, _>>()?;

    let config = Arc::new(config);
    let job_config = Arc::clone(&config);
    let report = pool.run(hosts, clients, move |client, host| job(client, host, &job_config))?;

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished"
    );
    Ok(())
}
