//! Operating modes and the per-host jobs they dispatch.
//!
//! - [`pool`] — fixed-size worker pool over the host list

pub mod pool;

pub use pool::{PoolReport, WorkerPool};

use crate::config::{ExtractorConfig, OutputConfig};
use crate::error::PipelineResult;
use crate::features::{flatten_connection, ConnectionRow, FeatureRow, NeighbourhoodAggregator};
use crate::graph::{Direction, GraphClient, HostIp};
use crate::output::{write_host_list, write_table};
use crate::pagination::Paginator;
use crate::query::builder::{host_listing, HOSTS_QUERY};
use tracing::info;

/// What a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Host IP list, the input of the other modes
    Hosts,
    /// Flattened connection listing per host and direction
    Connections,
    /// Full feature rows (connection + neighbourhood) per host
    Neighbourhood,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Hosts => "hosts",
            Mode::Connections => "connections",
            Mode::Neighbourhood => "neighbourhood",
        }
    }
}

/// Every host IP in the store.
pub fn list_hosts<C: GraphClient + ?Sized>(client: &C) -> PipelineResult<Vec<String>> {
    let request = host_listing();
    let mut data = client.query(&request.text, &request.variables)?;
    let hosts: Vec<HostIp> = match data.get_mut(HOSTS_QUERY) {
        Some(v) => serde_json::from_value(v.take()).map_err(crate::error::StoreError::from)?,
        None => Vec::new(),
    };
    Ok(hosts.into_iter().filter_map(|h| h.ip).collect())
}

/// Write the host list to `<dir>/<base>.csv`.
pub fn run_hosts_mode<C: GraphClient + ?Sized>(client: &C, output: &OutputConfig) -> PipelineResult<usize> {
    let hosts = list_hosts(client)?;
    let path = output.file_path(None, None);
    let written = write_host_list(&path, &hosts)?;
    info!(hosts = written, file = %path.display(), "host list written");
    Ok(written)
}

/// All connections of `host` along `direction`, flattened page by page.
pub fn collect_connections<C: GraphClient + ?Sized>(
    client: &C,
    host: &str,
    direction: Direction,
    page_size: u64,
) -> PipelineResult<Vec<ConnectionRow>> {
    let mut rows = Vec::new();
    for page in Paginator::new(client, direction, host, page_size) {
        rows.extend(page?.into_rows(host, direction));
    }
    Ok(rows)
}

/// Connections mode job: one table per direction,
/// `<base>-o-<ip>.csv` and `<base>-r-<ip>.csv`.
pub fn connections_job<C: GraphClient + ?Sized>(
    client: &C,
    host: &str,
    config: &ExtractorConfig,
) -> PipelineResult<usize> {
    let mut total = 0;
    for direction in [Direction::Originated, Direction::Responded] {
        let rows = collect_connections(client, host, direction, config.extraction.page_size)?;
        let path = config.output.file_path(Some(direction.tag()), Some(host));
        let written = write_table(&path, &rows)?;
        if written == 0 {
            info!(host = %host, direction = direction.as_str(), "no connections, no file written");
        } else {
            info!(host = %host, direction = direction.as_str(), rows = written, file = %path.display(), "connections written");
        }
        total += written;
    }
    Ok(total)
}

/// Feature rows of the connections `host` originated.
pub fn neighbourhood_rows<C: GraphClient + ?Sized>(
    client: &C,
    host: &str,
    config: &ExtractorConfig,
) -> PipelineResult<Vec<FeatureRow>> {
    let aggregator = NeighbourhoodAggregator::new(client, config.extraction.window());
    let direction = Direction::Originated;
    let mut rows = Vec::new();
    for page in Paginator::new(client, direction, host, config.extraction.page_size) {
        for entry in page?.entries {
            let ip = entry.host_ip.unwrap_or_else(|| host.to_string());
            for record in entry.connections {
                let neighbourhood = aggregator.aggregate(&record);
                rows.push(FeatureRow {
                    connection: flatten_connection(record, &ip, direction),
                    neighbourhood,
                });
            }
        }
    }
    Ok(rows)
}

/// Neighbourhood mode job: `<base>-<ip>.csv`.
pub fn neighbourhood_job<C: GraphClient + ?Sized>(
    client: &C,
    host: &str,
    config: &ExtractorConfig,
) -> PipelineResult<usize> {
    let rows = neighbourhood_rows(client, host, config)?;
    let path = config.output.file_path(None, Some(host));
    let written = write_table(&path, &rows)?;
    if written == 0 {
        info!(host = %host, "no connections, no file written");
    } else {
        info!(host = %host, rows = written, file = %path.display(), "feature rows written");
    }
    Ok(written)
}

/// Job function of a per-host mode; `None` for [`Mode::Hosts`].
pub fn host_job<C: GraphClient + ?Sized>(
    mode: Mode,
) -> Option<fn(&C, &str, &ExtractorConfig) -> PipelineResult<usize>> {
    match mode {
        Mode::Hosts => None,
        Mode::Connections => Some(connections_job::<C>),
        Mode::Neighbourhood => Some(neighbourhood_job::<C>),
    }
}
