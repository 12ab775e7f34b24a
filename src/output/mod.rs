//! Output files: per-host feature tables and the host list.
//!
//! - [`table`] — CSV rendering (csv crate) of [`Row`](crate::features::Row)s

pub mod table;

pub use table::CsvTableWriter;

use crate::error::{PipelineError, PipelineResult};
use crate::features::Tabular;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn output_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    }
}

fn table_error(path: &Path) -> impl FnOnce(csv::Error) -> PipelineError + '_ {
    move |source| PipelineError::Table {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `rows` to a CSV file at `path`. Nothing is created when `rows` is
/// empty. Returns the number of rows written.
pub fn write_table<T: Tabular>(path: &Path, rows: &[T]) -> PipelineResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(output_error(path))?;
    }
    let file = File::create(path).map_err(output_error(path))?;
    let mut writer = CsvTableWriter::new(BufWriter::new(file));
    writer.write_all(rows).map_err(table_error(path))?;
    let written = writer.rows();
    writer.finish().map_err(table_error(path))?;
    Ok(written)
}

/// One host IP per line, no header.
pub fn write_host_list(path: &Path, hosts: &[String]) -> PipelineResult<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(output_error(path))?;
    }
    let file = File::create(path).map_err(output_error(path))?;
    let mut w = BufWriter::new(file);
    for host in hosts {
        writeln!(w, "{}", host).map_err(output_error(path))?;
    }
    w.flush().map_err(output_error(path))?;
    Ok(hosts.len())
}

/// Read a host list written by [`write_host_list`]; blank lines are skipped.
pub fn read_host_list(path: &Path) -> PipelineResult<Vec<String>> {
    let host_list_error = |source| PipelineError::HostList {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(host_list_error)?;
    let mut hosts = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(host_list_error)?;
        let host = line.trim();
        if !host.is_empty() {
            hosts.push(host.to_string());
        }
    }
    Ok(hosts)
}
