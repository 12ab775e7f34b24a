//! Flatten nested connection pages into one row per connection, summarizing
//! the app-layer records of each connection per variant.

use super::{Cell, Row, Tabular};
use crate::graph::{AppKind, AppRecord, ConnectionRecord, Direction, HostEntry};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const FILE_MD5_COLUMN: &str = "file_md5";
const FILE_MD5S_DETAIL: &str = "file.md5s";

/// A distinct app-record detail and how many records carried it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailEntry {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
    pub count: usize,
}

/// Distinct JSON values, ordered by their JSON text. Values keep their type,
/// so a status code stays a number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet(BTreeMap<String, Value>);

impl ValueSet {
    /// Nulls are not collected.
    pub fn insert(&mut self, value: Value) {
        if !value.is_null() {
            self.0.entry(value.to_string()).or_insert(value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }
}

/// Summary of one app-record variant within a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSummary {
    pub kind: AppKind,
    pub count: usize,
    /// `(column, distinct values)` in column order
    pub values: Vec<(&'static str, ValueSet)>,
    pub details: Vec<DetailEntry>,
}

impl VariantSummary {
    pub fn empty(kind: AppKind) -> Self {
        let mut values: Vec<(&'static str, ValueSet)> = kind
            .attributes()
            .iter()
            .map(|(_, column)| (*column, ValueSet::default()))
            .collect();
        if kind == AppKind::Files {
            values.push((FILE_MD5_COLUMN, ValueSet::default()));
        }
        Self {
            kind,
            count: 0,
            values,
            details: Vec::new(),
        }
    }

    pub fn values_of(&self, column: &str) -> Option<&ValueSet> {
        self.values.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    fn record(&mut self, record: &AppRecord, details: &mut Vec<BTreeMap<String, Value>>) {
        self.count += 1;
        for ((_, set), (key, _)) in self.values.iter_mut().zip(record.kind.attributes()) {
            if let Some(value) = record.attributes.get(key) {
                set.insert(value.clone());
            }
        }
        let mut detail: BTreeMap<String, Value> = record
            .attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if record.kind == AppKind::Files {
            if let Some((_, set)) = self.values.iter_mut().find(|(c, _)| *c == FILE_MD5_COLUMN) {
                for hash in &record.file_hashes {
                    set.insert(Value::String(hash.clone()));
                }
            }
            detail.insert(
                FILE_MD5S_DETAIL.to_string(),
                Value::Array(record.file_hashes.iter().cloned().map(Value::String).collect()),
            );
        }
        details.push(detail);
    }
}

/// Merge identical detail records (compared with keys in canonical order)
/// into one entry carrying their count.
pub fn unique_and_count(records: Vec<BTreeMap<String, Value>>) -> Vec<DetailEntry> {
    let mut grouped: BTreeMap<String, DetailEntry> = BTreeMap::new();
    for attributes in records {
        let key = serde_json::to_string(&attributes).unwrap_or_default();
        grouped
            .entry(key)
            .and_modify(|e| e.count += 1)
            .or_insert(DetailEntry {
                attributes,
                count: 1,
            });
    }
    grouped.into_values().collect()
}

/// App-layer summaries of one connection, one per variant.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSummary {
    pub variants: Vec<VariantSummary>,
}

impl Default for AppSummary {
    fn default() -> Self {
        Self {
            variants: AppKind::ALL.into_iter().map(VariantSummary::empty).collect(),
        }
    }
}

impl AppSummary {
    pub fn from_records<'a>(raw: impl IntoIterator<Item = &'a serde_json::Map<String, Value>>) -> Self {
        let mut summary = AppSummary::default();
        let mut details: Vec<Vec<BTreeMap<String, Value>>> = vec![Vec::new(); AppKind::ALL.len()];
        for record in raw.into_iter().filter_map(AppRecord::from_raw) {
            let idx = summary.index(record.kind);
            summary.variants[idx].record(&record, &mut details[idx]);
        }
        for (variant, records) in summary.variants.iter_mut().zip(details) {
            variant.details = unique_and_count(records);
        }
        summary
    }

    fn index(&self, kind: AppKind) -> usize {
        AppKind::ALL.iter().position(|k| *k == kind).unwrap_or(0)
    }

    pub fn variant(&self, kind: AppKind) -> &VariantSummary {
        &self.variants[self.index(kind)]
    }
}

impl Tabular for AppSummary {
    fn write_row(&self, row: &mut Row) {
        for v in &self.variants {
            row.push(format!("{}_count", v.kind.name()), v.count as u64);
        }
        for v in &self.variants {
            for (column, set) in &v.values {
                row.push(*column, Cell::List(set.iter().cloned().collect()));
            }
        }
        for v in &self.variants {
            let details = serde_json::to_value(&v.details).unwrap_or(Value::Array(Vec::new()));
            row.push(format!("{}_dicts", v.kind.name()), Cell::Json(details));
        }
    }
}

/// A connection with its endpoints resolved and app records summarized.
#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub originated_ip: Option<String>,
    pub responded_ip: Option<String>,
    /// Own attributes; the raw `produced` records are dropped once summarized
    pub record: ConnectionRecord,
    pub apps: AppSummary,
}

/// `host_ip` is the host the record was listed from along `direction`.
pub fn flatten_connection(
    mut record: ConnectionRecord,
    host_ip: &str,
    direction: Direction,
) -> ConnectionRow {
    let produced = std::mem::take(&mut record.produced);
    let apps = AppSummary::from_records(&produced);
    let peer = record.peer_ip().map(str::to_string);
    let host = Some(host_ip.to_string());
    let (originated_ip, responded_ip) = match direction {
        Direction::Originated => (host, peer),
        Direction::Responded => (peer, host),
    };
    ConnectionRow {
        originated_ip,
        responded_ip,
        record,
        apps,
    }
}

/// Flatten every connection of a page, keeping response order.
pub fn flatten_page(entries: Vec<HostEntry>, requested_ip: &str, direction: Direction) -> Vec<ConnectionRow> {
    entries
        .into_iter()
        .flat_map(|entry| {
            let ip = entry.host_ip.unwrap_or_else(|| requested_ip.to_string());
            entry
                .connections
                .into_iter()
                .map(move |c| flatten_connection(c, &ip, direction))
                .collect::<Vec<_>>()
        })
        .collect()
}

impl Tabular for ConnectionRow {
    fn write_row(&self, row: &mut Row) {
        let r = &self.record;
        row.push("originated_ip", self.originated_ip.clone());
        row.push("responded_ip", self.responded_ip.clone());
        row.push("uid", r.uid.as_str());
        row.push("connection.uid", r.conn_uid.as_str());
        row.push("connection.conn_state", r.conn_state.as_str());
        row.push("connection.duration", r.duration);
        row.push("connection.orig_bytes", r.orig_bytes);
        row.push("connection.orig_ip_bytes", r.orig_ip_bytes);
        row.push("connection.orig_p", r.orig_p);
        row.push("connection.orig_pkts", r.orig_pkts);
        row.push("connection.proto", r.proto.as_str());
        row.push("connection.resp_bytes", r.resp_bytes);
        row.push("connection.resp_ip_bytes", r.resp_ip_bytes);
        row.push("connection.resp_p", r.resp_p);
        row.push("connection.resp_pkts", r.resp_pkts);
        row.push("connection.service", r.service.clone());
        row.push("connection.ts", r.ts.as_str());
        self.apps.write_row(row);
    }
}
