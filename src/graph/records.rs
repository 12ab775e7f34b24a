//! Typed views of query responses. Fields absent from a response fall back to
//! zero / empty so that partial results never fail a page.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Entry of the host listing (`queryHosts`).
#[derive(Debug, Clone, Deserialize)]
pub struct HostIp {
    #[serde(rename = "host.ip", default)]
    pub ip: Option<String>,
}

/// One host of a connection-listing page with the connections of the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostEntry {
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// The far endpoint of a connection, reached through the reverse edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Peer {
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionRecord {
    /// Graph node uid
    #[serde(default)]
    pub uid: String,
    #[serde(rename = "connection.uid", default)]
    pub conn_uid: String,
    #[serde(rename = "connection.conn_state", default)]
    pub conn_state: String,
    #[serde(rename = "connection.duration", default)]
    pub duration: f64,
    #[serde(rename = "connection.orig_bytes", default)]
    pub orig_bytes: i64,
    #[serde(rename = "connection.orig_ip_bytes", default)]
    pub orig_ip_bytes: i64,
    #[serde(rename = "connection.orig_p", default)]
    pub orig_p: i64,
    #[serde(rename = "connection.orig_pkts", default)]
    pub orig_pkts: i64,
    #[serde(rename = "connection.proto", default)]
    pub proto: String,
    #[serde(rename = "connection.resp_bytes", default)]
    pub resp_bytes: i64,
    #[serde(rename = "connection.resp_ip_bytes", default)]
    pub resp_ip_bytes: i64,
    #[serde(rename = "connection.resp_p", default)]
    pub resp_p: i64,
    #[serde(rename = "connection.resp_pkts", default)]
    pub resp_pkts: i64,
    #[serde(rename = "connection.service", default)]
    pub service: Option<String>,
    /// RFC3339
    #[serde(rename = "connection.ts", default)]
    pub ts: String,
    /// Raw app-layer records; flattened into per-variant summaries
    #[serde(rename = "connection.produced", default)]
    pub produced: Vec<Map<String, Value>>,
    #[serde(default)]
    pub peer: Vec<Peer>,
}

impl ConnectionRecord {
    pub fn peer_ip(&self) -> Option<&str> {
        self.peer.iter().find_map(|p| p.ip.as_deref())
    }
}

/// App-layer record variants a connection can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AppKind {
    Dns,
    Ssh,
    Http,
    Ssl,
    Files,
}

/// Store predicate and output column of a summarized attribute.
pub type AttributeColumn = (&'static str, &'static str);

impl AppKind {
    pub const ALL: [AppKind; 5] = [
        AppKind::Dns,
        AppKind::Ssh,
        AppKind::Http,
        AppKind::Ssl,
        AppKind::Files,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AppKind::Dns => "dns",
            AppKind::Ssh => "ssh",
            AppKind::Http => "http",
            AppKind::Ssl => "ssl",
            AppKind::Files => "files",
        }
    }

    /// Matches the lowercased `dgraph.type` of a record.
    pub fn from_type_name(name: &str) -> Option<Self> {
        AppKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn attributes(self) -> &'static [AttributeColumn] {
        match self {
            AppKind::Dns => &[("dns.qtype", "dns_qtype"), ("dns.rcode", "dns_rcode")],
            AppKind::Ssh => &[
                ("ssh.auth_attempts", "ssh_auth_attempts"),
                ("ssh.host_key", "ssh_host_key"),
            ],
            AppKind::Http => &[
                ("http.method", "http_method"),
                ("http.status_code", "http_status_code"),
                ("http.user_agent", "http_user_agent"),
            ],
            AppKind::Ssl => &[
                ("ssl.version", "ssl_version"),
                ("ssl.cipher", "ssl_cipher"),
                ("ssl.curve", "ssl_curve"),
                ("ssl.validation_status", "ssl_validation_status"),
            ],
            AppKind::Files => &[("files.source", "files_source")],
        }
    }
}

pub const FILES_EDGE: &str = "files.fuid";
pub const FILE_MD5: &str = "file.md5";

#[derive(Debug, Clone, PartialEq)]
pub struct AppRecord {
    pub kind: AppKind,
    /// Declared attributes of the variant; `Null` when the store had no value
    pub attributes: BTreeMap<&'static str, Value>,
    /// MD5 hashes of the transferred files (files variant only)
    pub file_hashes: BTreeSet<String>,
}

impl AppRecord {
    /// Parse an `expand(_all_)` record. Records of other types yield `None`.
    pub fn from_raw(raw: &Map<String, Value>) -> Option<Self> {
        let type_name = match raw.get("type")? {
            Value::Array(names) => names.first()?.as_str()?,
            Value::String(name) => name.as_str(),
            _ => return None,
        };
        let kind = AppKind::from_type_name(type_name)?;

        let attributes = kind
            .attributes()
            .iter()
            .map(|(key, _)| (*key, raw.get(*key).cloned().unwrap_or(Value::Null)))
            .collect();

        let mut file_hashes = BTreeSet::new();
        if kind == AppKind::Files {
            if let Some(Value::Array(files)) = raw.get(FILES_EDGE) {
                file_hashes.extend(
                    files
                        .iter()
                        .filter_map(|f| f.get(FILE_MD5))
                        .filter_map(value_text),
                );
            }
        }

        Some(Self {
            kind,
            attributes,
            file_hashes,
        })
    }
}

/// Text form of a scalar attribute; `None` for null.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
