//! Neighbourhood statistics of one connection.
//!
//! For each [`DirectionPair`] four sub-queries are issued (means, categorical
//! counts, port buckets, similar count). A sub-query that fails or returns
//! nothing leaves its statistics at their zero defaults; it never drops the
//! row.

use super::buckets::{CountTable, OrigPortBucket, RespPortBucket, CONN_STATES, PROTOCOLS, SERVICES};
use super::{Row, Tabular};
use crate::error::StoreError;
use crate::graph::{value_text, ConnectionRecord, DirectionPair, GraphClient};
use crate::query::builder::{
    self, CONN_STATE_COUNT_QUERY, MEAN_FIELDS, MEAN_QUERY, ORIG_PORT_COUNT_QUERY,
    PROTO_COUNT_QUERY, RESP_PORT_COUNT_QUERY, SERVICE_COUNT_QUERY, SIMILAR_COUNT_QUERY,
};
use crate::query::{Request, TimeWindow};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of one sub-query.
#[derive(Debug)]
pub enum SubQuery<T> {
    Rows(T),
    Empty,
    Failed(StoreError),
}

impl SubQuery<Value> {
    pub fn fetch<C: GraphClient + ?Sized>(client: &C, request: &Request) -> Self {
        match client.query(&request.text, &request.variables) {
            Ok(data) => SubQuery::Rows(data),
            Err(e) => SubQuery::Failed(e),
        }
    }
}

impl<T> SubQuery<T> {
    /// Parse the rows; a parser returning `None` makes the outcome `Empty`.
    pub fn and_then<U>(self, parse: impl FnOnce(T) -> Option<U>) -> SubQuery<U> {
        match self {
            SubQuery::Rows(rows) => parse(rows).map_or(SubQuery::Empty, SubQuery::Rows),
            SubQuery::Empty => SubQuery::Empty,
            SubQuery::Failed(e) => SubQuery::Failed(e),
        }
    }

    /// Rows, or `None` after logging why there were none.
    pub fn rows_or_log(self, query: &str, pair: DirectionPair) -> Option<T> {
        match self {
            SubQuery::Rows(rows) => Some(rows),
            SubQuery::Empty => {
                debug!(query, pair = %pair.prefix(), "empty neighbourhood result");
                None
            }
            SubQuery::Failed(e) => {
                warn!(query, pair = %pair.prefix(), error = %e, "neighbourhood sub-query failed, using defaults");
                None
            }
        }
    }
}

fn as_count(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
}

/// First root result of block `name`.
fn first_result<'a>(data: &'a Value, name: &str) -> Option<&'a Value> {
    data.get(name)?.get(0)
}

/// `(grouped value, count)` pairs of a `@groupby` block.
fn group_counts<'a>(data: &'a Value, name: &str, predicate: &str) -> Option<Vec<(&'a Value, u64)>> {
    let groups = first_result(data, name)?.get("@groupby")?.as_array()?;
    Some(
        groups
            .iter()
            .filter_map(|g| Some((g.get(predicate)?, as_count(g.get("count")?)?)))
            .collect(),
    )
}

/// Connection count, time range and counter averages of a neighbourhood.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanStats {
    pub total: u64,
    pub time_min: Value,
    pub time_max: Value,
    /// In [`MEAN_FIELDS`] order
    pub means: [f64; 7],
}

impl Default for MeanStats {
    fn default() -> Self {
        Self {
            total: 0,
            time_min: Value::from(0),
            time_max: Value::from(0),
            means: [0.0; 7],
        }
    }
}

impl MeanStats {
    pub fn from_data(data: &Value) -> Option<Self> {
        let endpoint = first_result(data, MEAN_QUERY)?.get("endpoint")?.get(0)?;
        let mut means = [0.0; 7];
        for (slot, (var, _)) in means.iter_mut().zip(MEAN_FIELDS) {
            *slot = endpoint
                .get(format!("avg_{}", var).as_str())
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
        }
        Some(Self {
            total: endpoint.get("count_all").and_then(as_count).unwrap_or(0),
            time_min: endpoint.get("min_ts").cloned().unwrap_or_else(|| Value::from(0)),
            time_max: endpoint.get("max_ts").cloned().unwrap_or_else(|| Value::from(0)),
            means,
        })
    }
}

/// Per-value counts of protocol, service and connection state.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCounts {
    pub proto: CountTable,
    pub service: CountTable,
    pub conn_state: CountTable,
    /// Set when the counts came from a store answer; defaults report no mode.
    pub answered: bool,
}

impl Default for CategoryCounts {
    fn default() -> Self {
        Self {
            proto: CountTable::seeded(&PROTOCOLS),
            service: CountTable::seeded(&SERVICES),
            conn_state: CountTable::seeded(&CONN_STATES),
            answered: false,
        }
    }
}

impl CategoryCounts {
    /// `None` when none of the three blocks returned groups. A block without
    /// groups in an otherwise answered query leaves its table at the seeds.
    pub fn from_data(data: &Value) -> Option<Self> {
        let mut counts = CategoryCounts::default();
        let mut found = false;
        let blocks = [
            (CONN_STATE_COUNT_QUERY, "connection.conn_state", &mut counts.conn_state),
            (PROTO_COUNT_QUERY, "connection.proto", &mut counts.proto),
            (SERVICE_COUNT_QUERY, "connection.service", &mut counts.service),
        ];
        for (name, predicate, table) in blocks {
            let Some(groups) = group_counts(data, name, predicate) else {
                continue;
            };
            found = true;
            for (value, count) in groups {
                if let Some(text) = value_text(value) {
                    table.set(&text, count);
                }
            }
        }
        counts.answered = found;
        found.then_some(counts)
    }

    /// Mode of `table`, or `-` when the categorical query gave no answer.
    pub fn mode_of<'t>(&self, table: &'t CountTable) -> &'t str {
        match table.mode() {
            Some(mode) if self.answered => mode,
            _ => "-",
        }
    }
}

/// Neighbour counts per port bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortCounts {
    pub orig: [u64; 2],
    pub resp: [u64; 10],
}

impl PortCounts {
    pub fn from_data(data: &Value) -> Option<Self> {
        let orig = group_counts(data, ORIG_PORT_COUNT_QUERY, "connection.orig_p");
        let resp = group_counts(data, RESP_PORT_COUNT_QUERY, "connection.resp_p");
        if orig.is_none() && resp.is_none() {
            return None;
        }
        let mut counts = PortCounts::default();
        for (port, count) in orig.into_iter().flatten() {
            if let Some(port) = port.as_i64() {
                counts.orig[OrigPortBucket::classify(port).index()] += count;
            }
        }
        for (port, count) in resp.into_iter().flatten() {
            if let Some(port) = port.as_i64() {
                counts.resp[RespPortBucket::classify(port).index()] += count;
            }
        }
        Some(counts)
    }
}

fn similar_from_data(data: &Value) -> Option<u64> {
    first_result(data, SIMILAR_COUNT_QUERY)?
        .get("count_similar")
        .and_then(as_count)
}

/// All statistics of one direction pair.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourhoodGroup {
    pub pair: DirectionPair,
    pub means: MeanStats,
    pub categories: CategoryCounts,
    pub ports: PortCounts,
    pub similar: u64,
}

impl NeighbourhoodGroup {
    pub fn empty(pair: DirectionPair) -> Self {
        Self {
            pair,
            means: MeanStats::default(),
            categories: CategoryCounts::default(),
            ports: PortCounts::default(),
            similar: 0,
        }
    }
}

impl Tabular for NeighbourhoodGroup {
    fn write_row(&self, row: &mut Row) {
        let p = self.pair.prefix();
        let m = &self.means;
        row.push(format!("{}_total", p), m.total);
        row.push(format!("{}_connection.time_min", p), value_text(&m.time_min));
        row.push(format!("{}_connection.time_max", p), value_text(&m.time_max));
        for ((var, _), mean) in MEAN_FIELDS.iter().zip(m.means) {
            row.push(format!("{}_connection.{}_mean", p, var), mean);
        }

        let c = &self.categories;
        for (label, table) in [("proto", &c.proto), ("conn_state", &c.conn_state), ("service", &c.service)] {
            for (value, count) in table.seeded_entries() {
                row.push(format!("{}_{}_{}_count", p, label, value), *count);
            }
        }
        for (label, table) in [("protocol", &c.proto), ("service", &c.service), ("conn_state", &c.conn_state)] {
            row.push(format!("{}_connection.{}_mode", p, label), c.mode_of(table));
        }

        for bucket in OrigPortBucket::ALL {
            row.push(format!("{}_{}", p, bucket.column()), self.ports.orig[bucket.index()]);
        }
        for bucket in RespPortBucket::ALL {
            row.push(format!("{}_{}", p, bucket.column()), self.ports.resp[bucket.index()]);
        }

        row.push(format!("{}_similar_count", p), self.similar);
    }
}

/// Issues the neighbourhood sub-queries of a connection through one client.
pub struct NeighbourhoodAggregator<'a, C: GraphClient + ?Sized> {
    client: &'a C,
    half_width: chrono::Duration,
}

impl<'a, C: GraphClient + ?Sized> NeighbourhoodAggregator<'a, C> {
    pub fn new(client: &'a C, half_width: chrono::Duration) -> Self {
        Self { client, half_width }
    }

    /// One group per pair, in [`DirectionPair::ALL`] order.
    pub fn aggregate(&self, record: &ConnectionRecord) -> Vec<NeighbourhoodGroup> {
        let Some(window) = TimeWindow::around(&record.ts, self.half_width) else {
            warn!(uid = %record.uid, ts = %record.ts, "unparsable connection timestamp, neighbourhood left at defaults");
            return DirectionPair::ALL.into_iter().map(NeighbourhoodGroup::empty).collect();
        };
        DirectionPair::ALL
            .into_iter()
            .map(|pair| self.group(pair, record, &window))
            .collect()
    }

    fn group(&self, pair: DirectionPair, record: &ConnectionRecord, window: &TimeWindow) -> NeighbourhoodGroup {
        let uid = record.uid.as_str();
        NeighbourhoodGroup {
            pair,
            means: self
                .run(builder::neighbourhood_means(pair, uid, window), pair, MeanStats::from_data)
                .unwrap_or_default(),
            categories: self
                .run(builder::categorical_counts(pair, uid, window), pair, CategoryCounts::from_data)
                .unwrap_or_default(),
            ports: self
                .run(builder::port_counts(pair, uid, window), pair, PortCounts::from_data)
                .unwrap_or_default(),
            similar: self
                .run(builder::similarity_count(pair, uid, window, record), pair, similar_from_data)
                .unwrap_or(0),
        }
    }

    fn run<T>(&self, request: Request, pair: DirectionPair, parse: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        SubQuery::fetch(self.client, &request)
            .and_then(|data| parse(&data))
            .rows_or_log(request.name, pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Cell;
    use crate::graph::{Direction, Variables};
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers by matching the operation name in the query text.
    struct ScriptedClient {
        answers: Vec<(&'static str, Result<Value, ()>)>,
        seen: Mutex<Vec<String>>,
    }

    impl GraphClient for ScriptedClient {
        fn query(&self, text: &str, _variables: &Variables) -> Result<Value, StoreError> {
            self.seen.lock().unwrap().push(text.to_string());
            for (name, answer) in &self.answers {
                if text.contains(&format!("query {}(", name)) {
                    return answer
                        .clone()
                        .map_err(|_| StoreError::Server("scripted failure".into()));
                }
            }
            Ok(json!({}))
        }
    }

    fn reference() -> ConnectionRecord {
        ConnectionRecord {
            uid: "0x1".into(),
            ts: "2024-01-01T00:00:00Z".into(),
            proto: "tcp".into(),
            conn_state: "SF".into(),
            ..Default::default()
        }
    }

    #[test]
    fn mean_stats_parse() {
        let data = json!({MEAN_QUERY: [{"connection.ts": "x", "endpoint": [{
            "ip": "10.0.0.1",
            "avg_duration": 1.5,
            "avg_resp_pkts": 4.0,
            "min_ts": "2024-01-01T00:00:00Z",
            "max_ts": "2024-01-01T00:01:00Z",
            "count_all": 3.0
        }]}]});
        let m = MeanStats::from_data(&data).unwrap();
        assert_eq!(m.total, 3);
        assert_eq!(m.means[0], 1.5);
        assert_eq!(m.means[6], 4.0);
        assert_eq!(m.means[1], 0.0);
        assert_eq!(m.time_max, json!("2024-01-01T00:01:00Z"));
        assert!(MeanStats::from_data(&json!({MEAN_QUERY: []})).is_none());
    }

    #[test]
    fn categorical_counts_keep_seeds() {
        let data = json!({
            CONN_STATE_COUNT_QUERY: [{"@groupby": [
                {"connection.conn_state": "SF", "count": 5},
                {"connection.conn_state": "S0", "count": 5}
            ]}],
            PROTO_COUNT_QUERY: [{"@groupby": [{"connection.proto": "udp", "count": 2}]}],
            SERVICE_COUNT_QUERY: []
        });
        let c = CategoryCounts::from_data(&data).unwrap();
        assert_eq!(c.conn_state.mode(), Some("S0"));
        assert_eq!(c.proto.get("udp"), 2);
        assert_eq!(c.proto.get("tcp"), 0);
        assert_eq!(c.service.get("http"), 0);
        assert!(CategoryCounts::from_data(&json!({})).is_none());
    }

    #[test]
    fn answered_query_without_service_groups_reports_seeded_mode() {
        let data = json!({
            CONN_STATE_COUNT_QUERY: [{"@groupby": [{"connection.conn_state": "SF", "count": 2}]}],
            PROTO_COUNT_QUERY: [{"@groupby": [{"connection.proto": "tcp", "count": 2}]}],
            SERVICE_COUNT_QUERY: []
        });
        let c = CategoryCounts::from_data(&data).unwrap();
        assert_eq!(c.mode_of(&c.service), "NaN");
        assert_eq!(c.mode_of(&c.conn_state), "SF");

        let pair = DirectionPair::new(Direction::Originated, Direction::Originated);
        let group = NeighbourhoodGroup {
            categories: c,
            ..NeighbourhoodGroup::empty(pair)
        };
        let row = group.to_row();
        assert_eq!(row.get("orig_orig_connection.service_mode").map(Cell::render).as_deref(), Some("NaN"));
        assert_eq!(row.get("orig_orig_connection.protocol_mode").map(Cell::render).as_deref(), Some("tcp"));

        let unanswered = CategoryCounts::default();
        assert_eq!(unanswered.mode_of(&unanswered.service), "-");
    }

    #[test]
    fn port_counts_are_summed_per_bucket() {
        let data = json!({
            ORIG_PORT_COUNT_QUERY: [{"@groupby": [
                {"connection.orig_p": 50000, "count": 2},
                {"connection.orig_p": 60000, "count": 3}
            ]}],
            RESP_PORT_COUNT_QUERY: [{"@groupby": [
                {"connection.resp_p": 443, "count": 7},
                {"connection.resp_p": 8080, "count": 1},
                {"connection.resp_p": 9999, "count": 1}
            ]}]
        });
        let p = PortCounts::from_data(&data).unwrap();
        assert_eq!(p.orig, [0, 5]);
        assert_eq!(p.resp[RespPortBucket::Https.index()], 7);
        assert_eq!(p.resp[RespPortBucket::Registered.index()], 2);
    }

    #[test]
    fn empty_group_columns() {
        let pair = DirectionPair::new(Direction::Originated, Direction::Responded);
        let row = NeighbourhoodGroup::empty(pair).to_row();
        assert_eq!(row.get("orig_resp_total"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_connection.time_min").map(Cell::render).as_deref(), Some("0"));
        assert_eq!(row.get("orig_resp_connection.duration_mean"), Some(&Cell::Float(0.0)));
        assert_eq!(row.get("orig_resp_proto_tcp_count"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_service_NaN_count"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_conn_state_RSTOS0_count"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_connection.protocol_mode").map(Cell::render).as_deref(), Some("-"));
        assert_eq!(row.get("orig_resp_resp_443_count"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_orig_p_reg_or_dyn_count"), Some(&Cell::Int(0)));
        assert_eq!(row.get("orig_resp_similar_count"), Some(&Cell::Int(0)));
        assert_eq!(row.columns().len(), 1 + 2 + 7 + 3 + 14 + 13 + 3 + 2 + 10 + 1);
    }

    #[test]
    fn failed_sub_query_degrades_to_defaults() {
        let client = ScriptedClient {
            answers: vec![
                (MEAN_QUERY, Err(())),
                (SIMILAR_COUNT_QUERY, Ok(json!({SIMILAR_COUNT_QUERY: [{"count_similar": 4}]}))),
            ],
            seen: Mutex::new(Vec::new()),
        };
        let groups = NeighbourhoodAggregator::new(&client, chrono::Duration::minutes(5)).aggregate(&reference());
        assert_eq!(groups.len(), 4);
        assert_eq!(client.seen.lock().unwrap().len(), 16);
        for (g, pair) in groups.iter().zip(DirectionPair::ALL) {
            assert_eq!(g.pair, pair);
            assert_eq!(g.means, MeanStats::default());
            assert_eq!(g.similar, 4);
        }
    }

    #[test]
    fn unparsable_timestamp_skips_queries() {
        let client = ScriptedClient {
            answers: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let record = ConnectionRecord {
            ts: "not a time".into(),
            ..reference()
        };
        let groups = NeighbourhoodAggregator::new(&client, chrono::Duration::minutes(5)).aggregate(&record);
        assert_eq!(groups.len(), 4);
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
