//! Query constructors, one per feature category.
//!
//! Edges are aliased (`connections`, `peer`, `endpoint`, `neighbours`) so that
//! responses have the same shape whatever direction was requested.

use super::discretize::similarity_predicates;
use super::{
    AggregateFn, Block, Directive, Edge, Filter, GraphQuery, Literal, Request, RootFunc,
    Selection, TimeWindow, VarType,
};
use crate::graph::{ConnectionRecord, Direction, DirectionPair};

pub const HOSTS_QUERY: &str = "queryHosts";
pub const MEAN_QUERY: &str = "queryAverageNeighbourhood";
pub const NEIGHBOURHOOD_QUERY: &str = "queryConnNeighbourhood";
pub const CONN_STATE_COUNT_QUERY: &str = "queryNeighbourhoodConnstateCount";
pub const PROTO_COUNT_QUERY: &str = "queryNeighbourhoodProtoCount";
pub const SERVICE_COUNT_QUERY: &str = "queryNeighbourhoodServiceCount";
pub const ORIG_PORT_COUNT_QUERY: &str = "queryNeighbourhoodPortOrigCount";
pub const RESP_PORT_COUNT_QUERY: &str = "queryNeighbourhoodPortRespCount";
pub const SIMILAR_COUNT_QUERY: &str = "querySimilarNeighbourhoodCount";

/// Scalar predicates selected for every listed connection.
pub const CONNECTION_FIELDS: [&str; 15] = [
    "uid",
    "connection.uid",
    "connection.conn_state",
    "connection.duration",
    "connection.orig_bytes",
    "connection.orig_ip_bytes",
    "connection.orig_p",
    "connection.orig_pkts",
    "connection.proto",
    "connection.resp_bytes",
    "connection.resp_ip_bytes",
    "connection.resp_p",
    "connection.resp_pkts",
    "connection.service",
    "connection.ts",
];

/// `(value variable, predicate)` averaged by the mean query; the response
/// carries `avg_<var>`.
pub const MEAN_FIELDS: [(&str, &str); 7] = [
    ("duration", "connection.duration"),
    ("orig_bytes", "connection.orig_bytes"),
    ("orig_ip_bytes", "connection.orig_ip_bytes"),
    ("orig_pkts", "connection.orig_pkts"),
    ("resp_bytes", "connection.resp_bytes"),
    ("resp_ip_bytes", "connection.resp_ip_bytes"),
    ("resp_pkts", "connection.resp_pkts"),
];

const NEIGHBOURHOOD_PARAMS: [(&str, VarType); 3] = [
    ("uid", VarType::String),
    ("ts_start", VarType::String),
    ("ts_end", VarType::String),
];

fn connection_fields() -> Vec<Selection> {
    CONNECTION_FIELDS.into_iter().map(Selection::field).collect()
}

/// `peer: ~host.<reverse> { ip: host.ip }`: the other endpoint of a connection
/// reached from a host along `direction`.
fn peer_edge(direction: Direction) -> Selection {
    Edge::new(direction.reverse().reverse_edge())
        .alias("peer")
        .select([Selection::aliased("ip", "host.ip")])
        .into()
}

fn in_window() -> Filter {
    Filter::between("connection.ts", Literal::Var("ts_start"), Literal::Var("ts_end"))
}

fn window_bindings(uid: &str, window: &TimeWindow) -> [(&'static str, String); 3] {
    [
        ("uid", uid.to_string()),
        ("ts_start", window.start.clone()),
        ("ts_end", window.end.clone()),
    ]
}

/// Root block shared by all neighbourhood queries:
/// connection -> endpoint host -> endpoint's connections in the window.
fn neighbourhood_block(
    name: &'static str,
    pair: DirectionPair,
    root_directives: Vec<Directive>,
    neighbours: Edge,
    endpoint_extra: Vec<Selection>,
) -> Block {
    let mut endpoint = Edge::new(pair.endpoint.reverse_edge())
        .alias("endpoint")
        .select([Selection::aliased("ip", "host.ip"), neighbours.into()]);
    endpoint.selections.extend(endpoint_extra);
    Block {
        name,
        func: RootFunc::Uid(Literal::Var("uid")),
        directives: root_directives,
        selections: vec![Selection::field("connection.ts"), endpoint.into()],
    }
}

fn neighbours_edge(pair: DirectionPair) -> Edge {
    Edge::new(pair.edge.edge()).alias("neighbours")
}

/// Every host IP in the graph.
pub fn host_listing() -> Request {
    GraphQuery {
        name: HOSTS_QUERY,
        params: vec![],
        blocks: vec![Block {
            name: HOSTS_QUERY,
            func: RootFunc::Type("Host"),
            directives: vec![],
            selections: vec![Selection::field("host.ip")],
        }],
    }
    .bind(std::iter::empty())
}

pub fn listing_query_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Originated => "queryHostOriginated",
        Direction::Responded => "queryHostResponded",
    }
}

/// One page of a host's connections in `direction`, with app-layer records
/// and the peer IP.
pub fn connection_listing(direction: Direction, ip: &str, offset: u64, first: u64) -> Request {
    let name = listing_query_name(direction);
    let produced = Edge::new("connection.produced").select([
        Selection::Expand("_all_"),
        Selection::aliased("type", "dgraph.type"),
        Edge::new("files.fuid")
            .select([Selection::Expand("File")])
            .into(),
    ]);

    let mut fields = connection_fields();
    fields.push(produced.into());
    fields.push(peer_edge(direction));

    GraphQuery {
        name,
        params: vec![
            ("ip", VarType::String),
            ("offset", VarType::Int),
            ("first", VarType::Int),
        ],
        blocks: vec![Block {
            name,
            func: RootFunc::Eq("host.ip", Literal::Var("ip")),
            directives: vec![],
            selections: vec![
                Selection::aliased("host_ip", "host.ip"),
                Edge::new(direction.edge())
                    .alias("connections")
                    .page(Literal::Var("offset"), Literal::Var("first"))
                    .select(fields)
                    .into(),
            ],
        }],
    }
    .bind([
        ("ip", ip.to_string()),
        ("offset", offset.to_string()),
        ("first", first.to_string()),
    ])
}

/// Connections in the neighbourhood of `uid`.
pub fn neighbourhood_listing(pair: DirectionPair, uid: &str, window: &TimeWindow) -> Request {
    let mut fields = connection_fields();
    fields.push(peer_edge(pair.endpoint));
    let neighbours = neighbours_edge(pair)
        .directive(Directive::Filter(in_window()))
        .select(fields);

    GraphQuery {
        name: NEIGHBOURHOOD_QUERY,
        params: NEIGHBOURHOOD_PARAMS.to_vec(),
        blocks: vec![neighbourhood_block(
            NEIGHBOURHOOD_QUERY,
            pair,
            vec![Directive::Cascade],
            neighbours,
            vec![],
        )],
    }
    .bind(window_bindings(uid, window))
}

/// Count, timestamp range and averages of the numeric counters.
pub fn neighbourhood_means(pair: DirectionPair, uid: &str, window: &TimeWindow) -> Request {
    let mut vars = vec![Selection::var("uids", "math(1)")];
    vars.extend(MEAN_FIELDS.into_iter().map(|(var, pred)| Selection::var(var, pred)));
    vars.push(Selection::var("ts", "connection.ts"));
    vars.push(peer_edge(pair.endpoint));

    let neighbours = neighbours_edge(pair)
        .directive(Directive::Filter(in_window()))
        .directive(Directive::Normalize)
        .select(vars);

    let mut aggregates: Vec<Selection> = MEAN_FIELDS
        .into_iter()
        .map(|(var, _)| Selection::aggregate(format!("avg_{}", var), AggregateFn::Avg, var))
        .collect();
    aggregates.push(Selection::aggregate("min_ts", AggregateFn::Min, "ts"));
    aggregates.push(Selection::aggregate("max_ts", AggregateFn::Max, "ts"));
    aggregates.push(Selection::aggregate("count_all", AggregateFn::Sum, "uids"));

    GraphQuery {
        name: MEAN_QUERY,
        params: NEIGHBOURHOOD_PARAMS.to_vec(),
        blocks: vec![neighbourhood_block(
            MEAN_QUERY,
            pair,
            vec![Directive::Cascade],
            neighbours,
            aggregates,
        )],
    }
    .bind(window_bindings(uid, window))
}

fn group_count_block(name: &'static str, pair: DirectionPair, group_by: &'static str) -> Block {
    let neighbours = neighbours_edge(pair)
        .directive(Directive::Filter(in_window()))
        .directive(Directive::GroupBy(group_by))
        .select([Selection::CountUid]);
    neighbourhood_block(
        name,
        pair,
        vec![Directive::Cascade, Directive::Normalize],
        neighbours,
        vec![],
    )
}

/// Per-value counts of connection state, protocol and service.
pub fn categorical_counts(pair: DirectionPair, uid: &str, window: &TimeWindow) -> Request {
    GraphQuery {
        name: CONN_STATE_COUNT_QUERY,
        params: NEIGHBOURHOOD_PARAMS.to_vec(),
        blocks: vec![
            group_count_block(CONN_STATE_COUNT_QUERY, pair, "connection.conn_state"),
            group_count_block(PROTO_COUNT_QUERY, pair, "connection.proto"),
            group_count_block(SERVICE_COUNT_QUERY, pair, "connection.service"),
        ],
    }
    .bind(window_bindings(uid, window))
}

/// Per-port counts of originator and responder ports.
pub fn port_counts(pair: DirectionPair, uid: &str, window: &TimeWindow) -> Request {
    GraphQuery {
        name: ORIG_PORT_COUNT_QUERY,
        params: NEIGHBOURHOOD_PARAMS.to_vec(),
        blocks: vec![
            group_count_block(ORIG_PORT_COUNT_QUERY, pair, "connection.orig_p"),
            group_count_block(RESP_PORT_COUNT_QUERY, pair, "connection.resp_p"),
        ],
    }
    .bind(window_bindings(uid, window))
}

/// Number of neighbours similar to `reference`.
pub fn similarity_count(
    pair: DirectionPair,
    uid: &str,
    window: &TimeWindow,
    reference: &ConnectionRecord,
) -> Request {
    let mut filter = vec![in_window()];
    filter.extend(similarity_predicates(reference));

    let neighbours = neighbours_edge(pair)
        .directive(Directive::Filter(Filter::And(filter)))
        .directive(Directive::Normalize)
        .select([Selection::var("uids", "math(1)")]);

    let endpoint = Edge::new(pair.endpoint.reverse_edge())
        .alias("endpoint")
        .select([
            neighbours.into(),
            Selection::aggregate("count_similar", AggregateFn::Sum, "uids"),
        ]);

    GraphQuery {
        name: SIMILAR_COUNT_QUERY,
        params: NEIGHBOURHOOD_PARAMS.to_vec(),
        blocks: vec![Block {
            name: SIMILAR_COUNT_QUERY,
            func: RootFunc::Uid(Literal::Var("uid")),
            directives: vec![Directive::Cascade, Directive::Normalize],
            selections: vec![Selection::field("connection.ts"), endpoint.into()],
        }],
    }
    .bind(window_bindings(uid, window))
}
