//! Pipeline benchmark: similarity filter rendering and page flattening.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowgraph_features::features::{flatten_page, Tabular};
use flowgraph_features::graph::{ConnectionRecord, Direction, DirectionPair, HostEntry};
use flowgraph_features::query::builder::similarity_count;
use flowgraph_features::query::discretize::similarity_predicates;
use flowgraph_features::query::{Filter, TimeWindow};
use serde_json::json;

fn make_connection(i: usize) -> ConnectionRecord {
    serde_json::from_value(json!({
        "uid": format!("0x{:x}", i),
        "connection.conn_state": ["SF", "RSTO", "SH", "S0"][i % 4],
        "connection.duration": (i % 200) as f64 * 0.37,
        "connection.orig_bytes": (i * 97) % 50_000,
        "connection.orig_ip_bytes": (i * 131) % 60_000,
        "connection.orig_p": 40_000 + i % 20_000,
        "connection.orig_pkts": i % 40,
        "connection.proto": "tcp",
        "connection.resp_bytes": (i * 53) % 40_000,
        "connection.resp_ip_bytes": (i * 71) % 45_000,
        "connection.resp_p": [53, 80, 443, 8080][i % 4],
        "connection.resp_pkts": i % 35,
        "connection.service": "http",
        "connection.ts": "2024-01-01T00:00:00Z",
        "connection.produced": [
            {"type": ["Http"], "http.method": "GET", "http.status_code": 200, "http.user_agent": "curl"},
            {"type": ["Http"], "http.method": "GET", "http.status_code": 200, "http.user_agent": "curl"},
            {"type": ["Dns"], "dns.qtype": 1, "dns.rcode": 0},
            {"type": ["Files"], "files.source": "HTTP", "files.fuid": [{"file.md5": format!("{:032x}", i)}]}
        ],
        "peer": [{"ip": "10.0.0.2"}]
    }))
    .unwrap_or_default()
}

fn bench_similarity_filter(c: &mut Criterion) {
    let records: Vec<ConnectionRecord> = (0..100).map(make_connection).collect();
    let window = TimeWindow::around("2024-01-01T00:00:00Z", chrono::Duration::minutes(5))
        .unwrap_or(TimeWindow {
            start: String::new(),
            end: String::new(),
        });

    c.bench_function("similarity_filter_100_connections", |b| {
        b.iter(|| {
            for r in &records {
                black_box(Filter::And(similarity_predicates(black_box(r))).to_string());
            }
        })
    });

    c.bench_function("similarity_query_4_pairs", |b| {
        b.iter(|| {
            for pair in DirectionPair::ALL {
                black_box(similarity_count(pair, "0x1", &window, black_box(&records[0])));
            }
        })
    });
}

fn bench_flatten(c: &mut Criterion) {
    let page = vec![HostEntry {
        host_ip: Some("10.0.0.1".to_string()),
        connections: (0..1000).map(make_connection).collect(),
    }];

    c.bench_function("flatten_page_1000_connections", |b| {
        b.iter(|| {
            let rows = flatten_page(black_box(page.clone()), "10.0.0.1", Direction::Originated);
            black_box(rows.iter().map(|r| r.to_row()).count())
        })
    });
}

criterion_group!(benches, bench_similarity_filter, bench_flatten);
criterion_main!(benches);
