//! Traffic graph model (hosts, connections, app-layer records) and the store client.
//!
//! - [`client`] — `GraphClient` contract and the Dgraph HTTP implementation
//! - [`records`] — typed views of query responses

mod client;
mod records;

pub use client::{DgraphHttpClient, GraphClient, Variables};
pub use records::{value_text, AppKind, AppRecord, ConnectionRecord, HostEntry, HostIp, Peer};

/// Edge direction between a host and its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Originated,
    Responded,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Originated => Direction::Responded,
            Direction::Responded => Direction::Originated,
        }
    }

    /// Host -> connection edge
    pub fn edge(self) -> &'static str {
        match self {
            Direction::Originated => "host.originated",
            Direction::Responded => "host.responded",
        }
    }

    /// Connection -> host edge (reverse of [`Direction::edge`])
    pub fn reverse_edge(self) -> &'static str {
        match self {
            Direction::Originated => "~host.originated",
            Direction::Responded => "~host.responded",
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            Direction::Originated => "orig",
            Direction::Responded => "resp",
        }
    }

    /// One-letter tag used in connection-listing file names
    pub fn tag(self) -> &'static str {
        match self {
            Direction::Originated => "o",
            Direction::Responded => "r",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Originated => "originated",
            Direction::Responded => "responded",
        }
    }
}

/// Selects a neighbourhood: the connection's `endpoint` host, then that host's
/// connections along `edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectionPair {
    pub endpoint: Direction,
    pub edge: Direction,
}

impl DirectionPair {
    /// Merge order of the neighbourhood groups in a feature row.
    pub const ALL: [DirectionPair; 4] = [
        DirectionPair::new(Direction::Originated, Direction::Originated),
        DirectionPair::new(Direction::Originated, Direction::Responded),
        DirectionPair::new(Direction::Responded, Direction::Responded),
        DirectionPair::new(Direction::Responded, Direction::Originated),
    ];

    pub const fn new(endpoint: Direction, edge: Direction) -> Self {
        Self { endpoint, edge }
    }

    /// Column prefix, e.g. `orig_resp`
    pub fn prefix(&self) -> String {
        format!("{}_{}", self.endpoint.short(), self.edge.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_prefixes_are_distinct() {
        let prefixes: std::collections::HashSet<String> =
            DirectionPair::ALL.iter().map(|p| p.prefix()).collect();
        assert_eq!(prefixes.len(), 4);
        assert!(prefixes.contains("resp_orig"));
    }

    #[test]
    fn reverse_edges() {
        assert_eq!(Direction::Originated.reverse(), Direction::Responded);
        assert_eq!(Direction::Responded.reverse_edge(), "~host.responded");
    }
}
