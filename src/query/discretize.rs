//! Similarity buckets: map a connection attribute to the band of values that
//! count as "similar" in the neighbourhood similarity query.
//!
//! The reference value is always inside its own band.

use super::filter::{Band, Filter, Literal, Num};
use crate::graph::ConnectionRecord;
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// Duration bands in selection order; a duration takes the first band that
/// contains it. Bands overlap at their edges so neighbours of a boundary
/// value still match.
const DURATION_BANDS: [(f64, f64); 9] = [
    (0.000001, 0.001),
    (0.001, 0.05),
    (0.05, 1.5),
    (1.5, 10.0),
    (10.0, 20.0),
    (20.0, 40.0),
    (40.0, 60.0),
    (60.0, 90.0),
    (75.0, 110.0),
];

pub fn duration_band(duration: f64) -> Band {
    if duration <= 0.000001 {
        return Band::at_most(Num::Float(0.000001));
    }
    DURATION_BANDS
        .iter()
        .find(|(low, high)| duration >= *low && duration <= *high)
        .map(|&(low, high)| Band::inclusive(Num::Float(low), Num::Float(high)))
        .unwrap_or_else(|| Band::at_least(Num::Float(100.0)))
}

pub fn packets_band(pkts: i64) -> Band {
    if pkts <= 1 {
        Band::exactly(Num::Int(pkts))
    } else if pkts <= 5 {
        Band {
            low: Bound::Excluded(Num::Int(1)),
            high: Bound::Included(Num::Int(10)),
        }
    } else if pkts <= 30 {
        Band::inclusive(Num::Int(pkts - 5), Num::Int(pkts + 5))
    } else {
        Band::at_least(Num::Int(30))
    }
}

pub fn bytes_band(bytes: i64) -> Band {
    if bytes == 0 {
        Band::exactly(Num::Int(0))
    } else if bytes <= 50 {
        Band {
            low: Bound::Excluded(Num::Int(0)),
            high: Bound::Included(Num::Int(100)),
        }
    } else if bytes <= 1450 {
        Band::inclusive(Num::Int(bytes - 50), Num::Int(bytes + 50))
    } else if bytes <= 35000 {
        Band::inclusive(Num::Int(bytes - 500), Num::Int(bytes + 500))
    } else {
        Band::at_least(Num::Int(bytes - 1000))
    }
}

pub fn ip_bytes_band(bytes: i64) -> Band {
    Band::inclusive(Num::Int(bytes - 50), Num::Int(bytes + 50))
}

/// Zeek connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    S0,
    S1,
    SF,
    REJ,
    S2,
    S3,
    RSTO,
    RSTR,
    RSTOS0,
    RSTRH,
    SH,
    SHR,
    OTH,
}

impl ConnState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnState::S0 => "S0",
            ConnState::S1 => "S1",
            ConnState::SF => "SF",
            ConnState::REJ => "REJ",
            ConnState::S2 => "S2",
            ConnState::S3 => "S3",
            ConnState::RSTO => "RSTO",
            ConnState::RSTR => "RSTR",
            ConnState::RSTOS0 => "RSTOS0",
            ConnState::RSTRH => "RSTRH",
            ConnState::SH => "SH",
            ConnState::SHR => "SHR",
            ConnState::OTH => "OTH",
        }
    }

    /// States considered equivalent for similarity. Resets and half-open
    /// connections collapse; every other state stands alone.
    pub fn similarity_group(self) -> &'static [ConnState] {
        use ConnState::*;
        match self {
            RSTO | RSTR | RSTOS0 | RSTRH => &[RSTO, RSTR, RSTOS0, RSTRH],
            SH | SHR => &[SH, SHR],
            S0 => &[S0],
            S1 => &[S1],
            SF => &[SF],
            REJ => &[REJ],
            S2 => &[S2],
            S3 => &[S3],
            OTH => &[OTH],
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConnState(pub String);

impl FromStr for ConnState {
    type Err = UnknownConnState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ConnState::*;
        Ok(match s {
            "S0" => S0,
            "S1" => S1,
            "SF" => SF,
            "REJ" => REJ,
            "S2" => S2,
            "S3" => S3,
            "RSTO" => RSTO,
            "RSTR" => RSTR,
            "RSTOS0" => RSTOS0,
            "RSTRH" => RSTRH,
            "SH" => SH,
            "SHR" => SHR,
            "OTH" => OTH,
            other => return Err(UnknownConnState(other.to_string())),
        })
    }
}

pub fn conn_state_filter(state: &str) -> Filter {
    const PREDICATE: &str = "connection.conn_state";
    match state.parse::<ConnState>() {
        Ok(s) => {
            let group = s.similarity_group();
            if group.len() == 1 {
                Filter::eq(PREDICATE, Literal::Str(s.as_str().to_string()))
            } else {
                Filter::Or(
                    group
                        .iter()
                        .map(|g| Filter::eq(PREDICATE, Literal::Str(g.as_str().to_string())))
                        .collect(),
                )
            }
        }
        // unknown states still match themselves
        Err(UnknownConnState(raw)) => Filter::eq(PREDICATE, Literal::Str(raw)),
    }
}

/// Predicates (to be ANDed) describing connections similar to `reference`.
pub fn similarity_predicates(reference: &ConnectionRecord) -> Vec<Filter> {
    let mut out = Vec::with_capacity(10);
    out.push(Filter::eq(
        "connection.proto",
        Literal::Str(reference.proto.clone()),
    ));
    if let Some(service) = &reference.service {
        out.push(Filter::eq("connection.service", Literal::Str(service.clone())));
    }
    out.push(conn_state_filter(&reference.conn_state));
    out.push(duration_band(reference.duration).to_filter("connection.duration"));
    out.push(packets_band(reference.orig_pkts).to_filter("connection.orig_pkts"));
    out.push(packets_band(reference.resp_pkts).to_filter("connection.resp_pkts"));
    out.push(bytes_band(reference.orig_bytes).to_filter("connection.orig_bytes"));
    out.push(bytes_band(reference.resp_bytes).to_filter("connection.resp_bytes"));
    out.push(ip_bytes_band(reference.orig_ip_bytes).to_filter("connection.orig_ip_bytes"));
    out.push(ip_bytes_band(reference.resp_ip_bytes).to_filter("connection.resp_ip_bytes"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_tiers() {
        assert_eq!(
            duration_band(0.0).to_filter("connection.duration").to_string(),
            "le(connection.duration, 0.000001)"
        );
        assert_eq!(
            duration_band(0.02),
            Band::inclusive(Num::Float(0.001), Num::Float(0.05))
        );
        assert_eq!(
            duration_band(0.02).to_filter("connection.duration").to_string(),
            "ge(connection.duration, 0.001) AND le(connection.duration, 0.05)"
        );
        assert_eq!(
            duration_band(100.0),
            Band::inclusive(Num::Float(75.0), Num::Float(110.0))
        );
        assert_eq!(duration_band(150.0), Band::at_least(Num::Float(100.0)));
    }

    #[test]
    fn every_reference_value_is_in_its_own_band() {
        for d in [0.0, 0.0000005, 0.00005, 0.004, 0.02, 0.3, 0.7, 6.0, 16.0, 35.0, 55.0, 80.0, 105.0, 500.0] {
            assert!(duration_band(d).contains(d), "duration {}", d);
        }
        for p in [0, 1, 2, 5, 6, 30, 31, 10_000] {
            assert!(packets_band(p).contains(p as f64), "pkts {}", p);
        }
        for b in [0, 1, 50, 51, 1450, 1451, 35000, 35001, 1_000_000] {
            assert!(bytes_band(b).contains(b as f64), "bytes {}", b);
            assert!(ip_bytes_band(b).contains(b as f64));
        }
    }

    #[test]
    fn crossing_a_tier_boundary_changes_the_band() {
        assert_ne!(duration_band(0.001), duration_band(0.0011));
        assert_ne!(duration_band(10.0), duration_band(10.01));
        assert_ne!(duration_band(110.0), duration_band(110.5));
        assert_ne!(packets_band(1), packets_band(2));
        assert_ne!(packets_band(5), packets_band(6));
        assert_ne!(bytes_band(50), bytes_band(51));
        assert_ne!(bytes_band(35000), bytes_band(35001));
    }

    #[test]
    fn higher_tier_band_is_not_inside_lower_tier_band() {
        let pairs = [(0.00005, 0.005), (0.005, 0.3), (0.3, 3.0), (3.0, 60.0), (60.0, 200.0)];
        for (lo, hi) in pairs {
            let upper = duration_band(hi);
            let lower = duration_band(lo);
            assert!(upper.contains(hi) && !lower.contains(hi));
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = packets_band(17).to_filter("connection.orig_pkts").to_string();
        let b = packets_band(17).to_filter("connection.orig_pkts").to_string();
        assert_eq!(a, b);
        assert_eq!(a, "ge(connection.orig_pkts, 12) AND le(connection.orig_pkts, 22)");
    }

    #[test]
    fn packet_and_byte_tiers() {
        assert_eq!(
            packets_band(3),
            Band {
                low: Bound::Excluded(Num::Int(1)),
                high: Bound::Included(Num::Int(10)),
            }
        );
        assert_eq!(
            bytes_band(0).to_filter("connection.orig_bytes").to_string(),
            "eq(connection.orig_bytes, 0)"
        );
        assert_eq!(
            bytes_band(40).to_filter("connection.orig_bytes").to_string(),
            "gt(connection.orig_bytes, 0) AND le(connection.orig_bytes, 100)"
        );
        assert_eq!(bytes_band(150), Band::inclusive(Num::Int(100), Num::Int(200)));
        assert_eq!(bytes_band(2000), Band::inclusive(Num::Int(1500), Num::Int(2500)));
        assert_eq!(bytes_band(40000), Band::at_least(Num::Int(39000)));
    }

    #[test]
    fn reset_states_share_one_predicate() {
        let expected = conn_state_filter("RSTO").to_string();
        assert_eq!(
            expected,
            "eq(connection.conn_state, \"RSTO\") OR eq(connection.conn_state, \"RSTR\") OR \
             eq(connection.conn_state, \"RSTOS0\") OR eq(connection.conn_state, \"RSTRH\")"
        );
        for s in ["RSTR", "RSTOS0", "RSTRH"] {
            assert_eq!(conn_state_filter(s).to_string(), expected);
        }
    }

    #[test]
    fn half_open_states_share_one_predicate() {
        assert_eq!(conn_state_filter("SH"), conn_state_filter("SHR"));
        assert_eq!(
            conn_state_filter("SH").to_string(),
            "eq(connection.conn_state, \"SH\") OR eq(connection.conn_state, \"SHR\")"
        );
    }

    #[test]
    fn other_states_are_singletons() {
        for s in ["S0", "S1", "SF", "REJ", "S2", "S3", "OTH", "XYZ"] {
            assert_eq!(
                conn_state_filter(s).to_string(),
                format!("eq(connection.conn_state, \"{}\")", s)
            );
        }
    }

    #[test]
    fn missing_service_adds_no_predicate() {
        let mut conn = ConnectionRecord {
            proto: "tcp".into(),
            conn_state: "SF".into(),
            ..Default::default()
        };
        assert_eq!(similarity_predicates(&conn).len(), 9);
        conn.service = Some("http".into());
        let preds = similarity_predicates(&conn);
        assert_eq!(preds.len(), 10);
        assert_eq!(preds[1].to_string(), "eq(connection.service, \"http\")");
    }
}
