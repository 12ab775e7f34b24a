//! Seeded categorical count tables and port buckets.

/// Protocols with a dedicated count column.
pub const PROTOCOLS: [&str; 3] = ["tcp", "udp", "icmp"];

/// Services seeded in the service table; `NaN` stands for "no service".
pub const SERVICES: [&str; 14] = [
    "NaN", "ssl", "dns", "ntp", "http", "ssh", "dhcp", "krb_tcp", "dce_rpc", "smtp", "imap",
    "ssl,imap", "socks", "pop3",
];

/// Connection states in seed (and mode tie-break) order.
pub const CONN_STATES: [&str; 13] = [
    "S0", "SF", "RSTO", "RSTR", "OTH", "S1", "S3", "SHR", "S2", "RSTRH", "REJ", "SH", "RSTOS0",
];

/// Insertion-ordered value counts, pre-seeded with known values at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    entries: Vec<(String, u64)>,
    seeded: usize,
}

impl CountTable {
    pub fn seeded(values: &[&str]) -> Self {
        Self {
            entries: values.iter().map(|v| (v.to_string(), 0)).collect(),
            seeded: values.len(),
        }
    }

    /// Overwrite the count of `value`; unseeded values are appended.
    pub fn set(&mut self, value: &str, count: u64) {
        match self.entries.iter_mut().find(|(k, _)| k == value) {
            Some(entry) => entry.1 = count,
            None => self.entries.push((value.to_string(), count)),
        }
    }

    pub fn get(&self, value: &str) -> u64 {
        self.entries
            .iter()
            .find(|(k, _)| k == value)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Seeded values only; these are the ones with output columns.
    pub fn seeded_entries(&self) -> &[(String, u64)] {
        &self.entries[..self.seeded]
    }

    /// Most frequent value; ties (including an all-zero table) go to the
    /// earliest entry. `None` only for a table with no entries.
    pub fn mode(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.entries {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(k, _)| k.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrigPortBucket {
    WellKnown,
    RegisteredOrDynamic,
}

impl OrigPortBucket {
    pub const ALL: [OrigPortBucket; 2] = [OrigPortBucket::WellKnown, OrigPortBucket::RegisteredOrDynamic];

    pub fn classify(port: i64) -> Self {
        if port < 1024 {
            OrigPortBucket::WellKnown
        } else {
            OrigPortBucket::RegisteredOrDynamic
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            OrigPortBucket::WellKnown => "orig_p_well_known_count",
            OrigPortBucket::RegisteredOrDynamic => "orig_p_reg_or_dyn_count",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Responder port buckets: common service ports first, then IANA ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespPortBucket {
    Ftp,
    Ssh,
    Dns,
    Http,
    Ntp,
    Https,
    Rdp,
    WellKnown,
    Registered,
    Dynamic,
}

impl RespPortBucket {
    pub const ALL: [RespPortBucket; 10] = [
        RespPortBucket::Ftp,
        RespPortBucket::Ssh,
        RespPortBucket::Dns,
        RespPortBucket::Http,
        RespPortBucket::Ntp,
        RespPortBucket::Https,
        RespPortBucket::Rdp,
        RespPortBucket::WellKnown,
        RespPortBucket::Registered,
        RespPortBucket::Dynamic,
    ];

    pub fn classify(port: i64) -> Self {
        match port {
            21 => RespPortBucket::Ftp,
            22 => RespPortBucket::Ssh,
            53 => RespPortBucket::Dns,
            80 => RespPortBucket::Http,
            123 => RespPortBucket::Ntp,
            443 => RespPortBucket::Https,
            3389 => RespPortBucket::Rdp,
            p if p < 1024 => RespPortBucket::WellKnown,
            p if p < 49152 => RespPortBucket::Registered,
            _ => RespPortBucket::Dynamic,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            RespPortBucket::Ftp => "resp_21_count",
            RespPortBucket::Ssh => "resp_22_count",
            RespPortBucket::Dns => "resp_53_count",
            RespPortBucket::Http => "resp_80_count",
            RespPortBucket::Ntp => "resp_123_count",
            RespPortBucket::Https => "resp_443_count",
            RespPortBucket::Rdp => "resp_3389_count",
            RespPortBucket::WellKnown => "resp_p_well_known_count",
            RespPortBucket::Registered => "resp_p_reg_count",
            RespPortBucket::Dynamic => "resp_p_dyn_count",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}
