//! Filter expressions for `@filter(...)` and their DQL rendering.

use std::fmt;
use std::ops::Bound;

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Query variable, rendered as `$name`
    Var(&'static str),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Var(name) => write!(f, "${}", name),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        op: CompareOp,
        predicate: &'static str,
        value: Literal,
    },
    Between {
        predicate: &'static str,
        start: Literal,
        end: Literal,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(predicate: &'static str, value: Literal) -> Self {
        Filter::Compare {
            op: CompareOp::Eq,
            predicate,
            value,
        }
    }

    pub fn compare(op: CompareOp, predicate: &'static str, value: Literal) -> Self {
        Filter::Compare {
            op,
            predicate,
            value,
        }
    }

    pub fn between(predicate: &'static str, start: Literal, end: Literal) -> Self {
        Filter::Between {
            predicate,
            start,
            end,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Filter::And(v) | Filter::Or(v) if v.len() > 1)
    }

    fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Filter], sep: &str, wrap: fn(&Filter) -> bool) -> fmt::Result {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            if wrap(part) {
                write!(f, "({})", part)?;
            } else {
                write!(f, "{}", part)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare {
                op,
                predicate,
                value,
            } => write!(f, "{}({}, {})", op.as_str(), predicate, value),
            Filter::Between {
                predicate,
                start,
                end,
            } => write!(f, "between({}, {}, {})", predicate, start, end),
            // AND is associative: only nested ORs need parentheses
            Filter::And(parts) => Self::write_joined(f, parts, " AND ", |p| {
                matches!(p, Filter::Or(_)) && p.is_compound()
            }),
            Filter::Or(parts) => Self::write_joined(f, parts, " OR ", |p| {
                matches!(p, Filter::And(_)) && p.is_compound()
            }),
        }
    }
}

/// Numeric bound value of a [`Band`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

impl From<Num> for Literal {
    fn from(n: Num) -> Self {
        match n {
            Num::Int(v) => Literal::Int(v),
            Num::Float(v) => Literal::Float(v),
        }
    }
}

/// Interval of "similar" values around a reference value.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub low: Bound<Num>,
    pub high: Bound<Num>,
}

impl Band {
    pub fn exactly(v: Num) -> Self {
        Self {
            low: Bound::Included(v),
            high: Bound::Included(v),
        }
    }

    pub fn inclusive(low: Num, high: Num) -> Self {
        Self {
            low: Bound::Included(low),
            high: Bound::Included(high),
        }
    }

    pub fn at_least(low: Num) -> Self {
        Self {
            low: Bound::Included(low),
            high: Bound::Unbounded,
        }
    }

    pub fn at_most(high: Num) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Included(high),
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = match self.low {
            Bound::Included(l) => x >= l.as_f64(),
            Bound::Excluded(l) => x > l.as_f64(),
            Bound::Unbounded => true,
        };
        let below = match self.high {
            Bound::Included(h) => x <= h.as_f64(),
            Bound::Excluded(h) => x < h.as_f64(),
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Range predicate over `predicate`; a single-point band becomes `eq`.
    pub fn to_filter(&self, predicate: &'static str) -> Filter {
        if let (Bound::Included(l), Bound::Included(h)) = (self.low, self.high) {
            if l == h {
                return Filter::eq(predicate, l.into());
            }
        }
        let mut parts = Vec::with_capacity(2);
        match self.low {
            Bound::Included(l) => parts.push(Filter::compare(CompareOp::Ge, predicate, l.into())),
            Bound::Excluded(l) => parts.push(Filter::compare(CompareOp::Gt, predicate, l.into())),
            Bound::Unbounded => {}
        }
        match self.high {
            Bound::Included(h) => parts.push(Filter::compare(CompareOp::Le, predicate, h.into())),
            Bound::Excluded(h) => parts.push(Filter::compare(CompareOp::Lt, predicate, h.into())),
            Bound::Unbounded => {}
        }
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Filter::And(parts)
        }
    }
}
