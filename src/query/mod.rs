//! DQL query construction.
//!
//! Queries are built as a selection tree ([`GraphQuery`]) and rendered by a
//! single serializer; only discretizer bounds and escaped categorical values
//! are inlined, everything else is bound through variables.
//!
//! - [`filter`] — `@filter` expressions and similarity bands
//! - [`discretize`] — similarity bucketing of connection attributes
//! - [`builder`] — one constructor per feature category

pub mod builder;
pub mod discretize;
pub mod filter;
mod window;

pub use filter::{Band, Filter, Literal, Num};
pub use window::TimeWindow;

use crate::graph::Variables;
use std::fmt::{self, Write};

/// A rendered query ready for [`GraphClient::query`](crate::graph::GraphClient::query).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Operation name, also the response key of single-block queries
    pub name: &'static str,
    pub text: String,
    pub variables: Variables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    String,
    Int,
}

impl VarType {
    fn as_str(self) -> &'static str {
        match self {
            VarType::String => "string",
            VarType::Int => "int",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootFunc {
    Type(&'static str),
    Eq(&'static str, Literal),
    Uid(Literal),
}

impl fmt::Display for RootFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootFunc::Type(t) => write!(f, "type({})", t),
            RootFunc::Eq(pred, v) => write!(f, "eq({}, {})", pred, v),
            RootFunc::Uid(v) => write!(f, "uid({})", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Filter(Filter),
    GroupBy(&'static str),
    Cascade,
    Normalize,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Filter(expr) => write!(f, "@filter({})", expr),
            Directive::GroupBy(pred) => write!(f, "@groupby({})", pred),
            Directive::Cascade => f.write_str("@cascade"),
            Directive::Normalize => f.write_str("@normalize"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Avg,
    Min,
    Max,
    Sum,
}

impl AggregateFn {
    fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Sum => "sum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field {
        alias: Option<&'static str>,
        predicate: &'static str,
    },
    Edge(Edge),
    /// `var as expr`
    ValueVar {
        var: &'static str,
        expr: &'static str,
    },
    /// `alias: func(val(var))`
    Aggregate {
        alias: String,
        func: AggregateFn,
        var: &'static str,
    },
    CountUid,
    /// `expand(_all_)` / `expand(Type)`
    Expand(&'static str),
}

impl Selection {
    pub fn field(predicate: &'static str) -> Self {
        Selection::Field {
            alias: None,
            predicate,
        }
    }

    pub fn aliased(alias: &'static str, predicate: &'static str) -> Self {
        Selection::Field {
            alias: Some(alias),
            predicate,
        }
    }

    pub fn var(var: &'static str, expr: &'static str) -> Self {
        Selection::ValueVar { var, expr }
    }

    pub fn aggregate(alias: impl Into<String>, func: AggregateFn, var: &'static str) -> Self {
        Selection::Aggregate {
            alias: alias.into(),
            func,
            var,
        }
    }
}

/// Nested edge traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub alias: Option<&'static str>,
    pub predicate: &'static str,
    /// `(offset, first)`
    pub page: Option<(Literal, Literal)>,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
}

impl Edge {
    pub fn new(predicate: &'static str) -> Self {
        Self {
            alias: None,
            predicate,
            page: None,
            directives: Vec::new(),
            selections: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn page(mut self, offset: Literal, first: Literal) -> Self {
        self.page = Some((offset, first));
        self
    }

    pub fn directive(mut self, d: Directive) -> Self {
        self.directives.push(d);
        self
    }

    pub fn select(mut self, selections: impl IntoIterator<Item = Selection>) -> Self {
        self.selections.extend(selections);
        self
    }
}

impl From<Edge> for Selection {
    fn from(e: Edge) -> Self {
        Selection::Edge(e)
    }
}

/// Top-level query block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: &'static str,
    pub func: RootFunc,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub name: &'static str,
    pub params: Vec<(&'static str, VarType)>,
    pub blocks: Vec<Block>,
}

const INDENT: &str = "  ";

impl GraphQuery {
    /// Render DQL text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.params.is_empty() {
            out.push_str("{\n");
        } else {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(name, ty)| format!("${}: {}", name, ty.as_str()))
                .collect();
            let _ = writeln!(out, "query {}({}) {{", self.name, params.join(", "));
        }
        for block in &self.blocks {
            let _ = write!(out, "{}{}(func: {})", INDENT, block.name, block.func);
            write_directives(&mut out, &block.directives);
            out.push_str(" {\n");
            write_selections(&mut out, &block.selections, 2);
            let _ = writeln!(out, "{}}}", INDENT);
        }
        out.push_str("}\n");
        out
    }

    /// Render and attach variable bindings (`name` without the `$`).
    pub fn bind<'a>(&self, values: impl IntoIterator<Item = (&'a str, String)>) -> Request {
        Request {
            name: self.name,
            text: self.render(),
            variables: values
                .into_iter()
                .map(|(k, v)| (format!("${}", k), v))
                .collect(),
        }
    }
}

fn write_directives(out: &mut String, directives: &[Directive]) {
    for d in directives {
        let _ = write!(out, " {}", d);
    }
}

fn write_selections(out: &mut String, selections: &[Selection], depth: usize) {
    let pad = INDENT.repeat(depth);
    for sel in selections {
        match sel {
            Selection::Field { alias, predicate } => match alias {
                Some(a) => {
                    let _ = writeln!(out, "{}{}: {}", pad, a, predicate);
                }
                None => {
                    let _ = writeln!(out, "{}{}", pad, predicate);
                }
            },
            Selection::Edge(edge) => {
                out.push_str(&pad);
                if let Some(a) = edge.alias {
                    let _ = write!(out, "{}: ", a);
                }
                out.push_str(edge.predicate);
                if let Some((offset, first)) = &edge.page {
                    let _ = write!(out, " (offset: {}, first: {})", offset, first);
                }
                write_directives(out, &edge.directives);
                if edge.selections.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(" {\n");
                    write_selections(out, &edge.selections, depth + 1);
                    let _ = writeln!(out, "{}}}", pad);
                }
            }
            Selection::ValueVar { var, expr } => {
                let _ = writeln!(out, "{}{} as {}", pad, var, expr);
            }
            Selection::Aggregate { alias, func, var } => {
                let _ = writeln!(out, "{}{}: {}(val({}))", pad, alias, func.as_str(), var);
            }
            Selection::CountUid => {
                let _ = writeln!(out, "{}count(uid)", pad);
            }
            Selection::Expand(what) => {
                let _ = writeln!(out, "{}expand({})", pad, what);
            }
        }
    }
}
