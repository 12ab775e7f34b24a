//! Per-connection feature rows: flattened app-layer summaries plus the
//! neighbourhood statistic groups.

mod buckets;
mod flatten;
mod neighbourhood;

pub use buckets::{CountTable, OrigPortBucket, RespPortBucket, CONN_STATES, PROTOCOLS, SERVICES};
pub use flatten::{
    flatten_connection, flatten_page, AppSummary, ConnectionRow, DetailEntry, ValueSet, VariantSummary,
};
pub use neighbourhood::{
    CategoryCounts, MeanStats, NeighbourhoodAggregator, NeighbourhoodGroup, PortCounts, SubQuery,
};

use serde_json::Value;

/// One output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    /// Rendered as a JSON array
    List(Vec<Value>),
    Json(Value),
    Empty,
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::List(items) => serde_json::to_string(items).unwrap_or_default(),
            Cell::Json(v) => v.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// Ordered `(column, cell)` pairs of one output line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    cells: Vec<Cell>,
}

impl Row {
    pub fn push(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        self.columns.push(column.into());
        self.cells.push(cell.into());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.cells[i])
    }
}

/// Types that contribute columns to an output row.
pub trait Tabular {
    fn write_row(&self, row: &mut Row);

    fn to_row(&self) -> Row {
        let mut row = Row::default();
        self.write_row(&mut row);
        row
    }
}

/// Full neighbourhood-mode output unit: the flattened connection and its four
/// neighbourhood groups.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub connection: ConnectionRow,
    pub neighbourhood: Vec<NeighbourhoodGroup>,
}

impl Tabular for FeatureRow {
    fn write_row(&self, row: &mut Row) {
        self.connection.write_row(row);
        for group in &self.neighbourhood {
            group.write_row(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_rendering() {
        assert_eq!(Cell::from(3u64).render(), "3");
        assert_eq!(Cell::from(0.5).render(), "0.5");
        assert_eq!(Cell::List(vec!["GET".into()]).render(), r#"["GET"]"#);
        assert_eq!(Cell::from(None::<String>).render(), "");
    }

    #[test]
    fn row_lookup() {
        let mut row = Row::default();
        row.push("a", 1i64);
        row.push("b", "x");
        assert_eq!(row.get("b"), Some(&Cell::Text("x".into())));
        assert_eq!(row.columns(), ["a", "b"]);
    }
}
