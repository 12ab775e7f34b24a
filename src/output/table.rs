//! CSV rendering of feature rows (RFC 4180 quoting, `\n` line ends).

use crate::features::{Row, Tabular};
use std::io::Write;

/// Writes a header from the first row, then one record per row. Rows are
/// expected to share the first row's columns.
pub struct CsvTableWriter<W: Write> {
    inner: csv::Writer<W>,
    header_written: bool,
    rows: usize,
}

impl<W: Write> CsvTableWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(inner),
            header_written: false,
            rows: 0,
        }
    }

    pub fn write_row(&mut self, row: &Row) -> csv::Result<()> {
        if !self.header_written {
            self.inner.write_record(row.columns())?;
            self.header_written = true;
        }
        self.inner.write_record(row.cells().iter().map(|c| c.render()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_all<'a, T: Tabular + 'a>(&mut self, items: impl IntoIterator<Item = &'a T>) -> csv::Result<()> {
        for item in items {
            self.write_row(&item.to_row())?;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> csv::Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Cell;

    fn render(value: &str) -> String {
        let mut row = Row::default();
        row.push("a", value);
        row.push("b", 1i64);
        let mut w = CsvTableWriter::new(Vec::new());
        w.write_row(&row).unwrap();
        let out = String::from_utf8(w.finish().unwrap()).unwrap();
        let body = out.strip_prefix("a,b\n").unwrap();
        body.strip_suffix(",1\n").unwrap().to_string()
    }

    #[test]
    fn quoting() {
        assert_eq!(render("plain"), "plain");
        assert_eq!(render("ssl,imap"), "\"ssl,imap\"");
        assert_eq!(render(r#"["GET"]"#), r#""[""GET""]""#);
        assert_eq!(render("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn header_once_then_rows() {
        let mut row = Row::default();
        row.push("service", "ssl,imap");
        row.push("http_method", Cell::List(vec!["GET".into()]));
        row.push("count", 2i64);

        let mut w = CsvTableWriter::new(Vec::new());
        w.write_row(&row).unwrap();
        w.write_row(&row).unwrap();
        assert_eq!(w.rows(), 2);
        let out = String::from_utf8(w.finish().unwrap()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "service,http_method,count");
        assert_eq!(lines[1], r#""ssl,imap","[""GET""]",2"#);
    }
}
