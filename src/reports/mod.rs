//! Document writers for tabular reports.
//!
//! Services project their data into a [`ReportTable`]; the writers here turn
//! it into PDF, XLSX, CSV or JSON bytes. Reports are streamed back to the
//! caller and never stored.

pub mod delimited;
pub mod json;
pub mod pdf;
pub mod xlsx;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Placeholder printed by the PDF writer for an empty table
pub const NO_RECORDS: &str = "No records";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Xlsx,
    Csv,
    #[default]
    Json,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// One value of a report row
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Money(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt_text(value: Option<impl Into<String>>) -> Self {
        value.map(|v| Cell::Text(v.into())).unwrap_or(Cell::Empty)
    }

    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map(Cell::Date).unwrap_or(Cell::Empty)
    }

    pub fn opt_datetime(value: Option<DateTime<Utc>>) -> Self {
        value.map(Cell::DateTime).unwrap_or(Cell::Empty)
    }

    pub fn opt_money(value: Option<Decimal>) -> Self {
        value.map(Cell::Money).unwrap_or(Cell::Empty)
    }

    /// Text form used by the PDF and CSV writers
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Integer(n) => n.to_string(),
            Cell::Money(d) => format!("{:.2}", round_money(*d)),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// Two decimals, halves rounded away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Title, column headers and rows of a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub title: String,
    /// Filter description and generation time
    pub subtitle: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bytes of a generated document
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
    pub rows: usize,
}

/// Writes `table` in `format`. `name` is the file stem of the download.
pub fn render(table: &ReportTable, format: ReportFormat, name: &str) -> Result<RenderedReport, ServiceError> {
    let bytes = match format {
        ReportFormat::Pdf => pdf::render_table(table)?,
        ReportFormat::Xlsx => xlsx::render_table(table)?,
        ReportFormat::Csv => delimited::render_table(table)?,
        ReportFormat::Json => json::render_table(table)?,
    };

    Ok(RenderedReport {
        bytes,
        content_type: format.content_type(),
        file_name: format!("{name}.{}", format.extension()),
        rows: table.rows.len(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_table() -> ReportTable {
        let mut table = ReportTable::new("Products", &["Serial", "Price", "Purchase date"])
            .with_subtitle("All categories");
        table.push(vec![
            Cell::text("LAP0001"),
            Cell::Money(dec!(899.9)),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
        ]);
        table.push(vec![Cell::text("MON0002"), Cell::Empty, Cell::Empty]);
        table
    }

    #[test]
    fn cells_display_in_report_notation() {
        assert_eq!(Cell::Money(dec!(5)).display(), "5.00");
        assert_eq!(Cell::Money(dec!(12.345)).display(), "12.35");
        assert_eq!(Cell::Money(dec!(0.125)).display(), "0.13");
        assert_eq!(Cell::Money(dec!(-2.675)).display(), "-2.68");
        assert_eq!(Cell::opt_text(None::<String>).display(), "");
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).display(),
            "2024-03-09"
        );
    }

    #[test]
    fn every_format_renders_an_empty_table() {
        let table = ReportTable::new("Empty", &["A", "B"]);
        for format in [
            ReportFormat::Pdf,
            ReportFormat::Xlsx,
            ReportFormat::Csv,
            ReportFormat::Json,
        ] {
            let report = render(&table, format, "empty").unwrap();
            assert_eq!(report.rows, 0);
            assert!(!report.bytes.is_empty(), "{format}");
            assert_eq!(report.file_name, format!("empty.{}", format.extension()));
        }
    }

    #[test]
    fn formats_parse_from_query_values() {
        let format: ReportFormat = serde_json::from_value("xlsx".into()).unwrap();
        assert_eq!(format, ReportFormat::Xlsx);
        assert_eq!(ReportFormat::default(), ReportFormat::Json);
    }
}
