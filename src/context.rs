//! Renders a dataset pair into prompt text for the reasoning service.
//!
//! Everything here is a pure function of its inputs. Rows are rendered as JSON
//! records in column order; duplicate column names appear as repeated keys.

use crate::model::{Cell, DatasetPair, Table};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt::Write as _;

/// Rows per table included by [`build_sample_context`] unless told otherwise.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Rows per table returned in an upload preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 3;

/// Floats with an integral value below this magnitude render without a fraction.
const INTEGRAL_RENDER_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnalysisKind {
    PerformanceSummary,
    #[default]
    General,
}

impl AnalysisKind {
    /// Unknown names select [`AnalysisKind::General`].
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "performance_summary" => AnalysisKind::PerformanceSummary,
            _ => AnalysisKind::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::PerformanceSummary => "performance_summary",
            AnalysisKind::General => "general",
        }
    }
}

struct CellValue<'a>(&'a Cell);

impl Serialize for CellValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Cell::Null => serializer.serialize_unit(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < INTEGRAL_RENDER_LIMIT => {
                serializer.serialize_i64(*n as i64)
            }
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct Record<'a> {
    table: &'a Table,
    row: usize,
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns = self.table.columns();
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for column in columns {
            map.serialize_entry(&column.name, &CellValue(&column.cells[self.row]))?;
        }
        map.end()
    }
}

struct Records<'a> {
    table: &'a Table,
    limit: usize,
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let count = self.limit.min(self.table.row_count());
        let mut seq = serializer.serialize_seq(Some(count))?;
        for row in 0..count {
            seq.serialize_element(&Record {
                table: self.table,
                row,
            })?;
        }
        seq.end()
    }
}

/// JSON array of at most `limit` leading rows of `table`.
pub fn records_json(table: &Table, limit: usize) -> String {
    serde_json::to_string(&Records { table, limit }).unwrap_or_else(|_| "[]".to_string())
}

fn column_list(table: &Table) -> String {
    table.column_names().join(", ")
}

fn sample_section(out: &mut String, index: usize, title: &str, table: &Table, row_limit: usize) {
    let shown = row_limit.min(table.row_count());
    let _ = writeln!(out, "{index}. {title}:");
    let _ = writeln!(
        out,
        "- {} rows, {} columns",
        table.row_count(),
        table.column_count()
    );
    let _ = writeln!(out, "- Columns: {}", column_list(table));
    let _ = writeln!(
        out,
        "- Sample data (first {shown} rows): {}",
        records_json(table, row_limit)
    );
}

/// Schema, counts and up to `row_limit` rows per table, followed by the question verbatim.
pub fn build_sample_context(pair: &DatasetPair, question: &str, row_limit: usize) -> String {
    let mut out = String::new();
    out.push_str(
        "You are a data analyst specializing in advertising and sales performance analysis.\n\n",
    );
    out.push_str("I have two datasets to analyze:\n\n");
    sample_section(&mut out, 1, "Advertising Data", &pair.ads, row_limit);
    out.push('\n');
    sample_section(&mut out, 2, "Sales Data", &pair.sales, row_limit);
    out.push('\n');
    let _ = writeln!(out, "Question: {question}");
    out.push_str(
        "\nPlease provide a thorough analysis based on the question asked. When analyzing:\n\
         1. Look for patterns, correlations, and insights in the data\n\
         2. Provide specific numbers and metrics when possible\n\
         3. Give actionable recommendations\n\
         4. If more specific data points are needed to answer accurately, say which ones\n\
         5. Format the response clearly with key insights highlighted\n",
    );
    out
}

fn full_section(out: &mut String, title: &str, table: &Table) {
    let _ = writeln!(out, "{title}:");
    let _ = writeln!(out, "- Total rows: {}", table.row_count());
    let _ = writeln!(out, "- Columns: {}", column_list(table));
    let _ = writeln!(
        out,
        "- Full dataset: {}",
        records_json(table, table.row_count())
    );
}

/// Renders every row of both tables. Output size grows with the data; callers
/// bound it before sending.
pub fn build_full_context(pair: &DatasetPair, kind: AnalysisKind) -> String {
    let mut out = String::new();
    match kind {
        AnalysisKind::PerformanceSummary => out.push_str(
            "Perform a comprehensive performance analysis of this advertising and sales data.\n\n",
        ),
        AnalysisKind::General => out.push_str("Analyze this advertising and sales data.\n\n"),
    }
    full_section(&mut out, "Advertising Data", &pair.ads);
    out.push('\n');
    full_section(&mut out, "Sales Data", &pair.sales);
    out.push('\n');
    match kind {
        AnalysisKind::PerformanceSummary => out.push_str(
            "Please provide:\n\
             1. Overall performance metrics and KPIs\n\
             2. Top performing campaigns and products\n\
             3. Key insights and patterns\n\
             4. Recommendations for optimization\n\
             5. Any concerning trends or opportunities\n",
        ),
        AnalysisKind::General => {
            out.push_str("Provide a general business intelligence analysis with key insights.\n")
        }
    }
    out
}

/// Shape and leading rows of a table, returned to the client after upload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TablePreview {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub sample: Vec<Vec<Cell>>,
}

pub fn preview(table: &Table, rows: usize) -> TablePreview {
    TablePreview {
        rows: table.row_count(),
        columns: table.column_count(),
        column_names: table.columns().iter().map(|c| c.name.clone()).collect(),
        sample: table
            .rows()
            .take(rows)
            .map(|row| row.into_iter().cloned().collect())
            .collect(),
    }
}
