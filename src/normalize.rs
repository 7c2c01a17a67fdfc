//! Tabular normalizer: raw upload bytes to a canonical [`Table`].
//!
//! Parsing yields raw cells (text, number or null). Each column then goes
//! through two passes: [`classify`] decides the column kind from all of its
//! cells, and [`coerce`] rewrites the cells to match. A column is numeric only
//! when every non-null cell is numeric; otherwise every cell keeps its text.

use crate::error::ParseError;
use crate::model::{Cell, Column, ColumnKind, Table};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Cell texts read as missing values.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Declared format of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Result<Self, ParseError> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" => Ok(FileFormat::Spreadsheet),
            _ => Err(ParseError::UnsupportedFormat),
        }
    }

    pub fn from_file_name(file_name: &str) -> Result<Self, ParseError> {
        let ext = crate::upload::file_extension(file_name).ok_or(ParseError::UnsupportedFormat)?;
        Self::from_extension(&ext)
    }
}

/// Parses `bytes` as `format` into a canonical table.
///
/// A header row without data rows yields an empty table, not an error.
pub fn normalize(bytes: &[u8], format: FileFormat) -> Result<Table, ParseError> {
    let raw = match format {
        FileFormat::Csv => read_csv(&decode_text(bytes))?,
        FileFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };

    let columns = raw
        .into_iter()
        .map(|(name, mut cells)| {
            null_non_finite(&mut cells);
            let kind = classify(&cells);
            Column::new(name, kind, coerce(cells, kind))
        })
        .collect();
    let table = Table::new(columns)?;
    debug!(
        rows = table.row_count(),
        columns = table.column_count(),
        ?format,
        "upload normalized"
    );
    Ok(table)
}

/// UTF-8 first; anything that is not valid UTF-8 is read as Latin-1, which maps
/// every byte to a character and therefore never drops input.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(err) => {
            debug!(valid_up_to = err.valid_up_to(), "upload is not utf-8, using latin-1");
            encoding_rs::mem::decode_latin1(bytes)
        }
    };
    // Latin-1 output never contains U+FEFF, so only the borrowed case needs stripping.
    match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)),
        owned => owned,
    }
}

type RawColumns = Vec<(String, Vec<Cell>)>;

fn no_columns() -> ParseError {
    ParseError::ParseFailure("no columns to parse from file".into())
}

fn header_name(raw: &str, index: usize) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {index}")
    } else {
        raw.to_string()
    }
}

fn text_cell(raw: &str) -> Cell {
    if MISSING_MARKERS.contains(&raw) {
        Cell::Null
    } else {
        Cell::text(raw)
    }
}

fn read_csv(text: &str) -> Result<RawColumns, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| ParseError::ParseFailure(format!("cannot read header row: {err}")))?
        .clone();
    if headers.is_empty() {
        return Err(no_columns());
    }

    let mut columns: RawColumns = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (header_name(name, i), Vec::new()))
        .collect();

    for (index, record) in reader.records().enumerate() {
        let record = record
            .map_err(|err| ParseError::ParseFailure(format!("row {}: {err}", index + 1)))?;
        if record.len() > columns.len() {
            return Err(ParseError::ParseFailure(format!(
                "row {} has {} fields, expected {}",
                index + 1,
                record.len(),
                columns.len()
            )));
        }
        for (i, (_, cells)) in columns.iter_mut().enumerate() {
            cells.push(record.get(i).map(text_cell).unwrap_or(Cell::Null));
        }
    }
    Ok(columns)
}

fn spreadsheet_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => text_cell(s),
        Data::DateTime(_) => match value.as_datetime() {
            Some(stamp) => Cell::Text(iso_text(stamp)),
            None => Cell::Text(value.to_string()),
        },
        other => Cell::Text(other.to_string()),
    }
}

/// Midnight timestamps render as a bare date.
fn iso_text(stamp: NaiveDateTime) -> String {
    if stamp.time() == NaiveTime::MIN {
        stamp.format("%Y-%m-%d").to_string()
    } else {
        stamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

fn read_spreadsheet(bytes: &[u8]) -> Result<RawColumns, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| ParseError::ParseFailure(format!("cannot open workbook: {err}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::ParseFailure("workbook has no worksheets".into()))?
        .map_err(|err| ParseError::ParseFailure(format!("cannot read worksheet: {err}")))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(no_columns());
    };
    let mut columns: RawColumns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| (header_name(&cell.to_string(), i), Vec::new()))
        .collect();

    for row in rows {
        for (i, (_, cells)) in columns.iter_mut().enumerate() {
            cells.push(row.get(i).map(spreadsheet_cell).unwrap_or(Cell::Null));
        }
    }
    Ok(columns)
}

fn null_non_finite(cells: &mut [Cell]) {
    for cell in cells.iter_mut() {
        if matches!(cell, Cell::Number(n) if !n.is_finite()) {
            *cell = Cell::Null;
        }
    }
}

/// Result of the numeric syntax check on one text cell.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Numeric {
    Finite(f64),
    Infinite,
}

/// Accepts optional surrounding whitespace, an optional sign, digits with an
/// optional decimal point, and an optional exponent. `inf`/`infinity` in any
/// case are numeric but infinite.
fn parse_numeric(raw: &str) -> Option<Numeric> {
    let s = raw.trim();
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
        return Some(Numeric::Infinite);
    }

    let bytes = unsigned.as_bytes();
    let mut pos = 0;
    let mut digits = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
        digits += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        pos += 1;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return None;
        }
    }
    if pos != bytes.len() {
        return None;
    }

    let value: f64 = s.parse().ok()?;
    if value.is_finite() {
        Some(Numeric::Finite(value))
    } else {
        Some(Numeric::Infinite)
    }
}

/// First pass: decides the kind of a column from all of its cells.
///
/// Nulls do not vote; a column with no non-null cells is text.
pub fn classify(cells: &[Cell]) -> ColumnKind {
    let mut seen_value = false;
    for cell in cells {
        match cell {
            Cell::Null => continue,
            Cell::Number(_) => {}
            Cell::Text(s) => {
                if parse_numeric(s).is_none() {
                    return ColumnKind::Text;
                }
            }
        }
        seen_value = true;
    }
    if seen_value {
        ColumnKind::Number
    } else {
        ColumnKind::Text
    }
}

/// Second pass: rewrites cells to match `kind`.
///
/// Numeric columns get parsed numbers (infinite values become null). Text
/// columns keep every text cell verbatim and render stray numbers as text.
pub fn coerce(cells: Vec<Cell>, kind: ColumnKind) -> Vec<Cell> {
    cells
        .into_iter()
        .map(|cell| match (kind, cell) {
            (_, Cell::Null) => Cell::Null,
            (ColumnKind::Number, Cell::Text(s)) => match parse_numeric(&s) {
                Some(Numeric::Finite(n)) => Cell::Number(n),
                Some(Numeric::Infinite) => Cell::Null,
                None => Cell::Text(s),
            },
            (ColumnKind::Number, Cell::Number(n)) => Cell::Number(n),
            (ColumnKind::Text, Cell::Number(n)) => Cell::Text(n.to_string()),
            (ColumnKind::Text, Cell::Text(s)) => Cell::Text(s),
        })
        .collect()
}
