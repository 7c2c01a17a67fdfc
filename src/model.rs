use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Current on-disk snapshot layout. Bumped whenever [`Snapshot`] changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Opaque, high-entropy identifier for one client's stored state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh session identifier from the OS random source.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an untrusted identifier received back from a client.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    /// Returns the raw UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Lifecycle position of a session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unborn,
    Active,
    Expired,
    Cleared,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Expired | SessionState::Cleared)
    }
}

/// A single table value.
///
/// Persisted snapshots never contain [`Cell::Null`]: the write path replaces it
/// with an empty [`Cell::Text`], so "was null" and "was empty" are
/// indistinguishable after a save.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Number => f.write_str("number"),
            ColumnKind::Text => f.write_str("text"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            cells,
        }
    }

    /// Builds a text column from string slices.
    pub fn text<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let cells = values.iter().map(|v| Cell::text(v.as_ref())).collect();
        Self::new(name, ColumnKind::Text, cells)
    }

    /// Builds a numeric column.
    pub fn numbers(name: impl Into<String>, values: &[f64]) -> Self {
        let cells = values.iter().copied().map(Cell::Number).collect();
        Self::new(name, ColumnKind::Number, cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Deserialize)]
struct TableRepr {
    columns: Vec<Column>,
}

/// Ordered, rectangular collection of named columns.
///
/// Duplicate column names are kept as distinct columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr")]
pub struct Table {
    columns: Vec<Column>,
}

impl TryFrom<TableRepr> for Table {
    type Error = ParseError;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        Table::new(repr.columns)
    }
}

impl Table {
    /// Creates a table, rejecting columns of unequal length.
    pub fn new(columns: Vec<Column>) -> Result<Self, ParseError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(ParseError::RaggedColumns {
                    column: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Borrows the cells of one row in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.row_count()).map(move |i| self.columns.iter().map(|c| &c.cells[i]).collect())
    }

    /// Replaces every null cell with the empty-string sentinel.
    pub fn fill_nulls(&mut self) {
        for cell in self.columns.iter_mut().flat_map(|c| c.cells.iter_mut()) {
            if cell.is_null() {
                *cell = Cell::Text(String::new());
            }
        }
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            rows: self.row_count(),
            columns: self.column_count(),
            column_names: self.columns.iter().map(|c| c.name.clone()).collect(),
            column_kinds: self.columns.iter().map(|c| c.kind).collect(),
        }
    }
}

/// The two tables a session analyses. Relating them is left to the reader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetPair {
    pub ads: Table,
    pub sales: Table,
}

impl DatasetPair {
    pub fn new(ads: Table, sales: Table) -> Self {
        Self { ads, sales }
    }

    pub fn fill_nulls(&mut self) {
        self.ads.fill_nulls();
        self.sales.fill_nulls();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub column_kinds: Vec<ColumnKind>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub ads: TableSummary,
    pub sales: TableSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

/// Durable form of a session's dataset pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub session: SessionId,
    pub meta: SnapshotMeta,
    pub pair: DatasetPair,
}

impl Snapshot {
    /// Captures `pair` with freshly derived metadata.
    pub fn new(session: SessionId, pair: DatasetPair) -> Self {
        let meta = SnapshotMeta {
            ads: pair.ads.summary(),
            sales: pair.sales.summary(),
            uploaded_at: OffsetDateTime::now_utc(),
        };
        Self {
            version: SNAPSHOT_VERSION,
            session,
            meta,
            pair,
        }
    }

    /// Recomputes table summaries after the pair was modified.
    pub fn refresh_meta(&mut self) {
        self.meta.ads = self.pair.ads.summary();
        self.meta.sales = self.pair.sales.summary();
    }
}
