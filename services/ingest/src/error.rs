//! Error taxonomy for one ingestion run.
//!
//! `ReadError` and `LoadError` end the run. `RowWarning` never does: it is
//! collected next to the records that did make it through.

use std::fmt;
use thiserror::Error;

/// The file could not be turned into rows.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is empty")]
    Empty,

    #[error("file has no header row")]
    MissingHeader,

    #[error("unsupported file type '{file_name}' (expected .csv, .txt, .xlsx, .xlsm, .xlsb, .xls or .ods)")]
    UnsupportedFormat { file_name: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("expected at least 5 columns (identity fields first), found {found}")]
    TooFewColumns { found: usize },

    #[error("monthly column '{column}' found at position {position}, inside the identity columns")]
    MonthlyColumnInIdentityRange { column: String, position: usize },
}

/// Why a single row was left out of the result.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The delimited-text parser rejected the record.
    Malformed(String),
    /// Every cell was blank.
    EmptyRow,
    /// Non-blank cells past the last header column.
    ExtraCells { expected: usize, found: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed(msg) => write!(f, "malformed record: {}", msg),
            SkipReason::EmptyRow => write!(f, "empty row"),
            SkipReason::ExtraCells { expected, found } => write!(
                f,
                "expected at most {} cells, found {} (unquoted delimiter?)",
                expected, found
            ),
        }
    }
}

/// A skipped row. `line` is 1-based and counts the header as line 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWarning {
    pub line: usize,
    pub reason: SkipReason,
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// A store call failed. Rows already deleted or inserted stay that way.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to delete rows from '{table}': {source}")]
    Delete {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to insert chunk {chunk} into '{table}': {source}")]
    Insert {
        table: String,
        chunk: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to query '{table}': {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

impl LoadError {
    pub fn table(&self) -> &str {
        match self {
            LoadError::Delete { table, .. }
            | LoadError::Insert { table, .. }
            | LoadError::Query { table, .. } => table,
        }
    }

    /// 1-based chunk index for insert failures.
    pub fn chunk(&self) -> Option<usize> {
        match self {
            LoadError::Insert { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}
