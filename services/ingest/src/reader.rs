//! Turns an uploaded file into header labels plus positional rows.
//!
//! Every cell comes out as text, whatever the source format, so that number
//! parsing downstream behaves the same for CSV and workbooks.

use crate::error::{ReadError, RowWarning, SkipReason};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::WINDOWS_1252;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// How the file is decoded. Chosen from the file name, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    /// Delimited text in a legacy single-byte codepage.
    Csv,
    /// Spreadsheet workbook; only the first sheet is read.
    Workbook,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, ReadError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            _ => Err(ReadError::UnsupportedFormat {
                file_name: file_name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// One data row. `cells` holds at least one entry per header; cells past the
/// header width are kept so the caller can decide what they mean.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based position in the source, header included.
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn get(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Records the reader itself could not make sense of.
    pub warnings: Vec<RowWarning>,
}

/// Read a file from disk.
pub async fn read_file(
    path: &Path,
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<RawTable, ReadError> {
    let bytes = tokio::fs::read(path).await?;
    info!(path = %path.display(), bytes = bytes.len(), ?format, "read input file");
    read_table(&bytes, format, options)
}

pub fn read_table(
    bytes: &[u8],
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<RawTable, ReadError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ReadError::Empty);
    }

    match format {
        SourceFormat::Csv => read_csv(bytes, options.delimiter),
        SourceFormat::Workbook => read_workbook(bytes),
    }
}

// =============================================================================
// DELIMITED TEXT
// =============================================================================

/// Decode as Windows-1252 (a byte-order mark, if present, wins) and split
/// into records. Quoted fields may contain the delimiter; `""` inside quotes
/// is a literal quote.
pub fn read_csv(bytes: &[u8], delimiter: u8) -> Result<RawTable, ReadError> {
    let (text, encoding, _) = WINDOWS_1252.decode(bytes);
    debug!(encoding = encoding.name(), "decoded delimited text");

    if text.trim().is_empty() {
        return Err(ReadError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::MissingHeader);
    }

    let mut table = RawTable {
        headers,
        ..RawTable::default()
    };

    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(idx + 2);
                let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
                pad_cells(&mut cells, table.headers.len());
                table.rows.push(RawRow { line, cells });
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(idx + 2);
                table.warnings.push(RowWarning {
                    line,
                    reason: SkipReason::Malformed(e.to_string()),
                });
            }
        }
    }

    Ok(table)
}

fn pad_cells(cells: &mut Vec<String>, width: usize) {
    if cells.len() < width {
        cells.resize(width, String::new());
    }
}

// =============================================================================
// WORKBOOK
// =============================================================================

/// Read the first sheet of an xls/xlsx/xlsb/ods workbook held in memory.
pub fn read_workbook(bytes: &[u8]) -> Result<RawTable, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ReadError::Workbook(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReadError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReadError::Workbook(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    if range.is_empty() {
        return Err(ReadError::Empty);
    }

    let (row_count, col_count) = range.get_size();
    info!(sheet = %sheet_name, rows = row_count, columns = col_count, "reading first sheet");

    // Ranges start at the first used cell, not at A1.
    let first_line = range.start().map(|(r, _)| r as usize + 1).unwrap_or(1);

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(ReadError::MissingHeader)?
        .iter()
        .map(|cell| cell_text(cell).trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::MissingHeader);
    }

    let mut table = RawTable {
        headers,
        ..RawTable::default()
    };

    for (idx, row) in rows.enumerate() {
        let mut cells: Vec<String> = row.iter().map(|c| cell_text(c).trim().to_string()).collect();
        pad_cells(&mut cells, table.headers.len());
        table.rows.push(RawRow {
            line: first_line + idx + 1,
            cells,
        });
    }

    Ok(table)
}

/// Textual form of a workbook cell. Numbers are written the way the CSV
/// export writes them: decimal comma, no thousands separator.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => f.to_string().replace('.', ","),
        Data::Bool(b) => b.to_string(),
        Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}
