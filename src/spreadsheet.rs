//! Row-per-chunk conversion of the first worksheet of an Excel workbook.
//!
//! The first row is the header. Every following row becomes one chunk whose text joins
//! `"{column}: {value}"` pairs for the non-empty cells; rows without any value are counted but
//! produce no chunk. Row numbers follow the spreadsheet UI, so the first data row is row 2.

use calamine::{DataType, Reader, open_workbook_auto};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Extensions accepted by the spreadsheet endpoint.
pub const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Errors raised while reading a workbook.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// The file is not a readable workbook.
    #[error("failed to open workbook: {0}")]
    Open(String),
    /// The workbook contains no worksheet.
    #[error("workbook contains no worksheets")]
    NoWorksheet,
    /// The first worksheet could not be decoded.
    #[error("failed to read worksheet '{sheet}': {message}")]
    Worksheet {
        /// Worksheet name.
        sheet: String,
        /// Reader diagnostic.
        message: String,
    },
}

/// Whether a lowercase extension names an Excel workbook.
pub fn is_spreadsheet_extension(extension: &str) -> bool {
    SPREADSHEET_EXTENSIONS.contains(&extension)
}

/// Header and data rows of one worksheet. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    /// Worksheet name.
    pub sheet: String,
    /// Column names taken from the header row.
    pub columns: Vec<String>,
    /// Data rows in sheet order.
    pub rows: Vec<Vec<Option<String>>>,
}

/// One spreadsheet row rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadsheetChunk {
    /// `{filename}_row_{row}`.
    pub chunk_id: String,
    /// `column: value` pairs joined with `", "`.
    pub text: String,
    /// Row metadata.
    pub metadata: SpreadsheetChunkMetadata,
}

/// Metadata attached to a [`SpreadsheetChunk`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadsheetChunkMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Spreadsheet row number (data index + 2).
    pub row: usize,
    /// Worksheet name.
    pub sheet: String,
}

/// Read the first worksheet of the workbook at `path`.
///
/// Blocking; call from the blocking pool.
pub fn read_first_sheet(path: &Path) -> Result<SheetTable, SpreadsheetError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|error| SpreadsheetError::Open(error.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SpreadsheetError::NoWorksheet)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)?
        .map_err(|error| SpreadsheetError::Worksheet {
            sheet: sheet.clone(),
            message: error.to_string(),
        })?;

    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .enumerate()
                .map(|(index, cell)| {
                    cell_text(cell).unwrap_or_else(|| format!("Unnamed: {index}"))
                })
                .collect()
        })
        .unwrap_or_default();
    let rows: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Ok(SheetTable {
        sheet,
        columns,
        rows,
    })
}

/// Render each data row as a chunk, skipping rows without values.
pub fn chunk_rows(filename: &str, table: &SheetTable) -> Vec<SpreadsheetChunk> {
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let text = table
                .columns
                .iter()
                .zip(row)
                .filter_map(|(column, value)| {
                    value.as_deref().map(|value| format!("{column}: {value}"))
                })
                .collect::<Vec<_>>()
                .join(", ");
            if text.is_empty() {
                return None;
            }
            let row = index + 2;
            Some(SpreadsheetChunk {
                chunk_id: format!("{filename}_row_{row}"),
                text,
                metadata: SpreadsheetChunkMetadata {
                    filename: filename.to_string(),
                    row,
                    sheet: table.sheet.clone(),
                },
            })
        })
        .collect()
}

fn cell_text(cell: &DataType) -> Option<String> {
    let text = match cell {
        DataType::Empty => return None,
        DataType::DateTime(_) | DataType::DateTimeIso(_) => cell
            .as_datetime()
            .map(|datetime| datetime.to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
