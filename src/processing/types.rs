//! Core data types and error definitions for the processing pipeline.

use crate::chunking::{
    ChunkingConfig, ChunkingError, ElementChunk, ImageRecord, RagChunk, TableRecord,
};
use crate::converter::ConversionError;
use crate::spreadsheet::{SpreadsheetChunk, SpreadsheetError};
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Client errors detected before or while interpreting a request.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The multipart body had no `file` field.
    #[error("No file uploaded")]
    MissingFile,
    /// A form field could not be parsed.
    #[error("Invalid value for field '{field}': {value}")]
    InvalidField {
        /// Form field name.
        field: String,
        /// Rejected raw value.
        value: String,
    },
    /// The multipart body could not be decoded.
    #[error("Malformed multipart body: {0}")]
    Multipart(String),
    /// The file extension maps to no supported input format.
    #[error("Unsupported file type '{extension}'")]
    UnsupportedFormat {
        /// Lowercase extension (empty when the name has none).
        extension: String,
    },
    /// The spreadsheet endpoint received a non-Excel file.
    #[error("Only Excel files (.xlsx, .xls) are supported")]
    NotASpreadsheet,
    /// The upload exceeds the configured cap.
    #[error("File too large ({size_mb:.1} MB). Maximum: {max_mb} MB")]
    FileTooLarge {
        /// Upload size in megabytes.
        size_mb: f64,
        /// Configured cap in megabytes.
        max_mb: f64,
    },
    /// The request body exceeded the transport limit before the file was fully read.
    #[error("Request body too large. Maximum: {max_mb} MB")]
    BodyTooLarge {
        /// Configured cap in megabytes.
        max_mb: f64,
    },
    /// RAG chunking parameters are unusable.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

impl ValidationError {
    /// HTTP status for this validation failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::FileTooLarge { .. } | Self::BodyTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The request was rejected before processing.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The converter failed to initialize at startup.
    #[error("Document converter unavailable: {reason}")]
    ConverterUnavailable {
        /// Initialization failure recorded at startup.
        reason: String,
    },
    /// Document conversion failed.
    #[error("Error processing document: {0}")]
    Conversion(#[from] ConversionError),
    /// Spreadsheet parsing failed.
    #[error("Error processing spreadsheet: {0}")]
    Spreadsheet(#[from] SpreadsheetError),
    /// Writing or reading the temporary upload failed.
    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
    /// A blocking task was cancelled or panicked.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(error) => error.status(),
            Self::ConverterUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ChunkingError> for ProcessingError {
    fn from(error: ChunkingError) -> Self {
        Self::Validation(ValidationError::Chunking(error))
    }
}

/// Document-level metadata returned by `/api/process`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Upload size in megabytes, rounded to two decimals.
    pub file_size_mb: f64,
    /// Lowercase extension, or `unknown`.
    pub file_type: String,
    /// Page count reported by the converter.
    pub total_pages: usize,
    /// Number of chunks in the response.
    pub total_chunks: usize,
    /// Number of extracted tables.
    pub total_tables: usize,
    /// Number of extracted images.
    pub total_images: usize,
}

/// Body of a successful `/api/process` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResponse {
    /// Always `true`.
    pub success: bool,
    /// Document metadata.
    pub metadata: DocumentMetadata,
    /// One chunk per element.
    pub chunks: Vec<ElementChunk>,
    /// Table extracts when requested and present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableRecord>>,
    /// Image extracts when requested and present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRecord>>,
}

/// Document-level metadata returned by `/api/process-rag`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Upload size in megabytes, rounded to two decimals.
    pub file_size_mb: f64,
    /// Page count reported by the converter.
    pub total_pages: usize,
    /// Number of chunks in the response.
    pub total_chunks: usize,
    /// Chunker settings used for this response.
    pub chunking_config: ChunkingConfig,
}

/// Body of a successful `/api/process-rag` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagResponse {
    /// Always `true`.
    pub success: bool,
    /// Document metadata.
    pub metadata: RagMetadata,
    /// Merged chunks.
    pub chunks: Vec<RagChunk>,
}

/// Body of a successful `/api/extract-tables` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablesResponse {
    /// Always `true`.
    pub success: bool,
    /// Uploaded file name.
    pub filename: String,
    /// Number of tables.
    pub total_tables: usize,
    /// Tables in page order.
    pub tables: Vec<TableRecord>,
}

/// Sheet-level metadata returned by `/api/process-excel`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadsheetMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Worksheet that was read.
    pub sheet: String,
    /// Header row.
    pub columns: Vec<String>,
    /// Data rows, including rows without values.
    pub total_rows: usize,
    /// Rows that produced a chunk.
    pub total_chunks: usize,
}

/// Body of a successful `/api/process-excel` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadsheetResponse {
    /// Always `true`.
    pub success: bool,
    /// Sheet metadata.
    pub metadata: SpreadsheetMetadata,
    /// One chunk per non-empty row.
    pub chunks: Vec<SpreadsheetChunk>,
}

/// Parameters for `/api/process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// List tables next to the chunks.
    pub extract_tables: bool,
    /// List pictures next to the chunks.
    pub extract_images: bool,
    /// Ask the converter to OCR bitmap content.
    pub do_ocr: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            extract_tables: true,
            extract_images: false,
            do_ocr: true,
        }
    }
}

/// Parameters for `/api/process-rag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RagOptions {
    /// Maximum tokens per chunk.
    pub chunk_size: usize,
    /// Overlap tokens between split windows.
    pub chunk_overlap: usize,
    /// Merge undersized siblings.
    pub merge_peers: bool,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            merge_peers: true,
        }
    }
}

impl From<RagOptions> for ChunkingConfig {
    fn from(options: RagOptions) -> Self {
        Self {
            max_tokens: options.chunk_size,
            overlap_tokens: options.chunk_overlap,
            merge_peers: options.merge_peers,
        }
    }
}
