//! Document conversion backends.
//!
//! A [`DocumentConverter`] turns an uploaded file into a [`ConvertedDocument`]. Two backends ship
//! with the service:
//!
//! - [`native::NativeConverter`] – pure-Rust parsing of PDF, DOCX, PPTX, HTML, Markdown and
//!   AsciiDoc. No OCR, so images are not supported.
//! - [`docling::DoclingServeConverter`] – forwards the file to a docling-serve instance and maps
//!   the returned DoclingDocument JSON. Supports every [`InputFormat`].
//!
//! The converter is built once at startup by [`initialize_converter`]. Initialization failures do
//! not abort the process; they yield [`ConverterState::Unavailable`] so document endpoints can
//! answer with a service-unavailable error while `/health` reports the condition.

pub mod docling;
pub mod native;

use crate::config::{Config, ConverterBackend};
use crate::document::ConvertedDocument;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Upload formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputFormat {
    /// Portable Document Format.
    Pdf,
    /// Word document.
    Docx,
    /// PowerPoint presentation.
    Pptx,
    /// HTML page.
    Html,
    /// Raster image (requires OCR).
    Image,
    /// Markdown text.
    Markdown,
    /// AsciiDoc text.
    AsciiDoc,
}

impl InputFormat {
    /// Every known format.
    pub const ALL: [InputFormat; 7] = [
        Self::Pdf,
        Self::Docx,
        Self::Pptx,
        Self::Html,
        Self::Image,
        Self::Markdown,
        Self::AsciiDoc,
    ];

    /// Detect the format from a lowercase extension without the dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" => Some(Self::Image),
            "md" | "markdown" => Some(Self::Markdown),
            "adoc" | "asciidoc" | "asc" => Some(Self::AsciiDoc),
            _ => None,
        }
    }

    /// Short name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Html => "html",
            Self::Image => "image",
            Self::Markdown => "md",
            Self::AsciiDoc => "asciidoc",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request conversion switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Run OCR on bitmap content.
    pub do_ocr: bool,
    /// Recover table cell structure.
    pub do_table_structure: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            do_ocr: true,
            do_table_structure: true,
        }
    }
}

/// Errors raised while converting a document.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The backend cannot handle this format.
    #[error("{backend} converter does not support {format} input")]
    Unsupported {
        /// Backend name.
        backend: &'static str,
        /// Rejected format.
        format: InputFormat,
    },
    /// Reading the uploaded file failed.
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
    /// The file could not be parsed.
    #[error("failed to parse {format} document: {message}")]
    Parse {
        /// Format being parsed.
        format: InputFormat,
        /// Parser diagnostic.
        message: String,
    },
    /// HTTP layer failed before a response arrived.
    #[error("conversion request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote converter answered with an error status.
    #[error("converter responded with {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status.
        status: reqwest::StatusCode,
        /// Response body.
        body: String,
    },
    /// The remote converter reported a failed conversion or returned malformed output.
    #[error("invalid converter response: {0}")]
    InvalidResponse(String),
    /// Backend configuration is incomplete.
    #[error("converter misconfigured: {0}")]
    Configuration(String),
    /// Blocking parse task was cancelled or panicked.
    #[error("conversion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Conversion engine shared across requests.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Backend name reported by the service descriptor.
    fn name(&self) -> &'static str;

    /// Whether [`DocumentConverter::convert`] accepts the format.
    fn supports(&self, format: InputFormat) -> bool;

    /// Convert the file at `path` into a structured document.
    async fn convert(
        &self,
        path: &Path,
        format: InputFormat,
        options: &ConversionOptions,
    ) -> Result<ConvertedDocument, ConversionError>;
}

/// Outcome of converter initialization.
#[derive(Clone)]
pub enum ConverterState {
    /// Converter initialized and accepting work.
    Ready(Arc<dyn DocumentConverter>),
    /// Initialization failed; document endpoints refuse work.
    Unavailable {
        /// Why initialization failed.
        reason: String,
    },
}

impl ConverterState {
    /// Whether a converter is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Backend name, when ready.
    pub fn backend_name(&self) -> Option<&'static str> {
        match self {
            Self::Ready(converter) => Some(converter.name()),
            Self::Unavailable { .. } => None,
        }
    }
}

impl fmt::Debug for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(converter) => f.debug_tuple("Ready").field(&converter.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Build the configured converter, probing remote backends for readiness.
pub async fn initialize_converter(config: &Config) -> ConverterState {
    let result = match config.converter_backend {
        ConverterBackend::Native => {
            Ok(Arc::new(native::NativeConverter::new()) as Arc<dyn DocumentConverter>)
        }
        ConverterBackend::Docling => init_docling(config).await,
    };

    match result {
        Ok(converter) => {
            tracing::info!(backend = converter.name(), "Document converter initialized");
            ConverterState::Ready(converter)
        }
        Err(error) => {
            tracing::error!(error = %error, "Document converter failed to initialize");
            ConverterState::Unavailable {
                reason: error.to_string(),
            }
        }
    }
}

async fn init_docling(config: &Config) -> Result<Arc<dyn DocumentConverter>, ConversionError> {
    let url = config.docling_serve_url.as_deref().ok_or_else(|| {
        ConversionError::Configuration(
            "DOCLING_SERVE_URL is required for the docling backend".into(),
        )
    })?;
    let converter = docling::DoclingServeConverter::new(
        url,
        config.docling_serve_api_key.clone(),
        config.docling_timeout,
    )?;
    converter.probe().await?;
    Ok(Arc::new(converter))
}
