//! Pure-Rust conversion backend.
//!
//! Format coverage:
//!
//! - PDF: text per page via `pdf-extract`, split into blocks and classified heuristically
//!   (headings, list items, whitespace-aligned tables). Page provenance, no bounding boxes.
//! - DOCX: `word/document.xml` walked with `roxmltree` (styles, numbering, tables, drawings).
//!   Word documents carry no page layout, so elements have no provenance.
//! - PPTX: one page per slide; shapes, tables and pictures with bounding boxes in points.
//! - Markdown / AsciiDoc: block parser for headings, lists, code, tables and images.
//! - HTML: block elements selected with `scrape-core`, tables with their cell grid.
//!
//! Parsing is CPU-bound and runs on the blocking pool.

mod html;
mod markup;
mod ooxml;
mod pdf;
mod text;

use super::{ConversionError, ConversionOptions, DocumentConverter, InputFormat};
use crate::document::ConvertedDocument;
use async_trait::async_trait;
use std::path::Path;

/// Converter backed by in-process parsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverter;

impl NativeConverter {
    /// Create the converter.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentConverter for NativeConverter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supports(&self, format: InputFormat) -> bool {
        matches!(
            format,
            InputFormat::Pdf
                | InputFormat::Docx
                | InputFormat::Pptx
                | InputFormat::Markdown
                | InputFormat::AsciiDoc
                | InputFormat::Html
        )
    }

    async fn convert(
        &self,
        path: &Path,
        format: InputFormat,
        options: &ConversionOptions,
    ) -> Result<ConvertedDocument, ConversionError> {
        if !self.supports(format) {
            return Err(ConversionError::Unsupported {
                backend: self.name(),
                format,
            });
        }
        if options.do_ocr {
            tracing::debug!(
                %format,
                "Native backend has no OCR stage; extracting embedded text only"
            );
        }

        let bytes = tokio::fs::read(path).await?;
        let document = tokio::task::spawn_blocking(move || parse_bytes(&bytes, format)).await??;
        tracing::debug!(
            %format,
            elements = document.elements.len(),
            pages = document.page_count,
            "Native conversion finished"
        );
        Ok(document)
    }
}

/// Parse an in-memory document of a supported format.
pub fn parse_bytes(
    bytes: &[u8],
    format: InputFormat,
) -> Result<ConvertedDocument, ConversionError> {
    match format {
        InputFormat::Pdf => pdf::parse_pdf(bytes),
        InputFormat::Docx => ooxml::parse_docx(bytes),
        InputFormat::Pptx => ooxml::parse_pptx(bytes),
        InputFormat::Markdown => Ok(markup::parse_markdown(&String::from_utf8_lossy(bytes))),
        InputFormat::AsciiDoc => Ok(markup::parse_asciidoc(&String::from_utf8_lossy(bytes))),
        InputFormat::Html => html::parse_html(&String::from_utf8_lossy(bytes)),
        InputFormat::Image => Err(ConversionError::Unsupported {
            backend: "native",
            format,
        }),
    }
}
