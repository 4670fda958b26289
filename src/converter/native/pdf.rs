use super::text::{classify_block, split_blocks};
use crate::converter::{ConversionError, InputFormat};
use crate::document::{ConvertedDocument, DocumentElement, Provenance};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extract text page by page and classify each block.
///
/// `pdf-extract` separates pages with form feeds. It can panic on malformed input, so the call
/// is isolated and a panic is reported as a parse error.
pub(super) fn parse_pdf(bytes: &[u8]) -> Result<ConvertedDocument, ConversionError> {
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| parse_error("PDF parser panicked on malformed input"))?
        .map_err(|error| parse_error(error.to_string()))?;

    let pages: Vec<&str> = extracted.split('\x0C').collect();
    let mut elements = Vec::new();

    for (index, page_text) in pages.iter().enumerate() {
        let page = u32::try_from(index + 1).unwrap_or(u32::MAX);
        for block in split_blocks(page_text) {
            for fragment in classify_block(&block) {
                let mut element = DocumentElement::new(fragment.label, fragment.text)
                    .with_provenance(Provenance::page(page));
                if let Some(grid) = fragment.grid {
                    element = element.with_structure(grid);
                }
                elements.push(element);
            }
        }
    }

    // a trailing form feed yields an empty final slice that is not a page
    let page_count = match pages.last() {
        Some(last) if last.trim().is_empty() && pages.len() > 1 => pages.len() - 1,
        _ => pages.len(),
    };

    tracing::trace!(pages = page_count, elements = elements.len(), "Parsed PDF text");
    Ok(ConvertedDocument::new(elements, page_count))
}

fn parse_error(message: impl Into<String>) -> ConversionError {
    ConversionError::Parse {
        format: InputFormat::Pdf,
        message: message.into(),
    }
}
