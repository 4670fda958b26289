//! Chunk assembly: converted documents in, flat metadata-tagged chunk lists out.

use super::tokens::word_count;
use super::types::{
    ChunkGroup, ElementChunk, ElementChunkMetadata, ImageRecord, RagChunk, RagChunkMetadata,
    TableRecord,
};
use crate::document::{ConvertedDocument, DocumentElement, ElementCategory};
use std::collections::BTreeSet;

/// Side extracts requested alongside raw-mode chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionFlags {
    /// Collect table elements into a separate list.
    pub extract_tables: bool,
    /// Collect picture elements into a separate list.
    pub extract_images: bool,
}

/// Result of raw-mode assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementAssembly {
    /// One chunk per element, in document order.
    pub chunks: Vec<ElementChunk>,
    /// Table extracts (empty unless requested).
    pub tables: Vec<TableRecord>,
    /// Picture extracts (empty unless requested).
    pub images: Vec<ImageRecord>,
}

/// Build one chunk per element.
///
/// Elements are emitted even when their text is empty; only the spreadsheet path drops empty
/// rows.
pub fn assemble_elements(
    filename: &str,
    elements: &[DocumentElement],
    flags: ExtractionFlags,
) -> ElementAssembly {
    let mut assembly = ElementAssembly {
        chunks: Vec::with_capacity(elements.len()),
        ..ElementAssembly::default()
    };

    for (index, element) in elements.iter().enumerate() {
        let page = element.first_page();
        let bbox = element.first_bbox();

        assembly.chunks.push(ElementChunk {
            chunk_id: format!("{filename}_{index}"),
            text: element.text.clone(),
            element_type: element.label.clone(),
            metadata: ElementChunkMetadata {
                filename: filename.to_string(),
                chunk_index: index,
                element_type: element.label.clone(),
                page,
                bbox,
            },
        });

        match element.category() {
            ElementCategory::Table if flags.extract_tables => {
                assembly.tables.push(TableRecord {
                    page,
                    text: element.text.clone(),
                    bbox,
                    structure: None,
                });
            }
            ElementCategory::Figure if flags.extract_images => {
                assembly.images.push(ImageRecord {
                    page,
                    caption: element.text.clone(),
                    bbox,
                });
            }
            _ => {}
        }
    }

    assembly
}

/// Derive RAG chunk records from chunker groups.
pub fn assemble_rag(filename: &str, groups: &[ChunkGroup<'_>]) -> Vec<RagChunk> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let pages: BTreeSet<u32> = group
                .doc_items
                .iter()
                .filter_map(|element| element.first_page())
                .collect();
            let element_types: BTreeSet<&str> = group
                .doc_items
                .iter()
                .map(|element| element.label.as_str())
                .collect();
            let has_table = group
                .doc_items
                .iter()
                .any(|element| element.category() == ElementCategory::Table);
            let has_figure = group
                .doc_items
                .iter()
                .any(|element| element.category() == ElementCategory::Figure);

            RagChunk {
                chunk_id: format!("{filename}_rag_{index}"),
                text: group.text.clone(),
                metadata: RagChunkMetadata {
                    filename: filename.to_string(),
                    chunk_index: index,
                    pages: pages.into_iter().collect(),
                    element_types: element_types.into_iter().map(str::to_string).collect(),
                    has_table,
                    has_figure,
                    token_count: word_count(&group.text),
                    headings: group.headings.clone(),
                },
            }
        })
        .collect()
}

/// Flatten every table in the document, ordered by page then position within the page.
///
/// Tables without provenance come last with no page.
pub fn extract_tables(document: &ConvertedDocument) -> Vec<TableRecord> {
    let mut tables: Vec<TableRecord> = document
        .elements
        .iter()
        .filter(|element| element.category() == ElementCategory::Table)
        .map(|element| TableRecord {
            page: element.first_page(),
            text: element.text.clone(),
            bbox: element.first_bbox(),
            structure: element.structure.clone(),
        })
        .collect();
    // stable: in-page order is preserved
    tables.sort_by_key(|table| (table.page.is_none(), table.page));
    tables
}
