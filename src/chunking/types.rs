//! Serializable chunk records emitted by the assembler.

use crate::document::{BoundingBox, DocumentElement, ElementLabel, TableGrid};
use serde::Serialize;

/// One chunk per document element (raw mode).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementChunk {
    /// `{filename}_{index}`.
    pub chunk_id: String,
    /// Element text, emitted verbatim (possibly empty).
    pub text: String,
    /// Element label.
    #[serde(rename = "type")]
    pub element_type: ElementLabel,
    /// Per-chunk metadata.
    pub metadata: ElementChunkMetadata,
}

/// Metadata attached to an [`ElementChunk`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementChunkMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Zero-based position in the response.
    pub chunk_index: usize,
    /// Element label.
    pub element_type: ElementLabel,
    /// Page of the first provenance entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Bounding box of the first provenance entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// Table extract listed alongside chunks or returned by the table-only endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRecord {
    /// Page the table starts on.
    pub page: Option<u32>,
    /// Serialized table text.
    pub text: String,
    /// Table bounding box.
    pub bbox: Option<BoundingBox>,
    /// Cell grid when the converter recovered one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<TableGrid>,
}

/// Picture extract listed alongside chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// Page the picture is on.
    pub page: Option<u32>,
    /// Caption or alt text.
    pub caption: String,
    /// Picture bounding box.
    pub bbox: Option<BoundingBox>,
}

/// Token-bounded group of elements produced by the hybrid chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkGroup<'a> {
    /// Merged text of the group.
    pub text: String,
    /// Elements contributing to the group, in document order.
    pub doc_items: Vec<&'a DocumentElement>,
    /// Heading path in effect for the group.
    pub headings: Vec<String>,
}

/// Merged, RAG-oriented chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagChunk {
    /// `{filename}_rag_{index}`.
    pub chunk_id: String,
    /// Group text.
    pub text: String,
    /// Per-chunk metadata.
    pub metadata: RagChunkMetadata,
}

/// Metadata attached to a [`RagChunk`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagChunkMetadata {
    /// Uploaded file name.
    pub filename: String,
    /// Zero-based position in the response.
    pub chunk_index: usize,
    /// Distinct pages of the constituent elements, ascending.
    pub pages: Vec<u32>,
    /// Distinct constituent labels, sorted.
    pub element_types: Vec<String>,
    /// Whether any constituent is a table.
    pub has_table: bool,
    /// Whether any constituent is a figure.
    pub has_figure: bool,
    /// Whitespace-delimited word count of `text`.
    pub token_count: usize,
    /// Heading path in effect for the chunk.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
}
