//! Chunk assembly for converted documents.
//!
//! - [`assembler`] turns elements (raw mode) or chunker groups (RAG mode) into chunk records.
//! - [`hybrid`] is the token-bounded, structure-aware grouping used by RAG mode.
//! - [`tokens`] holds token counting and the overlap-aware splitter.

pub mod assembler;
pub mod hybrid;
pub mod tokens;
pub mod types;

pub use assembler::{
    ElementAssembly, ExtractionFlags, assemble_elements, assemble_rag, extract_tables,
};
pub use hybrid::{ChunkingConfig, HybridChunker};
pub use tokens::{TokenCounter, build_token_counter, word_count};
pub use types::{
    ChunkGroup, ElementChunk, ElementChunkMetadata, ImageRecord, RagChunk, RagChunkMetadata,
    TableRecord,
};

use thiserror::Error;

/// Errors produced while configuring or running the chunker.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// RAG chunking requested an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}
