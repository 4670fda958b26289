//! Document processing pipeline: validation, staging, conversion and chunk assembly.

mod service;
pub mod types;

pub use service::{ProcessingApi, ProcessingService};
pub use types::{
    DocumentMetadata, ProcessOptions, ProcessResponse, ProcessingError, RagMetadata, RagOptions,
    RagResponse, SpreadsheetMetadata, SpreadsheetResponse, TablesResponse, ValidationError,
};
