#![deny(missing_docs)]

//! Core library for the docchunk document chunking service.

/// HTTP routing and REST handlers.
pub mod api;
/// Chunk assembly and token-aware grouping.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Document conversion backends.
pub mod converter;
/// Structured document model shared by converters and chunkers.
pub mod document;
/// Structured logging and tracing setup.
pub mod logging;
/// Processing metrics helpers.
pub mod metrics;
/// Document processing pipeline.
pub mod processing;
/// Excel row chunking.
pub mod spreadsheet;
/// Upload validation and temporary file staging.
pub mod upload;
