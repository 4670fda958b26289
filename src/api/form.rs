//! Multipart form decoding for the upload endpoints.

use crate::processing::{ProcessOptions, RagOptions, ValidationError};
use crate::upload::UploadedFile;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use std::collections::HashMap;

/// Name of the multipart field carrying the document.
const FILE_FIELD: &str = "file";

/// Decoded upload form: the file plus any scalar fields.
#[derive(Debug)]
pub(crate) struct UploadForm {
    pub(crate) file: UploadedFile,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drain the multipart stream. The first `file` part wins; unknown fields are kept but unused.
    pub(crate) async fn read(
        mut multipart: Multipart,
        max_upload_mb: f64,
    ) -> Result<Self, ValidationError> {
        let multipart_error = |error: MultipartError| {
            if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ValidationError::BodyTooLarge {
                    max_mb: max_upload_mb,
                }
            } else {
                ValidationError::Multipart(error.body_text())
            }
        };

        let mut file = None;
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == FILE_FIELD {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if file.is_none()
                    && let Some(filename) = filename.filter(|name| !name.is_empty())
                {
                    file = Some(UploadedFile::new(filename, bytes));
                }
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                fields.entry(name).or_insert(value);
            }
        }

        let file = file.ok_or(ValidationError::MissingFile)?;
        Ok(Self { file, fields })
    }

    /// Options for `/api/process`.
    pub(crate) fn process_options(&self) -> Result<ProcessOptions, ValidationError> {
        let defaults = ProcessOptions::default();
        Ok(ProcessOptions {
            extract_tables: self.bool_field("extract_tables", defaults.extract_tables)?,
            extract_images: self.bool_field("extract_images", defaults.extract_images)?,
            do_ocr: self.bool_field("do_ocr", defaults.do_ocr)?,
        })
    }

    /// Options for `/api/process-rag`.
    pub(crate) fn rag_options(&self) -> Result<RagOptions, ValidationError> {
        let defaults = RagOptions::default();
        Ok(RagOptions {
            chunk_size: self.usize_field("chunk_size", defaults.chunk_size)?,
            chunk_overlap: self.usize_field("chunk_overlap", defaults.chunk_overlap)?,
            merge_peers: self.bool_field("merge_peers", defaults.merge_peers)?,
        })
    }

    fn bool_field(&self, name: &str, default: bool) -> Result<bool, ValidationError> {
        match self.fields.get(name) {
            None => Ok(default),
            Some(raw) => parse_bool(raw).ok_or_else(|| invalid(name, raw)),
        }
    }

    fn usize_field(&self, name: &str, default: usize) -> Result<usize, ValidationError> {
        match self.fields.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| invalid(name, raw)),
        }
    }
}

/// Form booleans as browsers and HTTP clients send them.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
        "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
        _ => None,
    }
}

fn invalid(field: &str, value: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}
