//! Processing service coordinating validation, staging, conversion and chunk assembly.

use crate::{
    chunking::{
        ExtractionFlags, HybridChunker, TokenCounter, assemble_elements, assemble_rag,
        build_token_counter, extract_tables,
    },
    config::Config,
    converter::{ConversionOptions, ConverterState, DocumentConverter, InputFormat},
    document::ConvertedDocument,
    metrics::{MetricsSnapshot, ProcessingMetrics},
    processing::types::{
        DocumentMetadata, ProcessOptions, ProcessResponse, ProcessingError, RagMetadata,
        RagOptions, RagResponse, SpreadsheetMetadata, SpreadsheetResponse, TablesResponse,
        ValidationError,
    },
    spreadsheet::{chunk_rows, is_spreadsheet_extension, read_first_sheet},
    upload::{TempUpload, UploadedFile},
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs uploads through the conversion engine and the chunk assembler.
///
/// The service owns the long-lived converter handle, the token counter and the metrics
/// registry. Construct it once at startup and share it through an `Arc`.
pub struct ProcessingService {
    converter: ConverterState,
    token_counter: TokenCounter,
    temp_dir: PathBuf,
    max_upload_mb: f64,
    metrics: Arc<ProcessingMetrics>,
}

/// Abstraction over the processing pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Convert a document and return one chunk per element.
    async fn process_document(
        &self,
        upload: UploadedFile,
        options: ProcessOptions,
    ) -> Result<ProcessResponse, ProcessingError>;

    /// Convert a document and return token-bounded RAG chunks.
    async fn process_rag(
        &self,
        upload: UploadedFile,
        options: RagOptions,
    ) -> Result<RagResponse, ProcessingError>;

    /// Convert a document and return only its tables.
    async fn extract_tables(&self, upload: UploadedFile)
    -> Result<TablesResponse, ProcessingError>;

    /// Chunk the first worksheet of an Excel workbook row by row.
    async fn process_spreadsheet(
        &self,
        upload: UploadedFile,
    ) -> Result<SpreadsheetResponse, ProcessingError>;

    /// Whether the conversion engine initialized.
    fn converter_ready(&self) -> bool;

    /// Name of the active conversion backend.
    fn backend_name(&self) -> Option<&'static str>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl ProcessingService {
    /// Build the service around an initialized converter.
    pub fn new(converter: ConverterState, config: &Config) -> Self {
        Self {
            converter,
            token_counter: build_token_counter(&config.tokenizer_model),
            temp_dir: config.upload_temp_dir.clone(),
            max_upload_mb: config.max_upload_mb,
            metrics: Arc::new(ProcessingMetrics::new()),
        }
    }

    /// Replace the token counter.
    pub fn with_token_counter(mut self, token_counter: TokenCounter) -> Self {
        self.token_counter = token_counter;
        self
    }

    /// Upload cap in megabytes.
    pub fn max_upload_mb(&self) -> f64 {
        self.max_upload_mb
    }

    fn ready_converter(&self) -> Result<&Arc<dyn DocumentConverter>, ProcessingError> {
        match &self.converter {
            ConverterState::Ready(converter) => Ok(converter),
            ConverterState::Unavailable { reason } => {
                Err(ProcessingError::ConverterUnavailable {
                    reason: reason.clone(),
                })
            }
        }
    }

    /// Validate, stage and convert an upload. The staged file is removed on every path.
    async fn convert_upload(
        &self,
        upload: &UploadedFile,
        options: ConversionOptions,
    ) -> Result<ConvertedDocument, ProcessingError> {
        let converter = self.ready_converter()?;
        upload.ensure_within_limit(self.max_upload_mb)?;

        let extension = upload.extension();
        let format = InputFormat::from_extension(&extension)
            .filter(|format| converter.supports(*format))
            .ok_or(ValidationError::UnsupportedFormat { extension })?;

        let staged = TempUpload::stage(&self.temp_dir, upload).await?;
        tracing::info!(
            path = %staged.path().display(),
            size_mb = upload.rounded_size_mb(),
            %format,
            "Staged upload"
        );
        let result = converter.convert(staged.path(), format, &options).await;
        staged.close();

        let document = result.inspect_err(|error| {
            tracing::error!(error = %error, "Document conversion failed");
        })?;
        tracing::debug!(
            elements = document.elements.len(),
            pages = document.page_count,
            "Converted document"
        );
        Ok(document)
    }

    async fn run_process(
        &self,
        upload: UploadedFile,
        options: ProcessOptions,
    ) -> Result<ProcessResponse, ProcessingError> {
        let document = self
            .convert_upload(
                &upload,
                ConversionOptions {
                    do_ocr: options.do_ocr,
                    ..ConversionOptions::default()
                },
            )
            .await?;

        let flags = ExtractionFlags {
            extract_tables: options.extract_tables,
            extract_images: options.extract_images,
        };
        let assembly = assemble_elements(&upload.filename, &document.elements, flags);
        let extension = upload.extension();

        let metadata = DocumentMetadata {
            filename: upload.filename.clone(),
            file_size_mb: upload.rounded_size_mb(),
            file_type: if extension.is_empty() {
                "unknown".into()
            } else {
                extension
            },
            total_pages: document.page_count,
            total_chunks: assembly.chunks.len(),
            total_tables: assembly.tables.len(),
            total_images: assembly.images.len(),
        };
        tracing::info!(
            chunks = metadata.total_chunks,
            tables = metadata.total_tables,
            images = metadata.total_images,
            "Processed document"
        );
        self.metrics.record_document(metadata.total_chunks as u64);

        Ok(ProcessResponse {
            success: true,
            metadata,
            chunks: assembly.chunks,
            tables: (options.extract_tables && !assembly.tables.is_empty())
                .then_some(assembly.tables),
            images: (options.extract_images && !assembly.images.is_empty())
                .then_some(assembly.images),
        })
    }

    async fn run_rag(
        &self,
        upload: UploadedFile,
        options: RagOptions,
    ) -> Result<RagResponse, ProcessingError> {
        self.ready_converter()?;
        let chunker = HybridChunker::new(options.into(), self.token_counter.clone())?;
        let document = self
            .convert_upload(&upload, ConversionOptions::default())
            .await?;

        let total_pages = document.page_count;
        let filename = upload.filename.clone();
        let chunks = tokio::task::spawn_blocking(move || {
            let groups = chunker.chunk(&document);
            assemble_rag(&filename, &groups)
        })
        .await?;
        tracing::info!(chunks = chunks.len(), "Generated RAG chunks");
        self.metrics.record_document(chunks.len() as u64);

        Ok(RagResponse {
            success: true,
            metadata: RagMetadata {
                filename: upload.filename.clone(),
                file_size_mb: upload.rounded_size_mb(),
                total_pages,
                total_chunks: chunks.len(),
                chunking_config: options.into(),
            },
            chunks,
        })
    }

    async fn run_extract_tables(
        &self,
        upload: UploadedFile,
    ) -> Result<TablesResponse, ProcessingError> {
        let document = self
            .convert_upload(&upload, ConversionOptions::default())
            .await?;
        let tables = extract_tables(&document);
        tracing::info!(tables = tables.len(), "Extracted tables");
        self.metrics.record_tables(tables.len() as u64);

        Ok(TablesResponse {
            success: true,
            filename: upload.filename,
            total_tables: tables.len(),
            tables,
        })
    }

    async fn run_spreadsheet(
        &self,
        upload: UploadedFile,
    ) -> Result<SpreadsheetResponse, ProcessingError> {
        if !is_spreadsheet_extension(&upload.extension()) {
            return Err(ValidationError::NotASpreadsheet.into());
        }
        upload.ensure_within_limit(self.max_upload_mb)?;

        let staged = TempUpload::stage(&self.temp_dir, &upload).await?;
        let path = staged.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || read_first_sheet(&path)).await;
        staged.close();

        let table = result?.inspect_err(|error| {
            tracing::error!(error = %error, "Spreadsheet parsing failed");
        })?;
        let chunks = chunk_rows(&upload.filename, &table);
        tracing::info!(
            sheet = %table.sheet,
            rows = table.rows.len(),
            chunks = chunks.len(),
            "Processed spreadsheet"
        );
        self.metrics.record_spreadsheet(chunks.len() as u64);

        Ok(SpreadsheetResponse {
            success: true,
            metadata: SpreadsheetMetadata {
                filename: upload.filename.clone(),
                sheet: table.sheet,
                columns: table.columns,
                total_rows: table.rows.len(),
                total_chunks: chunks.len(),
            },
            chunks,
        })
    }

    fn track<T>(&self, result: Result<T, ProcessingError>) -> Result<T, ProcessingError> {
        if result.is_err() {
            self.metrics.record_failure();
        }
        result
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn process_document(
        &self,
        upload: UploadedFile,
        options: ProcessOptions,
    ) -> Result<ProcessResponse, ProcessingError> {
        self.track(self.run_process(upload, options).await)
    }

    async fn process_rag(
        &self,
        upload: UploadedFile,
        options: RagOptions,
    ) -> Result<RagResponse, ProcessingError> {
        self.track(self.run_rag(upload, options).await)
    }

    async fn extract_tables(
        &self,
        upload: UploadedFile,
    ) -> Result<TablesResponse, ProcessingError> {
        self.track(self.run_extract_tables(upload).await)
    }

    async fn process_spreadsheet(
        &self,
        upload: UploadedFile,
    ) -> Result<SpreadsheetResponse, ProcessingError> {
        self.track(self.run_spreadsheet(upload).await)
    }

    fn converter_ready(&self) -> bool {
        self.converter.is_ready()
    }

    fn backend_name(&self) -> Option<&'static str> {
        self.converter.backend_name()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::tokens::whitespace_token_counter;
    use crate::converter::ConversionError;
    use crate::converter::native::NativeConverter;
    use crate::document::{DocumentElement, ElementLabel, Provenance};
    use std::path::Path;
    use std::sync::Mutex;

    /// Converter returning a fixed document and remembering the staged path it saw.
    struct FixedConverter {
        document: ConvertedDocument,
        seen: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl DocumentConverter for FixedConverter {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn supports(&self, format: InputFormat) -> bool {
            format == InputFormat::Pdf
        }

        async fn convert(
            &self,
            path: &Path,
            _format: InputFormat,
            _options: &ConversionOptions,
        ) -> Result<ConvertedDocument, ConversionError> {
            assert!(path.exists(), "staged file must exist during conversion");
            self.seen.lock().expect("lock").push(path.to_path_buf());
            Ok(self.document.clone())
        }
    }

    fn two_page_pdf() -> ConvertedDocument {
        ConvertedDocument::new(
            vec![
                DocumentElement::new(ElementLabel::SectionHeader, "Results")
                    .with_provenance(Provenance::page(1)),
                DocumentElement::new(ElementLabel::Paragraph, "Sales rose sharply.")
                    .with_provenance(Provenance::page(1)),
                DocumentElement::new(ElementLabel::Table, "Q1 | 10\nQ2 | 12")
                    .with_provenance(Provenance::page(2)),
            ],
            2,
        )
    }

    fn service(dir: &Path, converter: Arc<FixedConverter>) -> ProcessingService {
        let config = Config {
            upload_temp_dir: dir.to_path_buf(),
            ..Config::default()
        };
        ProcessingService::new(ConverterState::Ready(converter), &config)
            .with_token_counter(whitespace_token_counter())
    }

    fn fixed(document: ConvertedDocument) -> Arc<FixedConverter> {
        Arc::new(FixedConverter {
            document,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn process_lists_table_on_second_page_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = fixed(two_page_pdf());
        let service = service(dir.path(), converter.clone());

        let response = service
            .process_document(
                UploadedFile::new("report.pdf", b"%PDF".to_vec()),
                ProcessOptions::default(),
            )
            .await
            .expect("processed");

        assert_eq!(response.metadata.total_pages, 2);
        assert_eq!(response.metadata.total_chunks, 3);
        assert_eq!(response.metadata.file_type, "pdf");
        let tables = response.tables.expect("tables listed");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, Some(2));
        assert!(response.images.is_none());
        for (index, chunk) in response.chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, index);
            assert_eq!(chunk.chunk_id, format!("report.pdf_{index}"));
        }

        let seen = converter.seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists(), "staged file removed after conversion");
        assert_eq!(service.metrics_snapshot().documents_processed, 1);
    }

    #[tokio::test]
    async fn rag_is_idempotent_and_echoes_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(dir.path(), fixed(two_page_pdf()));
        let options = RagOptions {
            chunk_size: 64,
            chunk_overlap: 8,
            merge_peers: true,
        };

        let first = service
            .process_rag(UploadedFile::new("report.pdf", b"%PDF".to_vec()), options)
            .await
            .expect("rag");
        let second = service
            .process_rag(UploadedFile::new("report.pdf", b"%PDF".to_vec()), options)
            .await
            .expect("rag");

        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.chunks, second.chunks);
        assert_eq!(first.metadata.chunking_config.max_tokens, 64);
        assert_eq!(first.metadata.chunking_config.overlap_tokens, 8);

        let chunk = &first.chunks[0];
        assert_eq!(chunk.metadata.pages, vec![1, 2]);
        assert!(chunk.metadata.has_table);
        assert_eq!(chunk.metadata.headings, vec!["Results".to_string()]);
        assert_eq!(
            chunk.metadata.token_count,
            chunk.text.split_whitespace().count()
        );
    }

    #[tokio::test]
    async fn zero_chunk_size_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = fixed(two_page_pdf());
        let service = service(dir.path(), converter.clone());

        let error = service
            .process_rag(
                UploadedFile::new("report.pdf", b"%PDF".to_vec()),
                RagOptions {
                    chunk_size: 0,
                    ..RagOptions::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(error.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(converter.seen.lock().expect("lock").is_empty());
        assert_eq!(service.metrics_snapshot().failed_requests, 1);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = dir.path().join("staging");
        let service = service(&staging, fixed(two_page_pdf()));

        let error = service
            .process_document(
                UploadedFile::new("slides.pptx", b"PK".to_vec()),
                ProcessOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ProcessingError::Validation(ValidationError::UnsupportedFormat { ref extension })
                if extension == "pptx"
        ));
        assert!(!staging.exists(), "nothing staged for rejected uploads");
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected_before_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = dir.path().join("staging");
        let config = Config {
            upload_temp_dir: staging.clone(),
            max_upload_mb: 1.0,
            ..Config::default()
        };
        let service = ProcessingService::new(
            ConverterState::Ready(fixed(two_page_pdf())),
            &config,
        );

        let error = service
            .extract_tables(UploadedFile::new("big.pdf", vec![0u8; 1024 * 1024 + 1]))
            .await
            .unwrap_err();
        assert_eq!(error.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn unavailable_converter_yields_service_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            upload_temp_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let service = ProcessingService::new(
            ConverterState::Unavailable {
                reason: "docling-serve unreachable".into(),
            },
            &config,
        );

        assert!(!service.converter_ready());
        let error = service
            .extract_tables(UploadedFile::new("a.pdf", b"%PDF".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(error.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn spreadsheet_endpoint_rejects_other_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(dir.path(), fixed(two_page_pdf()));

        let error = service
            .process_spreadsheet(UploadedFile::new("report.pdf", b"%PDF".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ProcessingError::Validation(ValidationError::NotASpreadsheet)
        ));
        assert_eq!(error.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn corrupt_spreadsheet_is_a_processing_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service(dir.path(), fixed(two_page_pdf()));

        let error = service
            .process_spreadsheet(UploadedFile::new("stock.xlsx", b"garbage".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(error, ProcessingError::Spreadsheet(_)));
        assert_eq!(
            error.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn native_markdown_round_trip_through_service() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            upload_temp_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let service = ProcessingService::new(
            ConverterState::Ready(Arc::new(NativeConverter::new())),
            &config,
        )
        .with_token_counter(whitespace_token_counter());

        let response = service
            .process_document(
                UploadedFile::new(
                    "guide.md",
                    b"# Guide\n\n| a | b |\n| - | - |\n| 1 | 2 |\n\n![diagram](d.png)\n".to_vec(),
                ),
                ProcessOptions {
                    extract_images: true,
                    ..ProcessOptions::default()
                },
            )
            .await
            .expect("processed");

        assert_eq!(response.metadata.total_pages, 0);
        assert_eq!(response.metadata.total_tables, 1);
        assert_eq!(response.metadata.total_images, 1);
        let images = response.images.expect("images listed");
        assert_eq!(images[0].caption, "diagram");
        assert_eq!(images[0].page, None);
    }
}
