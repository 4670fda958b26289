use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing processing activity.
#[derive(Default)]
pub struct ProcessingMetrics {
    documents_processed: AtomicU64,
    spreadsheets_processed: AtomicU64,
    chunks_emitted: AtomicU64,
    tables_extracted: AtomicU64,
    failed_requests: AtomicU64,
}

impl ProcessingMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a converted document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_emitted.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a table-only extraction.
    pub fn record_tables(&self, table_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.tables_extracted
            .fetch_add(table_count, Ordering::Relaxed);
    }

    /// Record a processed spreadsheet and its row chunks.
    pub fn record_spreadsheet(&self, chunk_count: u64) {
        self.spreadsheets_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_emitted.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a request that ended in an error response.
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            spreadsheets_processed: self.spreadsheets_processed.load(Ordering::Relaxed),
            chunks_emitted: self.chunks_emitted.load(Ordering::Relaxed),
            tables_extracted: self.tables_extracted.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of processing counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents converted since startup (all document endpoints).
    pub documents_processed: u64,
    /// Spreadsheets chunked since startup.
    pub spreadsheets_processed: u64,
    /// Total chunks returned across all responses.
    pub chunks_emitted: u64,
    /// Tables returned by the table-only endpoint.
    pub tables_extracted: u64,
    /// Pipeline operations that ended in an error.
    pub failed_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_chunks() {
        let metrics = ProcessingMetrics::new();
        metrics.record_document(2);
        metrics.record_document(3);
        metrics.record_spreadsheet(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_processed, 2);
        assert_eq!(snapshot.spreadsheets_processed, 1);
        assert_eq!(snapshot.chunks_emitted, 9);
    }

    #[test]
    fn tables_and_failures_are_tracked_separately() {
        let metrics = ProcessingMetrics::new();
        metrics.record_tables(3);
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_processed, 1);
        assert_eq!(snapshot.tables_extracted, 3);
        assert_eq!(snapshot.chunks_emitted, 0);
        assert_eq!(snapshot.failed_requests, 1);
    }
}
