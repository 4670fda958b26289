//! Uploaded files and their on-disk staging.
//!
//! An upload is validated in memory (size cap, extension) before anything touches the disk.
//! Converters read from a [`TempUpload`], a uniquely named file in the configured temp
//! directory that is removed when the guard is closed or dropped.

use crate::processing::ValidationError;
use axum::body::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Multipart file field held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub filename: String,
    /// File content.
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Wrap an upload.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in megabytes (1 MB = 1024² bytes).
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / BYTES_PER_MB
    }

    /// Size in megabytes rounded to two decimals, as reported in responses.
    pub fn rounded_size_mb(&self) -> f64 {
        (self.size_mb() * 100.0).round() / 100.0
    }

    /// Lowercase extension without the dot; empty when the name has none.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Reject uploads strictly larger than `max_mb`.
    pub fn ensure_within_limit(&self, max_mb: f64) -> Result<(), ValidationError> {
        let size_mb = self.size_mb();
        if size_mb > max_mb {
            return Err(ValidationError::FileTooLarge { size_mb, max_mb });
        }
        Ok(())
    }
}

/// Temporary on-disk copy of an upload; deleted on close or drop.
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    /// Write the upload into `dir`, keeping its extension so format sniffing by suffix works.
    pub async fn stage(dir: &Path, upload: &UploadedFile) -> std::io::Result<Self> {
        let dir = dir.to_path_buf();
        let bytes = upload.bytes.clone();
        let suffix = match upload.extension() {
            ext if ext.is_empty() => String::new(),
            ext => format!(".{ext}"),
        };
        tokio::task::spawn_blocking(move || Self::stage_blocking(&dir, &suffix, &bytes))
            .await
            .map_err(std::io::Error::other)?
    }

    fn stage_blocking(dir: &Path, suffix: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, logging instead of failing when removal does not succeed.
    pub fn close(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary upload"),
            Err(error) => tracing::warn!(
                path = %path.display(),
                error = %error,
                "Failed to remove temporary upload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_of(len: usize) -> UploadedFile {
        UploadedFile::new("big.pdf", vec![0u8; len])
    }

    #[test]
    fn exactly_the_cap_is_accepted() {
        let upload = upload_of(50 * 1024 * 1024);
        assert_eq!(upload.size_mb(), 50.0);
        assert!(upload.ensure_within_limit(50.0).is_ok());
    }

    #[test]
    fn just_over_the_cap_is_rejected() {
        let upload = upload_of((50.1 * BYTES_PER_MB) as usize);
        let error = upload.ensure_within_limit(50.0).unwrap_err();
        assert!(matches!(error, ValidationError::FileTooLarge { .. }));
        assert_eq!(error.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(UploadedFile::new("Report.PDF", Vec::new()).extension(), "pdf");
        assert_eq!(UploadedFile::new("archive.tar.GZ", Vec::new()).extension(), "gz");
        assert_eq!(UploadedFile::new("README", Vec::new()).extension(), "");
    }

    #[test]
    fn size_is_rounded_to_two_decimals() {
        let upload = upload_of(1_572_864 + 5_000);
        assert_eq!(upload.rounded_size_mb(), 1.5);
    }

    #[tokio::test]
    async fn staged_file_is_removed_on_close_and_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = UploadedFile::new("notes.md", b"# hi".to_vec());

        let staged = TempUpload::stage(dir.path(), &upload).await.expect("stage");
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("md"));
        assert_eq!(std::fs::read(&path).expect("read"), b"# hi");
        staged.close();
        assert!(!path.exists());

        let staged = TempUpload::stage(dir.path(), &upload).await.expect("stage");
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staging_creates_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("uploads").join("nested");
        let upload = UploadedFile::new("a.pdf", b"%PDF".to_vec());

        let staged = TempUpload::stage(&nested, &upload).await.expect("stage");
        assert!(staged.path().starts_with(&nested));
    }
}
