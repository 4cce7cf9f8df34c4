//! Input resolution: turn the configured source into a local PDF path.
//!
//! The source must exist before any stage runs. A local path is checked for
//! existence, read permission and the `%PDF` magic; a URL is downloaded into
//! a [`TempDir`] that lives as long as the returned [`SourceDocument`].

use crate::error::ReportError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A source document ready for loading.
#[derive(Debug)]
pub enum SourceDocument {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the `TempDir` keeps the download alive.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl SourceDocument {
    pub fn path(&self) -> &Path {
        match self {
            SourceDocument::Local(p) => p,
            SourceDocument::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading it first if it is a URL.
pub async fn resolve_source(input: &str, timeout_secs: u64) -> Result<SourceDocument, ReportError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ReportError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        check_local(Path::new(input)).map(|p| SourceDocument::Local(p.to_path_buf()))
    }
}

/// Validate a local PDF: exists, readable, starts with `%PDF`.
pub fn check_local(path: &Path) -> Result<&Path, ReportError> {
    if !path.is_file() {
        return Err(ReportError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ReportError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ReportError::DocumentNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
        return Err(ReportError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Source document: {}", path.display());
    Ok(path)
}

async fn download(url: &str, timeout_secs: u64) -> Result<SourceDocument, ReportError> {
    info!("Downloading source document from {}", url);
    let failed = |reason: String| ReportError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| ReportError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(file_name_from_url(url));

    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ReportError::NotAPdf { path, magic });
    }

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ReportError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(SourceDocument::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of `url` when it looks like a file name.
fn file_name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "document.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("pdfs/document.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn file_name_from_url_falls_back() {
        assert_eq!(file_name_from_url("https://x.org/a/report.pdf"), "report.pdf");
        assert_eq!(file_name_from_url("https://x.org/a/"), "document.pdf");
        assert_eq!(file_name_from_url("https://x.org/download"), "document.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_document_not_found() {
        let err = resolve_source("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, ReportError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_source(f.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[tokio::test]
    async fn pdf_magic_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let src = resolve_source(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(src.path(), f.path());
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_source("   ", 5).await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput { .. }));
    }
}
