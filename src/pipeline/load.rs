//! Document loading: concatenate the text of every page, in page order.
//!
//! pdfium is not async-safe, so [`PdfiumLoader`] does its work inside
//! `spawn_blocking`. A page whose text cannot be extracted contributes an
//! empty string; only a document pdfium cannot open at all is an error.

use crate::error::ReportError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extracts per-page text from a source document.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Text of each page in document order; `None` where a page had no
    /// extractable text.
    async fn page_texts(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<Option<String>>, ReportError>;
}

/// Concatenate page texts in order and trim the result.
///
/// Missing pages count as empty, so the output is never longer than the
/// sum of the page lengths.
pub fn join_page_texts<I>(pages: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut text = String::new();
    for page in pages.into_iter().flatten() {
        text.push_str(&page);
    }
    text.trim().to_string()
}

/// Load the full text of the document at `path`.
pub async fn load_document_text(
    loader: &dyn DocumentLoader,
    path: &Path,
    password: Option<&str>,
) -> Result<String, ReportError> {
    if !path.exists() {
        return Err(ReportError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    let pages = loader.page_texts(path, password).await?;
    let page_count = pages.len();
    let text = join_page_texts(pages);
    info!("Loaded {} chars from {} pages", text.chars().count(), page_count);
    Ok(text)
}

/// [`DocumentLoader`] backed by the pdfium C++ library.
///
/// Binds to `PDFIUM_LIB_PATH` when set, otherwise to the system library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumLoader {
    library_path: Option<PathBuf>,
}

impl PdfiumLoader {
    pub fn new() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    /// Bind to an explicit library file instead of the environment.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }
}

#[async_trait]
impl DocumentLoader for PdfiumLoader {
    async fn page_texts(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<Option<String>>, ReportError> {
        let path = path.to_path_buf();
        let password = password.map(str::to_string);
        let library = self.library_path.clone();

        tokio::task::spawn_blocking(move || {
            extract_pages_blocking(library.as_deref(), &path, password.as_deref())
        })
        .await
        .map_err(|e| ReportError::Internal(format!("Load task panicked: {e}")))?
    }
}

fn bind(library: Option<&Path>) -> Result<Pdfium, ReportError> {
    let bindings = match library {
        Some(lib) => Pdfium::bind_to_library(lib),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ReportError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn extract_pages_blocking(
    library: Option<&Path>,
    path: &Path,
    password: Option<&str>,
) -> Result<Vec<Option<String>>, ReportError> {
    let pdfium = bind(library)?;

    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| ReportError::DocumentParse {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let mut texts = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => {
                let all = text.all();
                debug!("Page {}: {} chars", idx + 1, all.len());
                texts.push(Some(all));
            }
            Err(e) => {
                warn!("Page {}: no extractable text ({:?})", idx + 1, e);
                texts.push(None);
            }
        }
    }

    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPages(Vec<Option<&'static str>>);

    #[async_trait]
    impl DocumentLoader for FixedPages {
        async fn page_texts(
            &self,
            _path: &Path,
            _password: Option<&str>,
        ) -> Result<Vec<Option<String>>, ReportError> {
            Ok(self.0.iter().map(|p| p.map(str::to_string)).collect())
        }
    }

    #[test]
    fn join_keeps_page_order_and_trims() {
        let text = join_page_texts(vec![
            Some("  Page one. ".to_string()),
            None,
            Some("Page three.\n".to_string()),
        ]);
        assert_eq!(text, "Page one. Page three.");
    }

    #[test]
    fn join_never_exceeds_sum_of_pages() {
        let pages = vec![Some("abc ".to_string()), Some(" def".to_string()), None];
        let sum: usize = pages.iter().flatten().map(|p| p.len()).sum();
        assert!(join_page_texts(pages).len() <= sum);
    }

    #[test]
    fn join_of_nothing_is_empty() {
        assert_eq!(join_page_texts(Vec::<Option<String>>::new()), "");
        assert_eq!(join_page_texts(vec![None, None]), "");
    }

    #[tokio::test]
    async fn load_uses_injected_loader() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let loader = FixedPages(vec![Some("Acme Corp "), None, Some("annual report")]);
        let text = load_document_text(&loader, file.path(), None).await.unwrap();
        assert_eq!(text, "Acme Corp annual report");
    }

    #[tokio::test]
    async fn load_missing_path_fails() {
        let loader = FixedPages(vec![]);
        let err = load_document_text(&loader, Path::new("/nope/missing.pdf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::DocumentNotFound { .. }));
    }
}
