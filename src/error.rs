//! Error types for the porter-report library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * **Fatal** [`ReportError`]: the run cannot produce a report (missing
//!   input, unreadable PDF, completion failure during synthesis, unwritable
//!   output). Returned as `Err(ReportError)` from the `generate_report*`
//!   entry points.
//!
//! * **Degraded** [`StageWarning`]: metadata extraction or evidence
//!   collection failed, the pipeline continued with an empty profile or an
//!   empty bundle, and the final report is less specific than it could be.
//!   Stored in [`crate::output::ReportOutput::warnings`].
//!
//! Every stage also exposes a `try_*` function returning `ReportError`, so a
//! caller that prefers to abort on any failure can do so (see
//! [`crate::config::ReportConfig::strict`]).

use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the porter-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("Source document not found: '{path}'\nPlace a PDF there or pass --input.")]
    DocumentNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not open the document at all.
    #[error("Cannot parse document '{path}': {detail}")]
    DocumentParse { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Completion errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion backend returned an error.
    #[error("Completion service error during {stage}: {message}")]
    CompletionService { stage: Stage, message: String },

    /// The extraction response held no decodable profile.
    #[error("Malformed metadata in model response: {detail}")]
    MalformedMetadata { detail: String },

    // ── Evidence errors ───────────────────────────────────────────────────
    /// Evidence could not be collected (no company name to query).
    #[error("Evidence collection failed: {detail}")]
    EvidenceCollection { detail: String },

    /// A single search query failed.
    #[error("Search failed for '{query}': {detail}")]
    SearchFailed { query: String, detail: String },

    // ── Run control ───────────────────────────────────────────────────────
    /// An external call exceeded its configured timeout.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// The run was cancelled through its cancellation token.
    #[error("Run cancelled during {stage}")]
    Cancelled { stage: Stage },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The PDF writer could not build or finalise the document.
    #[error("Failed to render '{path}': {detail}")]
    Render { path: PathBuf, detail: String },

    /// Could not create the output directory or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// The pipeline stage this error belongs to, for "which stage failed" reporting.
    pub fn stage(&self) -> Stage {
        match self {
            ReportError::DocumentNotFound { .. }
            | ReportError::PermissionDenied { .. }
            | ReportError::InvalidInput { .. }
            | ReportError::DownloadFailed { .. }
            | ReportError::DownloadTimeout { .. }
            | ReportError::NotAPdf { .. }
            | ReportError::DocumentParse { .. }
            | ReportError::PdfiumBindingFailed(_) => Stage::Load,
            ReportError::MalformedMetadata { .. } => Stage::Extract,
            ReportError::EvidenceCollection { .. } | ReportError::SearchFailed { .. } => {
                Stage::Collect
            }
            ReportError::CompletionService { stage, .. }
            | ReportError::Timeout { stage, .. }
            | ReportError::Cancelled { stage } => *stage,
            ReportError::Render { .. } | ReportError::OutputWriteFailed { .. } => Stage::Render,
            ReportError::ProviderNotConfigured { .. }
            | ReportError::InvalidConfig(_)
            | ReportError::Internal(_) => Stage::Setup,
        }
    }
}

/// A non-fatal, degraded stage.
///
/// The run continued with reduced input; the report is still produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} degraded: {message}")]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

impl StageWarning {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl From<&ReportError> for StageWarning {
    fn from(err: &ReportError) -> Self {
        StageWarning::new(err.stage(), err.to_string())
    }
}
