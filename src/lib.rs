//! # porter-report
//!
//! Turn a company PDF into a Porter's Five Forces strategic report.
//!
//! The pipeline merges three heterogeneous sources into one long-form,
//! heading-structured document: the raw text of the source PDF, a JSON
//! company profile extracted from it by a language model, and web evidence
//! collected for that profile. The result is rendered as a paginated PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Load        concatenate page text via pdfium (spawn_blocking)
//!  ├─ 2. Extract     LLM → CompanyProfile JSON (degrades to empty profile)
//!  ├─ 3. Collect     ≤ 9 search queries → EvidenceBundle (degrades to empty)
//!  ├─ 4. Synthesize  one structured prompt → SynthesizedReport (fatal on error)
//!  └─ 5. Render      classify, sanitise, wrap, paginate → A4 PDF
//! ```
//!
//! Every external call (load, completion, search, render) runs under its
//! own timeout and the run's [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use porter_report::{generate_report, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ReportConfig::builder()
//!         .input("pdfs/acme.pdf")
//!         .output("output/acme_porter.pdf")
//!         .build()?;
//!     let output = generate_report(&config).await?;
//!     eprintln!(
//!         "{}: {} pages, {} evidence items, {} warnings",
//!         output.output_path.display(),
//!         output.stats.rendered_pages,
//!         output.stats.evidence_items,
//!         output.warnings.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `porter-report` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! porter-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod completion;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod search;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use completion::{CompletionError, CompletionRequest, CompletionService, LlmCompletionService};
pub use config::{CharsetPolicy, ReportConfig, ReportConfigBuilder, ResultLimits, SearchBackend};
pub use error::{ReportError, StageWarning};
pub use model::{
    CompanyProfile, EvidenceBundle, EvidenceCategory, EvidenceItem, QueryRecord,
    SynthesizedReport,
};
pub use output::{ReportOutput, RunStats};
pub use pipeline::collect::{collect_evidence, try_collect_evidence};
pub use pipeline::extract::{extract_company_profile, parse_profile_response, try_extract_company_profile};
pub use pipeline::load::{load_document_text, DocumentLoader, PdfiumLoader};
pub use pipeline::render::{layout_document, render_document, DocumentLayout};
pub use pipeline::sanitize::to_printable_ascii;
pub use pipeline::synthesize::{audit_report_structure, synthesize_report, StructureAudit};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use run::{generate_report, generate_report_from_text, generate_report_sync};
pub use search::{SearchHit, SearchProvider, SerpApiSearchProvider, StubSearchProvider};
