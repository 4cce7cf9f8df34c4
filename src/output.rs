//! Result types returned by a completed run.

use crate::error::StageWarning;
use crate::model::{CompanyProfile, EvidenceBundle, SynthesizedReport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a successful run produced.
///
/// A run that degraded (empty profile, empty evidence) is still a success;
/// inspect [`ReportOutput::warnings`] to find out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub profile: CompanyProfile,
    pub evidence: EvidenceBundle,
    pub report: SynthesizedReport,
    /// Where the rendered PDF was written.
    pub output_path: PathBuf,
    pub warnings: Vec<StageWarning>,
    pub stats: RunStats,
}

impl ReportOutput {
    /// True if any stage ran with reduced input.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Timings and sizes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Characters of text extracted from the source document.
    pub document_chars: usize,
    /// Search queries issued by the evidence collector.
    pub queries_issued: usize,
    /// Evidence items collected across all categories.
    pub evidence_items: usize,
    /// Characters in the synthesized report.
    pub report_chars: usize,
    /// Pages in the rendered PDF.
    pub rendered_pages: usize,
    pub load_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub collect_duration_ms: u64,
    pub synthesize_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}
