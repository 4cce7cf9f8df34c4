//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive events
//! as the run moves through its five stages.
//!
//! Progress reporting carries no data and no synchronisation duty: the
//! pipeline calls these hooks and moves on. A terminal spinner, a log line or
//! a websocket push are all equally valid sinks.
//!
//! # Example
//!
//! ```rust
//! use porter_report::{PipelineProgressCallback, ReportConfig, Stage};
//! use std::sync::Arc;
//!
//! struct StderrProgress;
//!
//! impl PipelineProgressCallback for StderrProgress {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(StderrProgress))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Provider resolution and config validation, before any stage runs.
    Setup,
    Load,
    Extract,
    Collect,
    Synthesize,
    Render,
}

impl Stage {
    /// The five pipeline stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Load,
        Stage::Extract,
        Stage::Collect,
        Stage::Synthesize,
        Stage::Render,
    ];

    /// 1-indexed position in [`Stage::ALL`]; `0` for [`Stage::Setup`].
    pub fn ordinal(self) -> usize {
        match self {
            Stage::Setup => 0,
            Stage::Load => 1,
            Stage::Extract => 2,
            Stage::Collect => 3,
            Stage::Synthesize => 4,
            Stage::Render => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Load => "document loading",
            Stage::Extract => "metadata extraction",
            Stage::Collect => "evidence collection",
            Stage::Synthesize => "synthesis",
            Stage::Render => "rendering",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it moves through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run strictly one after the other, but the
/// trait is `Send + Sync` so a callback can be shared with other tasks.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finished normally.
    ///
    /// `summary` is a short human-readable result, e.g. `"12840 chars"`.
    fn on_stage_complete(&self, stage: Stage, summary: &str) {
        let _ = (stage, summary);
    }

    /// Called when a stage failed but the run continues with reduced input.
    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }

    /// Called before each search query the evidence collector issues.
    ///
    /// `index` is 1-indexed; `planned` is the number of queries in this run.
    fn on_query(&self, index: usize, planned: usize, query: &str) {
        let _ = (index, planned, query);
    }

    /// Called once when the run finishes, successfully or not.
    fn on_run_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
