//! Pipeline entry points.
//!
//! A run is strictly sequential: load → extract → collect → synthesize →
//! render, each stage handing its output to the next. Loading, synthesis
//! and rendering failures abort the run. Extraction and collection failures
//! degrade it (empty profile, empty bundle) and are recorded as
//! [`StageWarning`]s, unless [`ReportConfig::strict`] is set. Cancellation
//! always aborts.

use crate::completion::{resolve_completion_service, CompletionService};
use crate::config::ReportConfig;
use crate::error::{ReportError, StageWarning};
use crate::model::{CompanyProfile, EvidenceBundle};
use crate::output::{ReportOutput, RunStats};
use crate::pipeline::load::{load_document_text, DocumentLoader, PdfiumLoader};
use crate::pipeline::{collect, extract, guarded, input, render, synthesize};
use crate::progress::Stage;
use crate::search::{resolve_search_provider, SearchProvider};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Generate a report from the configured source document.
///
/// The source must exist before any stage runs; a missing file fails with
/// [`ReportError::DocumentNotFound`] and no completion or search call is made.
///
/// # Errors
/// Returns `Err(ReportError)` for fatal failures only. Use
/// [`ReportError::stage`] to find out which stage failed.
pub async fn generate_report(config: &ReportConfig) -> Result<ReportOutput, ReportError> {
    let config = pinned(config);
    let result = generate_inner(&config).await;
    finish(&config, result)
}

/// Generate a report from already-extracted document text, skipping the
/// input and load stages.
pub async fn generate_report_from_text(
    text: &str,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let config = pinned(config);
    let result: Result<ReportOutput, ReportError> = async {
        let services = Services::resolve(&config)?;
        let mut run = Run::new(&config);
        run.stats.document_chars = text.chars().count();
        run.stages(text, &services).await
    }
    .await;
    finish(&config, result)
}

/// Synchronous wrapper around [`generate_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_report_sync(config: &ReportConfig) -> Result<ReportOutput, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_report(config))
}

/// One timestamp for the whole run, so queries, bundle and title agree.
fn pinned(config: &ReportConfig) -> ReportConfig {
    let mut config = config.clone();
    config.timestamp.get_or_insert_with(Utc::now);
    config
}

fn finish(
    config: &ReportConfig,
    result: Result<ReportOutput, ReportError>,
) -> Result<ReportOutput, ReportError> {
    match &result {
        Ok(out) => info!(
            "Report complete: {} ({} pages, {} warnings, {}ms)",
            out.output_path.display(),
            out.stats.rendered_pages,
            out.warnings.len(),
            out.stats.total_duration_ms
        ),
        Err(e) => warn!("Report failed during {}: {}", e.stage(), e),
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(result.is_ok());
    }
    result
}

async fn generate_inner(config: &ReportConfig) -> Result<ReportOutput, ReportError> {
    info!("Starting report: {}", config.input);
    let source = input::resolve_source(&config.input, config.download_timeout_secs).await?;
    let services = Services::resolve(config)?;
    let mut run = Run::new(config);

    let loader: Arc<dyn DocumentLoader> = match config.loader {
        Some(ref loader) => Arc::clone(loader),
        None => Arc::new(PdfiumLoader::new()),
    };

    run.start(Stage::Load);
    let started = Instant::now();
    let text = guarded(
        Stage::Load,
        config.load_timeout_secs,
        &config.cancel,
        load_document_text(loader.as_ref(), source.path(), config.password.as_deref()),
    )
    .await?;
    run.stats.load_duration_ms = elapsed_ms(started);
    run.stats.document_chars = text.chars().count();
    if text.is_empty() {
        warn!("Source document has no extractable text");
    }
    run.complete(
        Stage::Load,
        &format!("{} chars", run.stats.document_chars),
    );

    run.stages(&text, &services).await
}

/// External collaborators resolved once per run.
struct Services {
    completion: Arc<dyn CompletionService>,
    search: Arc<dyn SearchProvider>,
}

impl Services {
    fn resolve(config: &ReportConfig) -> Result<Self, ReportError> {
        Ok(Self {
            completion: resolve_completion_service(config)?,
            search: resolve_search_provider(config)?,
        })
    }
}

struct Run<'a> {
    config: &'a ReportConfig,
    started: Instant,
    warnings: Vec<StageWarning>,
    stats: RunStats,
}

impl<'a> Run<'a> {
    fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            warnings: Vec::new(),
            stats: RunStats::default(),
        }
    }

    fn start(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn complete(&self, stage: Stage, summary: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, summary);
        }
    }

    /// Record a stage failure as a warning, or return it when it must abort.
    fn degrade(&mut self, stage: Stage, err: ReportError) -> Result<(), ReportError> {
        if matches!(err, ReportError::Cancelled { .. }) || self.config.strict {
            return Err(err);
        }
        let warning = StageWarning::new(stage, err.to_string());
        warn!("{}", warning);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_degraded(stage, &warning.message);
        }
        self.warnings.push(warning);
        Ok(())
    }

    async fn stages(mut self, text: &str, services: &Services) -> Result<ReportOutput, ReportError> {
        let config = self.config;

        // ── Extract ──────────────────────────────────────────────────────
        self.start(Stage::Extract);
        let started = Instant::now();
        let profile = match extract::try_extract_company_profile(
            text,
            services.completion.as_ref(),
            config,
        )
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                self.degrade(Stage::Extract, e)?;
                CompanyProfile::default()
            }
        };
        self.stats.extract_duration_ms = elapsed_ms(started);
        self.complete(Stage::Extract, profile.display_name());

        // ── Collect ──────────────────────────────────────────────────────
        self.start(Stage::Collect);
        let started = Instant::now();
        let evidence =
            match collect::try_collect_evidence(&profile, services.search.as_ref(), config).await {
                Ok(bundle) => bundle,
                Err(e) => {
                    let message = e.to_string();
                    self.degrade(Stage::Collect, e)?;
                    EvidenceBundle::failed(message, config.run_timestamp())
                }
            };
        let failed_queries = evidence.queries.iter().filter(|q| q.error.is_some()).count();
        if failed_queries > 0 {
            let warning = StageWarning::new(
                Stage::Collect,
                format!("{failed_queries} of {} queries failed", evidence.query_count()),
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_degraded(Stage::Collect, &warning.message);
            }
            self.warnings.push(warning);
        }
        self.stats.collect_duration_ms = elapsed_ms(started);
        self.stats.queries_issued = evidence.query_count();
        self.stats.evidence_items = evidence.total_items();
        self.complete(
            Stage::Collect,
            &format!(
                "{} items from {} queries",
                self.stats.evidence_items, self.stats.queries_issued
            ),
        );

        // ── Synthesize ───────────────────────────────────────────────────
        self.start(Stage::Synthesize);
        let started = Instant::now();
        let report = synthesize::synthesize_report(
            text,
            &profile,
            &evidence,
            services.completion.as_ref(),
            config,
        )
        .await?;
        self.stats.synthesize_duration_ms = elapsed_ms(started);
        self.stats.report_chars = report.char_count();
        self.complete(
            Stage::Synthesize,
            &format!("{} chars", self.stats.report_chars),
        );

        // ── Render ───────────────────────────────────────────────────────
        self.start(Stage::Render);
        let started = Instant::now();
        let pages = render::render_document(&report, &profile, &config.output, config).await?;
        self.stats.render_duration_ms = elapsed_ms(started);
        self.stats.rendered_pages = pages;
        self.complete(Stage::Render, &format!("{pages} pages"));

        self.stats.total_duration_ms = elapsed_ms(self.started);
        Ok(ReportOutput {
            profile,
            evidence,
            report,
            output_path: config.output.clone(),
            warnings: self.warnings,
            stats: self.stats,
        })
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
