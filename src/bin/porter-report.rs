//! CLI binary for porter-report.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReportConfig` and prints results.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use porter_report::config::{DEFAULT_INPUT, DEFAULT_OUTPUT};
use porter_report::{
    audit_report_structure, generate_report, CharsetPolicy, PipelineProgressCallback,
    ProgressCallback, ReportConfig, SearchBackend, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner for the current stage plus a log line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: std::sync::Mutex<Instant>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: std::sync::Mutex::new(Instant::now()),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut t) = self.stage_started.lock() {
            *t = Instant::now();
        }
        self.bar
            .set_prefix(format!("[{}/{}]", stage.ordinal(), Stage::ALL.len()));
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage, summary: &str) {
        self.bar.println(format!(
            "  {} {:<22} {}  {}",
            green("✓"),
            stage.to_string(),
            dim(summary),
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let msg = if reason.chars().count() > 100 {
            let cut: String = reason.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} {:<22} {}", yellow("⚠"), stage.to_string(), yellow(&msg)));
    }

    fn on_query(&self, index: usize, planned: usize, query: &str) {
        self.bar
            .set_message(format!("evidence collection {index}/{planned}: {query}"));
    }

    fn on_run_complete(&self, success: bool) {
        self.bar.finish_and_clear();
        if !success {
            eprintln!("{} report generation failed", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default input (pdfs/document.pdf) and output (output/porter_report.pdf)
  porter-report

  # Explicit input and output
  porter-report annual_report.pdf -o output/acme.pdf

  # Local model through Ollama
  porter-report --provider ollama --model llama3:instruct report.pdf

  # Real web search instead of simulated results
  SERPAPI_KEY=... porter-report --search serpapi report.pdf

  # Reproducible run (fixed timestamp) with JSON summary
  porter-report --timestamp 2025-01-20T09:30:00Z --json report.pdf > run.json

  # Abort instead of degrading when extraction or collection fail
  porter-report --strict report.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SERPAPI_KEY             SerpAPI key for --search serpapi
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library)
"#;

/// Generate a Porter's Five Forces report from a company PDF.
#[derive(Parser, Debug)]
#[command(
    name = "porter-report",
    version,
    about = "Generate a Porter's Five Forces report from a company PDF",
    long_about = "Read a company document (local PDF or URL), extract the company profile with \
a language model, collect supporting web evidence, synthesize a Porter's Five Forces analysis \
and render it as a PDF.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(env = "PORTER_INPUT", default_value = DEFAULT_INPUT)]
    input: String,

    /// Where to write the rendered PDF.
    #[arg(short, long, env = "PORTER_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, llama3:instruct).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// Search backend for evidence collection.
    #[arg(long, env = "PORTER_SEARCH", value_enum, default_value = "stub")]
    search: SearchArg,

    /// Language of the report prose. Headings stay in English.
    #[arg(long, env = "PORTER_LANGUAGE", default_value = "English")]
    language: String,

    /// Minimum report length requested from the model, in characters.
    #[arg(long, env = "PORTER_MIN_CHARS", default_value_t = 10_000)]
    min_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PORTER_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PORTER_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Abort when metadata extraction or evidence collection fails.
    #[arg(long, env = "PORTER_STRICT")]
    strict: bool,

    /// Keep non-ASCII characters in the rendered PDF.
    #[arg(long, env = "PORTER_NO_ASCII")]
    no_ascii: bool,

    /// Fix the run timestamp (RFC 3339) for reproducible output.
    #[arg(long, env = "PORTER_TIMESTAMP")]
    timestamp: Option<DateTime<Utc>>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PORTER_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PORTER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-completion-call timeout in seconds.
    #[arg(long, env = "PORTER_API_TIMEOUT", default_value_t = 600)]
    api_timeout: u64,

    /// Per-search-query timeout in seconds.
    #[arg(long, env = "PORTER_SEARCH_TIMEOUT", default_value_t = 30)]
    search_timeout: u64,

    /// Output a JSON run summary (profile, evidence, stats, warnings) on stdout.
    #[arg(long, env = "PORTER_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PORTER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PORTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PORTER_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SearchArg {
    Stub,
    Serpapi,
}

impl From<SearchArg> for SearchBackend {
    fn from(v: SearchArg) -> Self {
        match v {
            SearchArg::Stub => SearchBackend::Stub,
            SearchArg::Serpapi => SearchBackend::SerpApi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep library logs
    // at ERROR while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ctrl-C cancels at the next external call ────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, cancel, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = generate_report(&config).await.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Report generation failed during {stage}"))
    })?;

    if cli.json {
        let audit = audit_report_structure(&output.report, config.min_report_chars);
        let summary = serde_json::json!({
            "output_path": output.output_path,
            "profile": output.profile,
            "queries": output.evidence.queries,
            "warnings": output.warnings,
            "stats": output.stats,
            "structure": audit,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  {} pages  {} evidence items  {}ms  →  {}",
            if output.is_degraded() {
                yellow("⚠")
            } else {
                green("✔")
            },
            bold(output.profile.display_name()),
            output.stats.rendered_pages,
            output.stats.evidence_items,
            output.stats.total_duration_ms,
            bold(&output.output_path.display().to_string()),
        );
        let audit = audit_report_structure(&output.report, config.min_report_chars);
        if !audit.is_complete() {
            eprintln!(
                "   {} report has {} chars (asked for {}); missing sections: {}",
                yellow("⚠"),
                audit.char_count,
                config.min_report_chars,
                if audit.missing_sections.is_empty() {
                    "none".to_string()
                } else {
                    audit.missing_sections.join(", ")
                }
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(
    cli: &Cli,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .input(cli.input.clone())
        .output(cli.output.clone())
        .search_backend(cli.search.into())
        .report_language(cli.language.clone())
        .min_report_chars(cli.min_chars)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .strict(cli.strict)
        .charset(if cli.no_ascii {
            CharsetPolicy::Passthrough
        } else {
            CharsetPolicy::Ascii
        })
        .download_timeout_secs(cli.download_timeout)
        .completion_timeout_secs(cli.api_timeout)
        .search_timeout_secs(cli.search_timeout)
        .cancel_token(cancel);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ts) = cli.timestamp {
        builder = builder.timestamp(ts);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
