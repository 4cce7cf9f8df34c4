//! Configuration types for a report-generation run.
//!
//! All behaviour is controlled through [`ReportConfig`], built via its
//! [`ReportConfigBuilder`]. The collaborators the pipeline talks to
//! (completion backend, search provider, document loader) can be injected
//! here too, which is how tests run the whole pipeline without a network.

use crate::completion::CompletionService;
use crate::error::ReportError;
use crate::pipeline::load::DocumentLoader;
use crate::progress::ProgressCallback;
use crate::search::SearchProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default source document location.
pub const DEFAULT_INPUT: &str = "pdfs/document.pdf";

/// Default rendered report location.
pub const DEFAULT_OUTPUT: &str = "output/porter_report.pdf";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use porter_report::ReportConfig;
///
/// let config = ReportConfig::builder()
///     .input("pdfs/acme.pdf")
///     .output("output/acme.pdf")
///     .provider_name("ollama")
///     .model("llama3:instruct")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Source PDF: local path or HTTP/HTTPS URL. Default: `pdfs/document.pdf`.
    pub input: String,

    /// Rendered PDF path. Parent directories are created on demand.
    pub output: PathBuf,

    /// LLM model identifier. If None, the provider's default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed completion backend. Takes precedence over `provider_name`.
    pub completion: Option<Arc<dyn CompletionService>>,

    /// Which search backend to build when `search` is None.
    pub search_backend: SearchBackend,

    /// Pre-constructed search provider. Takes precedence over `search_backend`.
    pub search: Option<Arc<dyn SearchProvider>>,

    /// Pre-constructed document loader. Default: pdfium.
    pub loader: Option<Arc<dyn DocumentLoader>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// The synthesis prompt asks for at least `min_report_chars` characters;
    /// 8192 tokens leaves headroom for that on every provider we target.
    pub max_tokens: usize,

    /// Characters of document text sent to the metadata extractor. Default: 8000.
    pub extraction_char_limit: usize,

    /// Characters of document text quoted in the synthesis prompt. Default: 4000.
    pub synthesis_text_limit: usize,

    /// Characters of serialised evidence quoted in the synthesis prompt. Default: 3000.
    pub evidence_char_budget: usize,

    /// Minimum report size requested from the model. Default: 10 000.
    pub min_report_chars: usize,

    /// Business domains queried, first N only. Default: 3.
    pub max_domain_queries: usize,

    /// Competitors queried, first N only. Default: 4.
    pub max_competitor_queries: usize,

    /// Result ceilings per query category.
    pub result_limits: ResultLimits,

    /// Language the report prose is written in. Headings stay verbatim.
    pub report_language: String,

    /// Character-set policy applied by the renderer. Default: ASCII.
    pub charset: CharsetPolicy,

    /// Abort instead of degrading when extraction or collection fails. Default: false.
    pub strict: bool,

    /// Pin the run timestamp (queries, bundle metadata, title block) for
    /// reproducible output. Default: current time.
    pub timestamp: Option<DateTime<Utc>>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Document text extraction timeout in seconds. Default: 60.
    pub load_timeout_secs: u64,

    /// Per-completion-call timeout in seconds. Default: 600.
    pub completion_timeout_secs: u64,

    /// Per-search-query timeout in seconds. Default: 30.
    pub search_timeout_secs: u64,

    /// PDF rendering timeout in seconds. Default: 60.
    pub render_timeout_secs: u64,

    /// Cancels the run at the next external call boundary.
    pub cancel: CancellationToken,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            model: None,
            provider_name: None,
            completion: None,
            search_backend: SearchBackend::default(),
            search: None,
            loader: None,
            temperature: 0.2,
            max_tokens: 8192,
            extraction_char_limit: 8000,
            synthesis_text_limit: 4000,
            evidence_char_budget: 3000,
            min_report_chars: 10_000,
            max_domain_queries: 3,
            max_competitor_queries: 4,
            result_limits: ResultLimits::default(),
            report_language: "English".to_string(),
            charset: CharsetPolicy::default(),
            strict: false,
            timestamp: None,
            password: None,
            download_timeout_secs: 120,
            load_timeout_secs: 60,
            completion_timeout_secs: 600,
            search_timeout_secs: 30,
            render_timeout_secs: 60,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("completion", &self.completion.as_ref().map(|_| "<dyn CompletionService>"))
            .field("search_backend", &self.search_backend)
            .field("search", &self.search.as_ref().map(|s| s.name().to_string()))
            .field("loader", &self.loader.as_ref().map(|_| "<dyn DocumentLoader>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("extraction_char_limit", &self.extraction_char_limit)
            .field("synthesis_text_limit", &self.synthesis_text_limit)
            .field("evidence_char_budget", &self.evidence_char_budget)
            .field("min_report_chars", &self.min_report_chars)
            .field("max_domain_queries", &self.max_domain_queries)
            .field("max_competitor_queries", &self.max_competitor_queries)
            .field("result_limits", &self.result_limits)
            .field("report_language", &self.report_language)
            .field("charset", &self.charset)
            .field("strict", &self.strict)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pinned timestamp, or now.
    pub fn run_timestamp(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// Builder for [`ReportConfig`].
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl fmt::Debug for ReportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReportConfigBuilder {
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.config.input = input.into();
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn completion(mut self, service: Arc<dyn CompletionService>) -> Self {
        self.config.completion = Some(service);
        self
    }

    pub fn search_backend(mut self, backend: SearchBackend) -> Self {
        self.config.search_backend = backend;
        self
    }

    pub fn search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.config.search = Some(provider);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.config.loader = Some(loader);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn extraction_char_limit(mut self, n: usize) -> Self {
        self.config.extraction_char_limit = n;
        self
    }

    pub fn synthesis_text_limit(mut self, n: usize) -> Self {
        self.config.synthesis_text_limit = n;
        self
    }

    pub fn evidence_char_budget(mut self, n: usize) -> Self {
        self.config.evidence_char_budget = n;
        self
    }

    pub fn min_report_chars(mut self, n: usize) -> Self {
        self.config.min_report_chars = n;
        self
    }

    pub fn max_domain_queries(mut self, n: usize) -> Self {
        self.config.max_domain_queries = n;
        self
    }

    pub fn max_competitor_queries(mut self, n: usize) -> Self {
        self.config.max_competitor_queries = n;
        self
    }

    pub fn result_limits(mut self, limits: ResultLimits) -> Self {
        self.config.result_limits = limits;
        self
    }

    pub fn report_language(mut self, language: impl Into<String>) -> Self {
        self.config.report_language = language.into();
        self
    }

    pub fn charset(mut self, policy: CharsetPolicy) -> Self {
        self.config.charset = policy;
        self
    }

    pub fn strict(mut self, v: bool) -> Self {
        self.config.strict = v;
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.config.timestamp = Some(ts);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs;
        self
    }

    pub fn completion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.completion_timeout_secs = secs;
        self
    }

    pub fn search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.search_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.cancel = token;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.input.trim().is_empty() {
            return Err(ReportError::InvalidConfig("input must not be empty".into()));
        }
        if c.output.as_os_str().is_empty() {
            return Err(ReportError::InvalidConfig("output must not be empty".into()));
        }
        for (name, value) in [
            ("extraction_char_limit", c.extraction_char_limit),
            ("synthesis_text_limit", c.synthesis_text_limit),
            ("evidence_char_budget", c.evidence_char_budget),
            ("max_tokens", c.max_tokens),
        ] {
            if value == 0 {
                return Err(ReportError::InvalidConfig(format!("{name} must be ≥ 1")));
            }
        }
        for (name, secs) in [
            ("download_timeout_secs", c.download_timeout_secs),
            ("load_timeout_secs", c.load_timeout_secs),
            ("completion_timeout_secs", c.completion_timeout_secs),
            ("search_timeout_secs", c.search_timeout_secs),
            ("render_timeout_secs", c.render_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ReportError::InvalidConfig(format!("{name} must be ≥ 1")));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the renderer treats characters the builtin PDF fonts cannot show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharsetPolicy {
    /// Decompose (NFKD) and keep printable ASCII only. Accented letters lose
    /// their accent, everything else outside ASCII is dropped. (default)
    #[default]
    Ascii,
    /// Render text as-is, for writers whose fonts cover wider character sets.
    Passthrough,
}

/// Which search backend the collector uses when none is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchBackend {
    /// Fixed, deterministic simulated results. (default)
    #[default]
    Stub,
    /// Google results through SerpAPI; requires `SERPAPI_KEY`.
    SerpApi,
}

/// Per-query result ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLimits {
    pub official: usize,
    pub social: usize,
    pub industry: usize,
    pub competitor: usize,
}

impl Default for ResultLimits {
    fn default() -> Self {
        Self {
            official: 5,
            social: 5,
            industry: 4,
            competitor: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ReportConfig::default();
        assert_eq!(c.input, DEFAULT_INPUT);
        assert_eq!(c.extraction_char_limit, 8000);
        assert_eq!(c.synthesis_text_limit, 4000);
        assert_eq!(c.evidence_char_budget, 3000);
        assert_eq!(c.max_domain_queries, 3);
        assert_eq!(c.max_competitor_queries, 4);
        assert_eq!(c.result_limits.competitor, 10);
        assert_eq!(c.charset, CharsetPolicy::Ascii);
        assert!(!c.strict);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ReportConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_zero_limits() {
        let err = ReportConfig::builder()
            .evidence_char_budget(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("evidence_char_budget"));

        let err = ReportConfig::builder()
            .completion_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("completion_timeout_secs"));
    }

    #[test]
    fn pinned_timestamp_is_used() {
        let ts = DateTime::parse_from_rfc3339("2025-01-20T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let c = ReportConfig::builder().timestamp(ts).build().unwrap();
        assert_eq!(c.run_timestamp(), ts);
    }
}
