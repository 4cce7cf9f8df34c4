//! Report synthesis: document text + profile + evidence → one long-form report.
//!
//! The heading skeleton and minimum length are requested in the prompt only.
//! The response is returned verbatim; [`audit_report_structure`] can check
//! it afterwards but never rejects it.

use crate::completion::{CompletionRequest, CompletionService};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::{CompanyProfile, EvidenceBundle, SynthesizedReport};
use crate::pipeline::{char_prefix, guarded};
use crate::progress::Stage;
use crate::prompts::{synthesis_prompt, SynthesisInputs, REPORT_SECTIONS, SYNTHESIS_SYSTEM_PROMPT};
use serde::Serialize;
use tracing::{debug, info, warn};

fn to_json<T: Serialize>(value: &T) -> Result<String, ReportError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ReportError::Internal(format!("Failed to serialise synthesis input: {e}")))
}

/// Assemble the synthesis prompt from the three upstream inputs.
///
/// The document text is cut to `synthesis_text_limit` characters and the
/// serialised evidence to `evidence_char_budget` characters. The evidence cut
/// may land mid-JSON; the model reads it as text.
pub fn build_synthesis_prompt(
    original_text: &str,
    profile: &CompanyProfile,
    evidence: &EvidenceBundle,
    config: &ReportConfig,
) -> Result<String, ReportError> {
    let profile_json = to_json(profile)?;
    let evidence_json = to_json(evidence)?;
    let domains = profile.domains_joined();

    let inputs = SynthesisInputs {
        company_name: profile.display_name(),
        domains: &domains,
        profile_json: &profile_json,
        document_excerpt: char_prefix(original_text, config.synthesis_text_limit),
        evidence_json: char_prefix(&evidence_json, config.evidence_char_budget),
        min_chars: config.min_report_chars,
        language: &config.report_language,
    };
    Ok(synthesis_prompt(&inputs))
}

/// Produce the report. Every failure is returned; there is no fallback report.
pub async fn synthesize_report(
    original_text: &str,
    profile: &CompanyProfile,
    evidence: &EvidenceBundle,
    service: &dyn CompletionService,
    config: &ReportConfig,
) -> Result<SynthesizedReport, ReportError> {
    let prompt = build_synthesis_prompt(original_text, profile, evidence, config)?;
    debug!("Synthesis prompt: {} chars", prompt.chars().count());

    let request = CompletionRequest::new(prompt, config).with_system(SYNTHESIS_SYSTEM_PROMPT);

    let response = guarded(
        Stage::Synthesize,
        config.completion_timeout_secs,
        &config.cancel,
        async {
            service
                .complete(&request)
                .await
                .map_err(|e| ReportError::CompletionService {
                    stage: Stage::Synthesize,
                    message: e.to_string(),
                })
        },
    )
    .await?;

    let report = SynthesizedReport::new(response);
    let audit = audit_report_structure(&report, config.min_report_chars);
    if audit.is_complete() {
        info!("Synthesized report: {} chars", audit.char_count);
    } else {
        warn!(
            "Synthesized report is incomplete: {} chars (asked for {}), {} missing sections",
            audit.char_count,
            config.min_report_chars,
            audit.missing_sections.len()
        );
    }
    Ok(report)
}

/// Result of checking a report against the requested skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureAudit {
    /// Mandated headings not found anywhere in the report.
    pub missing_sections: Vec<&'static str>,
    pub char_count: usize,
    pub meets_min_length: bool,
}

impl StructureAudit {
    pub fn is_complete(&self) -> bool {
        self.missing_sections.is_empty() && self.meets_min_length
    }
}

/// Check which mandated headings the report contains and whether it is long
/// enough. Advisory only.
pub fn audit_report_structure(report: &SynthesizedReport, min_chars: usize) -> StructureAudit {
    let text = report.as_str();
    let missing_sections = REPORT_SECTIONS
        .iter()
        .copied()
        .filter(|heading| !text.contains(heading))
        .collect();
    let char_count = report.char_count();
    StructureAudit {
        missing_sections,
        char_count,
        meets_min_length: char_count >= min_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Answers with the prompt it was given.
    struct Echo;

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(request.prompt.clone())
        }
    }

    struct Down;

    #[async_trait]
    impl CompletionService for Down {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            Err(CompletionError::ApiRequestFailed("503 Service Unavailable".into()))
        }
    }

    fn acme() -> CompanyProfile {
        CompanyProfile {
            name: Some("Acme Corp".into()),
            business_domains: vec!["cloud".into(), "security".into()],
            mentioned_competitors: vec!["Contoso".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn echoed_prompt_contains_every_heading() {
        let config = ReportConfig::default();
        let evidence = EvidenceBundle::empty(Utc::now());
        let report = synthesize_report("Acme text", &acme(), &evidence, &Echo, &config)
            .await
            .unwrap();

        let audit = audit_report_structure(&report, 0);
        assert!(audit.missing_sections.is_empty(), "{:?}", audit.missing_sections);
        assert!(report.as_str().contains("# PORTER FIVE FORCES ANALYSIS - Acme Corp"));
    }

    #[test]
    fn prompt_respects_text_and_evidence_budgets() {
        let config = ReportConfig::builder()
            .synthesis_text_limit(5)
            .evidence_char_budget(20)
            .build()
            .unwrap();
        let evidence = EvidenceBundle::empty(Utc::now());
        let full_evidence = serde_json::to_string_pretty(&evidence).unwrap();
        let prompt =
            build_synthesis_prompt("ABCDEFGHIJ", &acme(), &evidence, &config).unwrap();

        assert!(prompt.contains("ABCDE"));
        assert!(!prompt.contains("ABCDEF"));
        assert!(prompt.contains(char_prefix(&full_evidence, 20)));
        assert!(!prompt.contains(&full_evidence));
    }

    #[test]
    fn empty_profile_uses_fallback_name() {
        let prompt = build_synthesis_prompt(
            "",
            &CompanyProfile::default(),
            &EvidenceBundle::failed("company name missing", Utc::now()),
            &ReportConfig::default(),
        )
        .unwrap();
        assert!(prompt.contains("# PORTER FIVE FORCES ANALYSIS - Company"));
    }

    #[tokio::test]
    async fn completion_failure_is_fatal() {
        let err = synthesize_report(
            "text",
            &acme(),
            &EvidenceBundle::empty(Utc::now()),
            &Down,
            &ReportConfig::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.stage(), Stage::Synthesize);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn audit_reports_missing_sections_and_length() {
        let report = SynthesizedReport::new("## EXECUTIVE SUMMARY\nShort.");
        let audit = audit_report_structure(&report, 10_000);
        assert_eq!(audit.missing_sections.len(), REPORT_SECTIONS.len() - 1);
        assert!(!audit.meets_min_length);
        assert!(!audit.is_complete());
    }
}
