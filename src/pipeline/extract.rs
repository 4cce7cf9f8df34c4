//! Metadata extraction: document text → [`CompanyProfile`].
//!
//! The model is asked for a bare JSON object but often wraps it in prose or
//! a markdown fence. Parsing is therefore a two-step contract:
//!
//! 1. **Strict**: the whole (fence-stripped) response decodes as the schema.
//! 2. **Fallback**: decode the greedy slice from the first `{` to the last
//!    `}` in the response.
//!
//! Fields of the wrong JSON type are dropped one by one (see
//! [`CompanyProfile`]); only a response with no decodable object fails.
//! If both steps fail the extraction failed. [`extract_company_profile`] turns
//! every failure into an empty profile; [`try_extract_company_profile`]
//! reports it so the caller can choose.

use crate::completion::{CompletionRequest, CompletionService};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::CompanyProfile;
use crate::pipeline::{char_prefix, guarded};
use crate::progress::Stage;
use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Remove one markdown code fence wrapping the whole response, if present.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    RE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// Greedy `{ … }` slice: first opening brace to last closing brace.
fn brace_slice(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Decode a model response into a profile.
///
/// Never panics; returns [`ReportError::MalformedMetadata`] when no JSON
/// object can be decoded.
pub fn parse_profile_response(response: &str) -> Result<CompanyProfile, ReportError> {
    let body = strip_code_fence(response);

    if let Ok(profile) = decode_object(body) {
        return Ok(profile.normalised());
    }

    let slice = brace_slice(body).ok_or_else(|| ReportError::MalformedMetadata {
        detail: "no JSON object in response".to_string(),
    })?;

    decode_object(slice)
        .map(CompanyProfile::normalised)
        .map_err(|detail| ReportError::MalformedMetadata { detail })
}

/// Decode `json` as a profile only if it is a JSON object.
fn decode_object(json: &str) -> Result<CompanyProfile, String> {
    match serde_json::from_str::<Value>(json).map_err(|e| e.to_string())? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(|e| e.to_string()),
        _ => Err("response is not a JSON object".to_string()),
    }
}

/// Extract a profile, reporting every failure.
pub async fn try_extract_company_profile(
    text: &str,
    service: &dyn CompletionService,
    config: &ReportConfig,
) -> Result<CompanyProfile, ReportError> {
    let excerpt = char_prefix(text, config.extraction_char_limit);
    debug!(
        "Extraction excerpt: {} of {} chars",
        excerpt.chars().count(),
        text.chars().count()
    );

    let request = CompletionRequest::new(extraction_prompt(excerpt), config)
        .with_system(EXTRACTION_SYSTEM_PROMPT);

    let response = guarded(
        Stage::Extract,
        config.completion_timeout_secs,
        &config.cancel,
        async {
            service
                .complete(&request)
                .await
                .map_err(|e| ReportError::CompletionService {
                    stage: Stage::Extract,
                    message: e.to_string(),
                })
        },
    )
    .await?;

    let profile = parse_profile_response(&response)?;
    info!(
        "Extracted profile: name={:?}, {} domains, {} competitors",
        profile.name,
        profile.business_domains.len(),
        profile.mentioned_competitors.len()
    );
    Ok(profile)
}

/// Extract a profile; any failure degrades to an empty profile.
pub async fn extract_company_profile(
    text: &str,
    service: &dyn CompletionService,
    config: &ReportConfig,
) -> CompanyProfile {
    match try_extract_company_profile(text, service, config).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Metadata extraction failed, continuing with an empty profile: {e}");
            CompanyProfile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ACME: &str = r#"{"company_name": "Acme Corp", "business_domains": ["cloud", "security"], "primary_sector": "IT", "country": "France", "mentioned_competitors": ["Contoso"]}"#;

    struct Scripted {
        answer: Result<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn ok(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                answer: Err(msg.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.prompt.clone());
            self.answer
                .clone()
                .map_err(CompletionError::ApiRequestFailed)
        }
    }

    #[test]
    fn parses_bare_json() {
        let p = parse_profile_response(ACME).unwrap();
        assert_eq!(p.name.as_deref(), Some("Acme Corp"));
        assert_eq!(p.business_domains, vec!["cloud", "security"]);
        assert_eq!(p.mentioned_competitors, vec!["Contoso"]);
    }

    #[test]
    fn parses_with_leading_prose() {
        let response = format!("Here is the extracted data:\n{ACME}");
        let p = parse_profile_response(&response).unwrap();
        assert_eq!(p.country.as_deref(), Some("France"));
    }

    #[test]
    fn parses_with_trailing_prose() {
        let response = format!("{ACME}\n\nLet me know if you need anything else.");
        let p = parse_profile_response(&response).unwrap();
        assert_eq!(p.primary_sector.as_deref(), Some("IT"));
    }

    #[test]
    fn parses_fenced_json() {
        let response = format!("```json\n{ACME}\n```");
        let p = parse_profile_response(&response).unwrap();
        assert_eq!(p.name.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn no_json_is_malformed_not_panic() {
        let err = parse_profile_response("I could not find a company.").unwrap_err();
        assert!(matches!(err, ReportError::MalformedMetadata { .. }));
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = parse_profile_response(r#"{"company_name": "Acme", }"#).unwrap_err();
        assert!(matches!(err, ReportError::MalformedMetadata { .. }));
        let err = parse_profile_response("} backwards {").unwrap_err();
        assert!(matches!(err, ReportError::MalformedMetadata { .. }));
    }

    #[test]
    fn wrong_field_types_keep_the_company_name() {
        let response = r#"{"company_name": "Acme Corp", "business_domains": ["cloud"], "primary_sector": "IT", "country": ["France", "Belgium"], "mentioned_competitors": []}"#;
        let p = parse_profile_response(response).unwrap();
        assert_eq!(p.name.as_deref(), Some("Acme Corp"));
        assert_eq!(p.business_domains, vec!["cloud"]);
        assert!(p.country.is_none());

        let response = r#"Sure: {"company_name": "Acme Corp", "business_domains": ["cloud", null]}"#;
        let p = parse_profile_response(response).unwrap();
        assert_eq!(p.name.as_deref(), Some("Acme Corp"));
        assert_eq!(p.business_domains, vec!["cloud"]);
    }

    #[test]
    fn non_object_json_is_malformed() {
        let err = parse_profile_response(r#"["Acme Corp", "cloud"]"#).unwrap_err();
        assert!(matches!(err, ReportError::MalformedMetadata { .. }));
        let err = parse_profile_response(r#""Acme Corp""#).unwrap_err();
        assert!(matches!(err, ReportError::MalformedMetadata { .. }));
    }

    #[test]
    fn object_inside_array_is_recovered_by_the_brace_slice() {
        let p = parse_profile_response(r#"[{"company_name": "Acme"}]"#).unwrap();
        assert_eq!(p.name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn truncates_text_before_submission() {
        let service = Scripted::ok(ACME);
        let config = ReportConfig::builder()
            .extraction_char_limit(10)
            .build()
            .unwrap();
        let text = format!("0123456789{}", "X".repeat(500));
        extract_company_profile(&text, &service, &config).await;

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("0123456789"));
        assert!(!seen[0].contains('X'));
    }

    #[tokio::test]
    async fn service_failure_degrades_to_empty_profile() {
        let service = Scripted::failing("connection refused");
        let config = ReportConfig::default();
        let profile = extract_company_profile("Acme Corp", &service, &config).await;
        assert!(profile.is_empty());

        let err = try_extract_company_profile("Acme Corp", &service, &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::CompletionService {
                stage: Stage::Extract,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn prose_only_response_degrades_to_empty_profile() {
        let service = Scripted::ok("Sorry, no company here.");
        let profile =
            extract_company_profile("text", &service, &ReportConfig::default()).await;
        assert_eq!(profile, CompanyProfile::default());
    }
}
