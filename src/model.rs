//! Data shapes handed from stage to stage.
//!
//! Each stage owns its output until it passes it on; nothing here is shared
//! or mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Placeholder used wherever a company name is needed but none was extracted.
pub const FALLBACK_COMPANY_NAME: &str = "Company";

/// Company metadata extracted from the source document.
///
/// Every field may be missing: a failed extraction yields
/// [`CompanyProfile::default()`] and downstream stages must cope with it.
/// The serde field names are the JSON schema the extraction prompt asks for.
/// Decoding is per field: a value of the wrong shape is dropped without
/// affecting its siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    #[serde(rename = "company_name", deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub business_domains: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub primary_sector: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub mentioned_competitors: Vec<String>,
}

impl CompanyProfile {
    /// True when extraction produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.business_domains.is_empty()
            && self.primary_sector.is_none()
            && self.country.is_none()
            && self.mentioned_competitors.is_empty()
    }

    /// The extracted name, or [`FALLBACK_COMPANY_NAME`].
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(FALLBACK_COMPANY_NAME)
    }

    /// Business domains joined with `", "`.
    pub fn domains_joined(&self) -> String {
        self.business_domains.join(", ")
    }

    /// Trim every field and drop blank values.
    ///
    /// Models frequently answer `"company_name": ""` or pad list entries
    /// with whitespace; both are treated as absent.
    pub fn normalised(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        fn clean_list(v: Vec<String>) -> Vec<String> {
            v.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            name: clean(self.name),
            business_domains: clean_list(self.business_domains),
            primary_sector: clean(self.primary_sector),
            country: clean(self.country),
            mentioned_competitors: clean_list(self.mentioned_competitors),
        }
    }
}

/// Anything but a JSON string becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Keep the string items of a list; a lone string is a one-item list and
/// any other shape (including `null`) is empty.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Which query produced an evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    /// The company's own web presence.
    Official,
    /// The company's social / professional profile.
    Social,
    /// News for one of the company's business domains.
    Industry,
    /// News about one named competitor.
    Competitor,
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvidenceCategory::Official => "official",
            EvidenceCategory::Social => "social",
            EvidenceCategory::Industry => "industry",
            EvidenceCategory::Competitor => "competitor",
        };
        f.write_str(name)
    }
}

/// One collected search result, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub title: String,
    pub snippet: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    pub source: String,
    pub category: EvidenceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_competitor: Option<String>,
}

/// One issued search query and how many results it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub category: EvidenceCategory,
    pub query: String,
    /// Domain or competitor the query was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated: Option<String>,
    pub result_count: usize,
    /// Set when the search provider failed; the query then counts as empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the evidence collector gathered for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub official_results: Vec<EvidenceItem>,
    pub social_results: Vec<EvidenceItem>,
    pub industry_results: Vec<EvidenceItem>,
    pub competitor_results: Vec<EvidenceItem>,
    pub collected_at: DateTime<Utc>,
    pub queried_domains: Vec<String>,
    pub queried_competitors: Vec<String>,
    pub queries: Vec<QueryRecord>,
    /// Set when collection could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvidenceBundle {
    /// An empty bundle tagged with `error`.
    pub fn failed(error: impl Into<String>, collected_at: DateTime<Utc>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(collected_at)
        }
    }

    pub fn empty(collected_at: DateTime<Utc>) -> Self {
        Self {
            company: None,
            official_results: Vec::new(),
            social_results: Vec::new(),
            industry_results: Vec::new(),
            competitor_results: Vec::new(),
            collected_at,
            queried_domains: Vec::new(),
            queried_competitors: Vec::new(),
            queries: Vec::new(),
            error: None,
        }
    }

    /// Total number of evidence items across all categories.
    pub fn total_items(&self) -> usize {
        self.official_results.len()
            + self.social_results.len()
            + self.industry_results.len()
            + self.competitor_results.len()
    }

    /// Number of result sets (one per issued query).
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Iterate over every item, official first, competitor last.
    pub fn items(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.official_results
            .iter()
            .chain(&self.social_results)
            .chain(&self.industry_results)
            .chain(&self.competitor_results)
    }
}

/// The synthesized long-form report, verbatim from the completion service.
///
/// Its heading structure is requested by the prompt but not enforced; see
/// [`crate::pipeline::synthesize::audit_report_structure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynthesizedReport(String);

impl SynthesizedReport {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for SynthesizedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
