//! Evidence collection: a bounded set of search queries about the company.
//!
//! At most `2 + min(max_domain_queries, domains) + min(max_competitor_queries,
//! competitors)` queries are issued (9 with the defaults), one after the
//! other. Each result is tagged with the category of the query that found it
//! and, for domain and competitor queries, the domain or competitor name.
//!
//! A failing query is logged and recorded as an empty result set; it never
//! fails the collection. Results are not deduplicated across categories.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::{CompanyProfile, EvidenceBundle, EvidenceCategory, EvidenceItem, QueryRecord};
use crate::pipeline::guarded;
use crate::progress::Stage;
use crate::search::{SearchHit, SearchProvider};
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

/// One query the collector will issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub category: EvidenceCategory,
    pub query: String,
    pub associated: Option<String>,
    pub max_results: usize,
}

/// Build the query plan for `profile`.
///
/// Fails with [`ReportError::EvidenceCollection`] when the profile has no
/// company name.
pub fn plan_queries(
    profile: &CompanyProfile,
    config: &ReportConfig,
    at: DateTime<Utc>,
) -> Result<Vec<PlannedQuery>, ReportError> {
    let name = profile
        .name
        .as_deref()
        .ok_or_else(|| ReportError::EvidenceCollection {
            detail: "company name not found in profile".to_string(),
        })?;

    let year = at.year();
    let month_year = at.format("%B %Y");
    let limits = &config.result_limits;

    let mut plan = vec![
        PlannedQuery {
            category: EvidenceCategory::Official,
            query: format!("{name} official website news {year}"),
            associated: None,
            max_results: limits.official,
        },
        PlannedQuery {
            category: EvidenceCategory::Social,
            query: format!("{name} linkedin company news updates"),
            associated: None,
            max_results: limits.social,
        },
    ];

    plan.extend(
        profile
            .business_domains
            .iter()
            .take(config.max_domain_queries)
            .map(|domain| PlannedQuery {
                category: EvidenceCategory::Industry,
                query: format!("{domain} news market trends {month_year}"),
                associated: Some(domain.clone()),
                max_results: limits.industry,
            }),
    );

    plan.extend(
        profile
            .mentioned_competitors
            .iter()
            .take(config.max_competitor_queries)
            .map(|competitor| PlannedQuery {
                category: EvidenceCategory::Competitor,
                query: format!("\"{competitor}\" news {year} strategy"),
                associated: Some(competitor.clone()),
                max_results: limits.competitor,
            }),
    );

    Ok(plan)
}

fn to_item(hit: SearchHit, planned: &PlannedQuery) -> EvidenceItem {
    let (associated_domain, associated_competitor) = match planned.category {
        EvidenceCategory::Industry => (planned.associated.clone(), None),
        EvidenceCategory::Competitor => (None, planned.associated.clone()),
        EvidenceCategory::Official | EvidenceCategory::Social => (None, None),
    };
    EvidenceItem {
        title: hit.title,
        snippet: hit.snippet,
        url: hit.url,
        published_date: hit.date,
        source: hit.source,
        category: planned.category,
        associated_domain,
        associated_competitor,
    }
}

/// Collect evidence, reporting the fail-fast case as an error.
///
/// Individual query failures still degrade silently (see module docs);
/// only a missing company name or cancellation returns `Err`.
pub async fn try_collect_evidence(
    profile: &CompanyProfile,
    search: &dyn SearchProvider,
    config: &ReportConfig,
) -> Result<EvidenceBundle, ReportError> {
    let at = config.run_timestamp();
    let plan = plan_queries(profile, config, at)?;
    let planned = plan.len();
    info!("Collecting evidence: {} queries via {}", planned, search.name());

    let mut bundle = EvidenceBundle::empty(at);
    bundle.company = profile.name.clone();
    bundle.queried_domains = profile.business_domains.clone();
    bundle.queried_competitors = profile.mentioned_competitors.clone();

    for (i, query) in plan.iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_query(i + 1, planned, &query.query);
        }

        let outcome = guarded(
            Stage::Collect,
            config.search_timeout_secs,
            &config.cancel,
            search.search(&query.query, query.max_results),
        )
        .await;

        let (hits, error) = match outcome {
            Ok(hits) => (hits, None),
            Err(e @ ReportError::Cancelled { .. }) => return Err(e),
            Err(e) => {
                warn!("Query '{}' failed: {}", query.query, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        debug!("Query '{}' → {} results", query.query, hits.len());
        bundle.queries.push(QueryRecord {
            category: query.category,
            query: query.query.clone(),
            associated: query.associated.clone(),
            result_count: hits.len(),
            error,
        });

        let items = hits.into_iter().map(|h| to_item(h, query));
        match query.category {
            EvidenceCategory::Official => bundle.official_results.extend(items),
            EvidenceCategory::Social => bundle.social_results.extend(items),
            EvidenceCategory::Industry => bundle.industry_results.extend(items),
            EvidenceCategory::Competitor => bundle.competitor_results.extend(items),
        }
    }

    info!(
        "Collected {} evidence items from {} queries",
        bundle.total_items(),
        bundle.query_count()
    );
    Ok(bundle)
}

/// Collect evidence; the fail-fast case degrades to an error-tagged empty bundle.
pub async fn collect_evidence(
    profile: &CompanyProfile,
    search: &dyn SearchProvider,
    config: &ReportConfig,
) -> EvidenceBundle {
    match try_collect_evidence(profile, search, config).await {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!("Evidence collection skipped: {e}");
            EvidenceBundle::failed(e.to_string(), config.run_timestamp())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::StubSearchProvider;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-20T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn profile(domains: usize, competitors: usize) -> CompanyProfile {
        CompanyProfile {
            name: Some("Acme Corp".into()),
            business_domains: (1..=domains).map(|i| format!("domain{i}")).collect(),
            mentioned_competitors: (1..=competitors).map(|i| format!("rival{i}")).collect(),
            ..Default::default()
        }
    }

    /// Records every query and fails the ones containing `fail_on`.
    #[derive(Default)]
    struct Recording {
        queries: Mutex<Vec<(String, usize)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SearchProvider for Recording {
        async fn search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchHit>, ReportError> {
            self.queries
                .lock()
                .unwrap()
                .push((query.to_string(), max_results));
            if self.fail_on.is_some_and(|f| query.contains(f)) {
                return Err(ReportError::SearchFailed {
                    query: query.to_string(),
                    detail: "HTTP 503".into(),
                });
            }
            StubSearchProvider.search(query, max_results).await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn plan_is_capped_at_nine() {
        let config = ReportConfig::default();
        let plan = plan_queries(&profile(5, 6), &config, at()).unwrap();
        assert_eq!(plan.len(), 2 + 3 + 4);
    }

    #[test]
    fn plan_follows_profile_size_below_caps() {
        let config = ReportConfig::default();
        for (d, c) in [(0, 0), (1, 0), (2, 1), (3, 4)] {
            let plan = plan_queries(&profile(d, c), &config, at()).unwrap();
            assert_eq!(plan.len(), 2 + d.min(3) + c.min(4), "domains={d} competitors={c}");
        }
    }

    #[test]
    fn plan_phrasing_and_limits() {
        let config = ReportConfig::default();
        let plan = plan_queries(&profile(1, 1), &config, at()).unwrap();
        assert_eq!(plan[0].query, "Acme Corp official website news 2025");
        assert_eq!(plan[0].max_results, 5);
        assert_eq!(plan[1].query, "Acme Corp linkedin company news updates");
        assert_eq!(plan[2].query, "domain1 news market trends January 2025");
        assert_eq!(plan[2].max_results, 4);
        assert_eq!(plan[3].query, "\"rival1\" news 2025 strategy");
        assert_eq!(plan[3].max_results, 10);
    }

    #[test]
    fn plan_without_name_fails() {
        let err = plan_queries(&CompanyProfile::default(), &ReportConfig::default(), at())
            .unwrap_err();
        assert!(matches!(err, ReportError::EvidenceCollection { .. }));
    }

    #[tokio::test]
    async fn results_are_tagged_by_origin() {
        let config = ReportConfig::builder().timestamp(at()).build().unwrap();
        let bundle = try_collect_evidence(&profile(2, 1), &StubSearchProvider, &config)
            .await
            .unwrap();

        assert_eq!(bundle.query_count(), 5);
        assert_eq!(bundle.official_results.len(), 2);
        assert_eq!(bundle.industry_results.len(), 4);
        assert!(bundle
            .industry_results
            .iter()
            .all(|i| i.category == EvidenceCategory::Industry && i.associated_domain.is_some()));
        assert!(bundle.competitor_results.iter().all(|i| {
            i.associated_competitor.as_deref() == Some("rival1") && i.associated_domain.is_none()
        }));
        assert_eq!(bundle.collected_at, at());
        assert_eq!(bundle.company.as_deref(), Some("Acme Corp"));
    }

    #[tokio::test]
    async fn failing_query_is_recorded_not_fatal() {
        let search = Recording {
            fail_on: Some("linkedin"),
            ..Default::default()
        };
        let config = ReportConfig::builder().timestamp(at()).build().unwrap();
        let bundle = try_collect_evidence(&profile(1, 0), &search, &config)
            .await
            .unwrap();

        assert_eq!(bundle.query_count(), 3);
        assert!(bundle.social_results.is_empty());
        let social = &bundle.queries[1];
        assert_eq!(social.result_count, 0);
        assert!(social.error.as_deref().unwrap().contains("HTTP 503"));
        assert_eq!(search.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_name_degrades_to_tagged_bundle() {
        let search = Recording::default();
        let config = ReportConfig::builder().timestamp(at()).build().unwrap();
        let bundle = collect_evidence(&CompanyProfile::default(), &search, &config).await;
        assert!(bundle.error.is_some());
        assert_eq!(bundle.total_items(), 0);
        assert!(search.queries.lock().unwrap().is_empty());
    }
}
