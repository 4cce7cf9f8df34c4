//! Web-search boundary used by the evidence collector.
//!
//! The collector only knows [`SearchProvider`]: a query and a result ceiling
//! in, a list of [`SearchHit`]s out. [`StubSearchProvider`] is the default and
//! returns fixed, deterministic results. [`SerpApiSearchProvider`] is an
//! optional real backend behind the same interface; pagination, quotas and
//! retries are deliberately not handled.

use crate::config::{ReportConfig, SearchBackend};
use crate::error::ReportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One raw search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub date: Option<String>,
    pub source: String,
}

/// A replaceable web-search capability.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return at most `max_results` hits for `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ReportError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Deterministic simulated search: same query, same answer, every time.
#[derive(Debug, Clone, Default)]
pub struct StubSearchProvider;

#[async_trait]
impl SearchProvider for StubSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ReportError> {
        let hits = vec![
            SearchHit {
                title: format!("Latest news - {query}"),
                snippet: "Recent information found on the web with detailed context...".into(),
                url: "https://example.com/news/article1".into(),
                date: Some("2025-01-15".into()),
                source: "Les Échos".into(),
            },
            SearchHit {
                title: format!("Sector analysis - {query}"),
                snippet: "In-depth study of market trends...".into(),
                url: "https://example.com/analysis/sector".into(),
                date: Some("2025-01-10".into()),
                source: "Reuters".into(),
            },
        ];
        Ok(hits.into_iter().take(max_results).collect())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Google results through SerpAPI (`SERPAPI_KEY`).
#[derive(Debug, Clone)]
pub struct SerpApiSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiSearchProvider {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReportError::InvalidConfig(format!("search client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: SERPAPI_ENDPOINT.to_string(),
        })
    }

    /// Build from `SERPAPI_KEY`; `None` when the variable is unset or empty.
    pub fn from_env(timeout_secs: u64) -> Option<Result<Self, ReportError>> {
        match std::env::var("SERPAPI_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key, timeout_secs)),
            _ => None,
        }
    }

    /// Point at a different endpoint (self-hosted proxy, test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    date: Option<String>,
    source: Option<String>,
}

impl From<SerpApiResult> for SearchHit {
    fn from(r: SerpApiResult) -> Self {
        let source = r
            .source
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| host_of(&r.link));
        SearchHit {
            title: r.title,
            snippet: r.snippet,
            url: r.link,
            date: r.date,
            source,
        }
    }
}

/// Host part of `url`, or `"web"` when it cannot be parsed.
fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "web".to_string())
}

#[async_trait]
impl SearchProvider for SerpApiSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ReportError> {
        let failed = |detail: String| ReportError::SearchFailed {
            query: query.to_string(),
            detail,
        };

        let num = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let body: SerpApiResponse = response.json().await.map_err(|e| failed(e.to_string()))?;
        if let Some(err) = body.error {
            return Err(failed(err));
        }

        debug!("SerpAPI: {} results for '{}'", body.organic_results.len(), query);
        Ok(body
            .organic_results
            .into_iter()
            .take(max_results)
            .map(SearchHit::from)
            .collect())
    }

    fn name(&self) -> &str {
        "serpapi"
    }
}

/// Resolve the search provider: the injected one, else the configured backend.
///
/// Selecting [`SearchBackend::SerpApi`] without `SERPAPI_KEY` is a setup error.
pub fn resolve_search_provider(
    config: &ReportConfig,
) -> Result<Arc<dyn SearchProvider>, ReportError> {
    if let Some(ref provider) = config.search {
        return Ok(Arc::clone(provider));
    }
    match config.search_backend {
        SearchBackend::Stub => Ok(Arc::new(StubSearchProvider)),
        SearchBackend::SerpApi => match SerpApiSearchProvider::from_env(config.search_timeout_secs) {
            Some(provider) => Ok(Arc::new(provider?)),
            None => Err(ReportError::InvalidConfig(
                "search backend 'serpapi' needs SERPAPI_KEY".to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer a single HTTP request with `status` and `body`; the handle
    /// yields the request line that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });
        (format!("http://{addr}/search.json"), handle)
    }

    fn serpapi(endpoint: String) -> SerpApiSearchProvider {
        SerpApiSearchProvider::new("test-key", 5)
            .unwrap()
            .with_endpoint(endpoint)
    }

    #[tokio::test]
    async fn serpapi_sends_query_and_caps_results() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"organic_results": [
                {"title": "one", "link": "https://www.reuters.com/a", "snippet": "s1", "source": "Reuters"},
                {"title": "two", "link": "https://example.org/b", "snippet": "s2"},
                {"title": "three", "link": "https://example.org/c", "snippet": "s3"}
            ]}"#,
        )
        .await;

        let hits = serpapi(endpoint).search("Acme news", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "Reuters");
        assert_eq!(hits[1].source, "example.org");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /search.json?"), "{request_line}");
        assert!(request_line.contains("engine=google"));
        assert!(request_line.contains("q=Acme+news"));
        assert!(request_line.contains("num=2"));
        assert!(request_line.contains("api_key=test-key"));
    }

    #[tokio::test]
    async fn serpapi_http_error_is_search_failed() {
        let (endpoint, _server) = serve_once("500 Internal Server Error", "{}").await;
        let err = serpapi(endpoint).search("Acme news", 5).await.unwrap_err();
        match err {
            ReportError::SearchFailed { query, detail } => {
                assert_eq!(query, "Acme news");
                assert!(detail.contains("500"), "{detail}");
            }
            other => panic!("expected SearchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn serpapi_error_body_is_search_failed() {
        let (endpoint, _server) = serve_once("200 OK", r#"{"error": "Invalid API key."}"#).await;
        let err = serpapi(endpoint).search("Acme news", 5).await.unwrap_err();
        assert!(
            matches!(err, ReportError::SearchFailed { ref detail, .. } if detail == "Invalid API key."),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn stub_is_deterministic_and_capped() {
        let stub = StubSearchProvider;
        let a = stub.search("Acme news", 5).await.unwrap();
        let b = stub.search("Acme news", 5).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert!(a[0].title.contains("Acme news"));

        let one = stub.search("Acme news", 1).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn resolver_defaults_to_stub_and_prefers_injected() {
        let config = ReportConfig::default();
        assert_eq!(resolve_search_provider(&config).unwrap().name(), "stub");

        let injected: Arc<dyn SearchProvider> = Arc::new(StubSearchProvider);
        let config = ReportConfig::builder()
            .search(injected)
            .search_backend(SearchBackend::SerpApi)
            .build()
            .unwrap();
        assert!(resolve_search_provider(&config).is_ok());
    }

    #[test]
    fn serpapi_result_falls_back_to_host_for_source() {
        let raw = SerpApiResult {
            title: "Contoso expands".into(),
            link: "https://www.reuters.com/markets/contoso".into(),
            snippet: "…".into(),
            date: Some("Jan 3, 2025".into()),
            source: None,
        };
        let hit = SearchHit::from(raw);
        assert_eq!(hit.source, "reuters.com");
        assert_eq!(hit.date.as_deref(), Some("Jan 3, 2025"));
    }

    #[test]
    fn serpapi_response_tolerates_missing_fields() {
        let json = r#"{"organic_results": [{"title": "t", "link": "not a url"}]}"#;
        let body: SerpApiResponse = serde_json::from_str(json).unwrap();
        let hit = SearchHit::from(body.organic_results.into_iter().next().unwrap());
        assert_eq!(hit.source, "web");
        assert!(hit.snippet.is_empty());
        assert!(hit.date.is_none());
    }
}
