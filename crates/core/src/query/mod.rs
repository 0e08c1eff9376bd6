//! Cache-backed query operations over the Guardian API.
//!
//! Every operation validates its input first (validation failures never touch
//! the cache or the network), then consults its own cache store, and only on
//! a miss calls the upstream, normalizes the payload and stores the result.
//! Upstream failures are returned as-is and never cached.

mod topics;
mod trend;

pub use topics::rank_topics;
pub use trend::{month_buckets, MonthBucket};

use crate::cache::{normalize_text, CacheKey, NewsCaches};
use crate::client::{QueryParams, Upstream};
use crate::config::{NewsConfig, QueryConfig};
use crate::error::{NewsError, NewsResult};
use crate::extract::extract_body;
use crate::normalize::{parse_search, parse_sections};
use crate::types::{ArticleText, SearchResults, Section};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Parameters of a keyword search, as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub page_size: Option<i64>,
    pub section: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn date_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_date = Some(from.into());
        self.to_date = Some(to.into());
        self
    }
}

/// A search after normalization and bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidatedSearch {
    query: QueryText,
    page_size: u32,
    section: Option<String>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

impl ValidatedSearch {
    fn cache_key(&self) -> CacheKey {
        CacheKey::builder("search")
            .text("q", &self.query.normalized)
            .value("page_size", self.page_size)
            .optional_text("section", self.section.as_deref())
            .optional_value("from_date", self.from_date)
            .optional_value("to_date", self.to_date)
            .build()
    }

    /// Optional filters are only sent when present.
    fn params(&self) -> QueryParams {
        let mut params = vec![
            ("q", self.query.upstream.clone()),
            ("page-size", self.page_size.to_string()),
            ("show-fields", "headline,trailText".to_string()),
            ("show-tags", "keyword".to_string()),
        ];
        if let Some(section) = &self.section {
            params.push(("section", section.clone()));
        }
        if let Some(from) = self.from_date {
            params.push(("from-date", from.to_string()));
        }
        if let Some(to) = self.to_date {
            params.push(("to-date", to.to_string()));
        }
        params
    }
}

/// Query layer over an [`Upstream`] and a set of [`NewsCaches`].
pub struct NewsService {
    upstream: Arc<dyn Upstream>,
    caches: Arc<NewsCaches>,
    limits: QueryConfig,
    allowed_hosts: Vec<String>,
}

impl NewsService {
    pub fn new(upstream: Arc<dyn Upstream>, caches: Arc<NewsCaches>, config: &NewsConfig) -> Self {
        Self {
            upstream,
            caches,
            limits: config.query.clone(),
            allowed_hosts: config
                .scrape
                .allowed_hosts
                .iter()
                .map(|host| host.trim().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn caches(&self) -> &NewsCaches {
        &self.caches
    }

    pub fn limits(&self) -> &QueryConfig {
        &self.limits
    }

    /// Keyword search with optional section and date filters.
    pub async fn search(&self, request: &SearchRequest) -> NewsResult<Arc<SearchResults>> {
        let search = self.validate_search(request)?;
        let key = search.cache_key();

        if let Some(hit) = self.caches.search.get(&key) {
            tracing::debug!(query = %search.query.normalized, "Search served from cache");
            return Ok(hit);
        }

        let payload = self.upstream.get("search", &search.params()).await?;
        let results = Arc::new(parse_search(payload)?);

        self.caches.search.put(key, Arc::clone(&results));
        tracing::debug!(
            query = %search.query.normalized,
            articles = results.articles.len(),
            "Search fetched from upstream"
        );
        Ok(results)
    }

    /// All Guardian sections.
    pub async fn list_sections(&self) -> NewsResult<Arc<Vec<Section>>> {
        let key = CacheKey::builder("sections").build();

        if let Some(hit) = self.caches.sections.get(&key) {
            tracing::debug!("Sections served from cache");
            return Ok(hit);
        }

        let payload = self.upstream.get("sections", &Vec::new()).await?;
        let sections = Arc::new(parse_sections(payload)?);

        self.caches.sections.put(key, Arc::clone(&sections));
        tracing::debug!(sections = sections.len(), "Sections fetched from upstream");
        Ok(sections)
    }

    /// Scrape the body text of an article on an allow-listed host.
    pub async fn fetch_article_text(&self, url: &str) -> NewsResult<Arc<ArticleText>> {
        let url = self.validate_article_url(url)?;
        let key = CacheKey::builder("article_text").value("url", &url).build();

        if let Some(hit) = self.caches.article_text.get(&key) {
            tracing::debug!(url = %url, "Article text served from cache");
            return Ok(hit);
        }

        let html = self.upstream.fetch_html(&url).await?;
        let body = extract_body(&html)?;
        let article = Arc::new(ArticleText {
            url: url.to_string(),
            text: body.text(),
            paragraphs: body.paragraphs.len(),
        });

        self.caches.article_text.put(key, Arc::clone(&article));
        tracing::debug!(url = %url, paragraphs = article.paragraphs, "Article text scraped");
        Ok(article)
    }

    fn validate_search(&self, request: &SearchRequest) -> NewsResult<ValidatedSearch> {
        let query = required_query(&request.query)?;
        let page_size = clamp_page_size(
            request.page_size,
            self.limits.default_page_size,
            self.limits.max_page_size,
        );
        let section = request
            .section
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());
        let from_date = optional_date("from_date", request.from_date.as_deref())?;
        let to_date = optional_date("to_date", request.to_date.as_deref())?;

        if let (Some(from), Some(to)) = (from_date, to_date) {
            if from > to {
                return Err(NewsError::validation(format!(
                    "from_date {} is after to_date {}",
                    from, to
                )));
            }
        }

        Ok(ValidatedSearch {
            query,
            page_size,
            section,
            from_date,
            to_date,
        })
    }

    fn validate_article_url(&self, raw: &str) -> NewsResult<Url> {
        let mut url = Url::parse(raw.trim())
            .map_err(|e| NewsError::validation(format!("invalid URL {:?}: {}", raw, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(NewsError::validation(format!(
                "only http and https URLs can be fetched, got {}",
                url.scheme()
            )));
        }

        let host = url.host_str().unwrap_or_default().to_lowercase();
        if !self.is_host_allowed(&host) {
            return Err(NewsError::validation(format!(
                "host {:?} is not allowed; allowed hosts: {}",
                host,
                self.allowed_hosts.join(", ")
            )));
        }

        url.set_fragment(None);
        Ok(url)
    }

    fn is_host_allowed(&self, host: &str) -> bool {
        !host.is_empty()
            && self
                .allowed_hosts
                .iter()
                .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }
}

/// A caller's query: as sent upstream and as used in cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryText {
    /// Whitespace collapsed, case kept (the Guardian's `AND`/`OR`/`NOT` are upper case).
    upstream: String,
    normalized: String,
}

/// Split a required query into its upstream and cache forms, rejecting blank input.
fn required_query(raw: &str) -> NewsResult<QueryText> {
    let upstream = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if upstream.is_empty() {
        return Err(NewsError::validation("query must not be empty"));
    }
    Ok(QueryText {
        normalized: normalize_text(&upstream),
        upstream,
    })
}

/// Clamp a caller page size into `[1, max]`, substituting `default` when absent.
fn clamp_page_size(requested: Option<i64>, default: u32, max: u32) -> u32 {
    let max = max.max(1);
    match requested {
        Some(size) => size.clamp(1, i64::from(max)) as u32,
        None => default.clamp(1, max),
    }
}

pub(crate) fn parse_date(field: &str, value: &str) -> NewsResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        NewsError::validation(format!(
            "{} must be a date in YYYY-MM-DD format, got {:?}",
            field, value
        ))
    })
}

/// Blank optional dates count as absent.
fn optional_date(field: &str, value: Option<&str>) -> NewsResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::client::GuardianClient;
    use crate::config::StoreConfig;

    /// Service pointed at a mock server, which is also allowed for scraping.
    pub fn service_for(base_url: &str) -> NewsService {
        service_with(base_url, |_| {})
    }

    pub fn service_with(base_url: &str, tweak: impl FnOnce(&mut NewsConfig)) -> NewsService {
        let mut config = NewsConfig::default();
        config.guardian.base_url = base_url.to_string();
        config.guardian.api_key = Some("test-key".to_string());
        config.scrape.allowed_hosts = vec!["theguardian.com".to_string(), "127.0.0.1".to_string()];
        tweak(&mut config);

        let client = GuardianClient::new(&config.guardian, &config.scrape).unwrap();
        let caches = Arc::new(NewsCaches::new(&config.cache));
        NewsService::new(Arc::new(client), caches, &config)
    }

    /// Service over a scripted upstream, for tests that pause the clock.
    pub fn service_over(upstream: Arc<FakeUpstream>) -> NewsService {
        let config = NewsConfig::default();
        let caches = Arc::new(NewsCaches::new(&config.cache));
        NewsService::new(upstream, caches, &config)
    }

    type Responder = Box<dyn Fn(&str, &QueryParams) -> NewsResult<serde_json::Value> + Send + Sync>;

    /// In-process [`Upstream`] that records every call and answers from a closure.
    pub struct FakeUpstream {
        calls: std::sync::Mutex<Vec<(String, QueryParams)>>,
        respond: Responder,
    }

    impl FakeUpstream {
        pub fn new(
            respond: impl Fn(&str, &QueryParams) -> NewsResult<serde_json::Value> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: std::sync::Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        pub fn calls(&self) -> Vec<(String, QueryParams)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Upstream for FakeUpstream {
        async fn get(&self, endpoint: &str, params: &QueryParams) -> NewsResult<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.to_string(), params.clone()));
            (self.respond)(endpoint, params)
        }

        async fn fetch_html(&self, url: &Url) -> NewsResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), Vec::new()));
            Ok(String::new())
        }
    }

    /// Value of `name` in a recorded call's parameters.
    pub fn param<'a>(params: &'a QueryParams, name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn small_store() -> StoreConfig {
        StoreConfig::new(2, 300)
    }

    pub fn search_payload(results: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "response": {"status": "ok", "total": 100, "results": results}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn one_article() -> serde_json::Value {
        search_payload(serde_json::json!([{
            "webUrl": "https://www.theguardian.com/environment/2024/jan/15/story",
            "webTitle": "Climate story",
            "fields": {"headline": "Climate story", "trailText": "Summary"}
        }]))
    }

    #[tokio::test]
    async fn test_equivalent_searches_share_one_upstream_call() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "climate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());

        let first = service.search(&SearchRequest::new(" climate ")).await.unwrap();
        let second = service.search(&SearchRequest::new("Climate")).await.unwrap();

        assert_eq!(first.articles.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.caches().search.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_search_clamps_page_size() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page-size", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page-size", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        service.search(&SearchRequest::new("x").page_size(999)).await.unwrap();
        service.search(&SearchRequest::new("x").page_size(-3)).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_default_page_size_and_omitted_filters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page-size", "5"))
            .and(query_param("show-fields", "headline,trailText"))
            .and(query_param_is_missing("section"))
            .and(query_param_is_missing("from-date"))
            .and(query_param_is_missing("to-date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let request = SearchRequest {
            query: "x".to_string(),
            section: Some("  ".to_string()),
            from_date: Some(String::new()),
            ..Default::default()
        };
        service.search(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_sends_filters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("section", "technology"))
            .and(query_param("from-date", "2023-10-01"))
            .and(query_param("to-date", "2023-10-27"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let request = SearchRequest::new("ai")
            .section("Technology")
            .date_range("2023-10-01", "2023-10-27");
        service.search(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_validation_precedes_network() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(0)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());

        for request in [
            SearchRequest::new("   "),
            SearchRequest::new("x").date_range("2023-10-27", "2023-10-01"),
            SearchRequest::new("x").date_range("27/10/2023", "2023-11-01"),
        ] {
            let err = service.search(&request).await.unwrap_err();
            assert_eq!(err.kind(), "validation_error", "{:?}", request);
        }

        assert!(service.caches().search.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_refetches_after_ttl() {
        let upstream = FakeUpstream::new(|_, _| Ok(one_article()));
        let service = service_over(upstream.clone());
        let request = SearchRequest::new("climate");

        service.search(&request).await.unwrap();
        service.search(&request).await.unwrap();
        assert_eq!(upstream.call_count(), 1);

        tokio::time::advance(Duration::from_secs(300)).await;
        service.search(&request).await.unwrap();
        assert_eq!(upstream.call_count(), 1, "still fresh at exactly the TTL");

        tokio::time::advance(Duration::from_secs(1)).await;
        service.search(&request).await.unwrap();
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let request = SearchRequest::new("climate");

        let err = service.search(&request).await.unwrap_err();
        assert!(matches!(err, NewsError::RemoteRejected { status: 503, .. }));
        assert!(service.caches().search.is_empty());

        let results = service.search(&request).await.unwrap();
        assert_eq!(results.articles.len(), 1);
    }

    #[tokio::test]
    async fn test_sections_are_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"results": [{"id": "world", "webTitle": "World news"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let first = service.list_sections().await.unwrap();
        let second = service.list_sections().await.unwrap();

        assert_eq!(first[0].id, "world");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_search_eviction_does_not_touch_sections() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_article()))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"results": [{"id": "world", "webTitle": "World news"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_with(&server.uri(), |config| config.cache.search = small_store());
        service.list_sections().await.unwrap();

        for query in ["a", "b", "c", "d", "e"] {
            service.search(&SearchRequest::new(query)).await.unwrap();
        }

        assert_eq!(service.caches().search.len(), 2);
        assert_eq!(service.caches().sections.len(), 1);
        service.list_sections().await.unwrap();
    }

    #[tokio::test]
    async fn test_article_text_rejects_foreign_host_without_network() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());

        for url in [
            "https://evil.example.com/story",
            "https://theguardian.com.evil.net/story",
            "ftp://www.theguardian.com/story",
            "not a url",
        ] {
            let err = service.fetch_article_text(url).await.unwrap_err();
            assert_eq!(err.kind(), "validation_error", "{}", url);
        }
    }

    #[test]
    fn test_subdomains_of_allowed_hosts_pass() {
        let service = service_for("http://127.0.0.1:1");

        assert!(service.is_host_allowed("www.theguardian.com"));
        assert!(service.is_host_allowed("theguardian.com"));
        assert!(!service.is_host_allowed("nottheguardian.com"));
        assert!(!service.is_host_allowed(""));
    }

    #[tokio::test]
    async fn test_article_text_is_scraped_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/world/2024/jan/01/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div data-gu-name="body"><p>One.</p><p>Two.</p></div></body></html>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let url = format!("{}/world/2024/jan/01/story", server.uri());

        let first = service.fetch_article_text(&url).await.unwrap();
        let second = service
            .fetch_article_text(&format!("{}#comments", url))
            .await
            .unwrap();

        assert_eq!(first.text, "One.\nTwo.");
        assert_eq!(first.paragraphs, 2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_article_without_body_fails_extraction() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/live/blank"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><nav>Menu</nav></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let err = service
            .fetch_article_text(&format!("{}/live/blank", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "extraction_failed");
        assert!(service.caches().article_text.is_empty());
    }

    #[tokio::test]
    async fn test_query_case_reaches_upstream_but_not_cache_key() {
        let upstream = FakeUpstream::new(|_, _| Ok(search_payload(serde_json::json!([]))));
        let service = service_over(upstream.clone());

        service
            .search(&SearchRequest::new("  Brexit   AND EU "))
            .await
            .unwrap();
        service.search(&SearchRequest::new("brexit and eu")).await.unwrap();

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(param(&calls[0].1, "q"), Some("Brexit AND EU"));
        assert_eq!(service.caches().search.stats().hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_searches_fill_cache_without_holding_locks() {
        let config = NewsConfig::default();
        let caches = Arc::new(NewsCaches::new(&config.cache));

        // Reading the stores from inside the fetch would deadlock if a store
        // lock were held across the upstream call.
        let observed = Arc::clone(&caches);
        let upstream = FakeUpstream::new(move |_, _| {
            assert!(observed.search.len() <= 8);
            let _ = observed.sections.stats();
            std::thread::sleep(Duration::from_millis(5));
            Ok(search_payload(serde_json::json!([])))
        });
        let service = Arc::new(NewsService::new(upstream.clone(), Arc::clone(&caches), &config));

        for _wave in 0..2 {
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        service
                            .search(&SearchRequest::new(format!("topic {}", i)))
                            .await
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }
        }

        assert_eq!(caches.search.len(), 8);
        assert_eq!(upstream.call_count(), 8);
        assert_eq!(caches.search.stats().hits, 8);
        assert!(caches.sections.is_empty());
        assert!(caches.trend.is_empty());
        assert!(caches.related_topics.is_empty());
        assert!(caches.article_text.is_empty());
    }

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(None, 5, 50), 5);
        assert_eq!(clamp_page_size(Some(999), 5, 50), 50);
        assert_eq!(clamp_page_size(Some(0), 5, 50), 1);
        assert_eq!(clamp_page_size(Some(-10), 5, 50), 1);
        assert_eq!(clamp_page_size(Some(20), 5, 50), 20);
    }
}
