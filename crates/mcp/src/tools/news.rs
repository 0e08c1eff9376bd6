// Guardian news tools backed by the cached query layer

use crate::protocol::ToolSchema;
use crate::tools::{
    json_schema_date, json_schema_integer, json_schema_object, json_schema_string, parse_args,
    to_json, Tool,
};
use guardian_news_core::{NewsResult, NewsService, SearchRequest};
use serde::Deserialize;
use std::sync::Arc;

/// Keyword search with optional section and date filters
pub struct SearchNewsTool {
    service: Arc<NewsService>,
}

impl SearchNewsTool {
    pub const NAME: &'static str = "search_news_tool";

    pub fn new(service: Arc<NewsService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchNewsArgs {
    query: String,
    page_size: Option<i64>,
    section: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
}

#[async_trait::async_trait]
impl Tool for SearchNewsTool {
    fn schema(&self) -> ToolSchema {
        let limits = self.service.limits();
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Search The Guardian for recent articles matching an English keyword. \
                          Supports section and date filtering."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("News keyword to search for (e.g. 'AI', 'technology', 'politics')"),
                    "page_size": json_schema_integer(
                        "Number of articles to return",
                        limits.default_page_size,
                        1,
                        limits.max_page_size,
                    ),
                    "section": json_schema_string("Restrict results to a section id (e.g. 'technology', 'world')"),
                    "from_date": json_schema_date("Earliest publication date (YYYY-MM-DD)"),
                    "to_date": json_schema_date("Latest publication date (YYYY-MM-DD)")
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let args: SearchNewsArgs = parse_args(Self::NAME, arguments)?;

        let request = SearchRequest {
            query: args.query,
            page_size: args.page_size,
            section: args.section,
            from_date: args.from_date,
            to_date: args.to_date,
        };
        let results = self.service.search(&request).await?;
        to_json(&*results)
    }
}

/// List every section the Guardian API knows about
pub struct GetSectionsTool {
    service: Arc<NewsService>,
}

impl GetSectionsTool {
    pub const NAME: &'static str = "get_sections_tool";

    pub fn new(service: Arc<NewsService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[async_trait::async_trait]
impl Tool for GetSectionsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "List all news sections available from The Guardian API.".to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let NoArgs {} = parse_args(Self::NAME, arguments)?;
        let sections = self.service.list_sections().await?;
        Ok(serde_json::json!({ "sections": to_json(&*sections)? }))
    }
}

/// Scrape the body text of a Guardian article
pub struct GetFullArticleTextTool {
    service: Arc<NewsService>,
}

impl GetFullArticleTextTool {
    pub const NAME: &'static str = "get_full_article_text_tool";

    pub fn new(service: Arc<NewsService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArticleTextArgs {
    url: String,
}

#[async_trait::async_trait]
impl Tool for GetFullArticleTextTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Fetch the full body text of an article given its URL.".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "url": json_schema_string("Full URL of the article")
                }),
                vec!["url"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let args: ArticleTextArgs = parse_args(Self::NAME, arguments)?;
        let article = self.service.fetch_article_text(&args.url).await?;
        to_json(&*article)
    }
}

/// Monthly article counts for a keyword
pub struct GetNewsTrendTool {
    service: Arc<NewsService>,
}

impl GetNewsTrendTool {
    pub const NAME: &'static str = "get_news_trend_tool";

    pub fn new(service: Arc<NewsService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewsTrendArgs {
    query: String,
    start_date: String,
    end_date: String,
}

#[async_trait::async_trait]
impl Tool for GetNewsTrendTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: format!(
                "Count articles matching a keyword per calendar month between two dates \
                 (at most {} months).",
                self.service.limits().trend_max_months
            ),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("News keyword to count"),
                    "start_date": json_schema_date("First day of the range (YYYY-MM-DD)"),
                    "end_date": json_schema_date("Last day of the range, inclusive (YYYY-MM-DD)")
                }),
                vec!["query", "start_date", "end_date"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let args: NewsTrendArgs = parse_args(Self::NAME, arguments)?;
        let trend = self
            .service
            .compute_trend(&args.query, &args.start_date, &args.end_date)
            .await?;
        to_json(&*trend)
    }
}

/// Tags most frequently attached to recent articles for a keyword
pub struct GetRelatedTopicsTool {
    service: Arc<NewsService>,
}

impl GetRelatedTopicsTool {
    pub const NAME: &'static str = "get_related_topics_tool";

    pub fn new(service: Arc<NewsService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelatedTopicsArgs {
    query: String,
    page_size: Option<i64>,
}

#[async_trait::async_trait]
impl Tool for GetRelatedTopicsTool {
    fn schema(&self) -> ToolSchema {
        let limits = self.service.limits();
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Rank the keyword tags attached to the newest articles for a keyword."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("News keyword to analyze"),
                    "page_size": json_schema_integer(
                        "Number of recent articles to sample",
                        limits.related_default_page_size,
                        1,
                        limits.related_max_page_size,
                    )
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let args: RelatedTopicsArgs = parse_args(Self::NAME, arguments)?;
        let related = self
            .service
            .compute_related_topics(&args.query, args.page_size)
            .await?;
        to_json(&*related)
    }
}
