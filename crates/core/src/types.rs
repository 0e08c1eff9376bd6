//! Domain entities produced by the query layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A Guardian article as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Canonical web URL, doubles as the identifier.
    pub url: String,
    pub headline: String,
    pub summary: Option<String>,
    pub section: Option<ArticleSection>,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    /// Only populated by an explicit scrape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Section an article was published in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSection {
    pub id: String,
    pub name: String,
}

/// Guardian tag attached to an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Total matches upstream, not just this page.
    pub total: u64,
    pub articles: Vec<Article>,
}

/// A browsable Guardian section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
}

/// Body text scraped from an article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleText {
    pub url: String,
    pub text: String,
    pub paragraphs: usize,
}

/// Article count for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// `YYYY-MM`
    pub period: String,
    pub article_count: u64,
}

/// Month-bucketed article counts for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsTrend {
    pub query: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub points: Vec<TrendPoint>,
}

/// Tag frequency within an analyzed article sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub count: u32,
}

/// Ranked topics related to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTopics {
    pub query: String,
    pub articles_analyzed: usize,
    pub topics: Vec<Topic>,
}
