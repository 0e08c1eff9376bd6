//! Maps raw Guardian JSON payloads onto domain entities.

use crate::error::{NewsError, NewsResult};
use crate::types::{Article, ArticleSection, SearchResults, Section, Tag};
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    results: Vec<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    web_url: String,
    #[serde(default)]
    web_title: Option<String>,
    #[serde(default)]
    section_id: Option<String>,
    #[serde(default)]
    section_name: Option<String>,
    #[serde(default)]
    web_publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    fields: RawFields,
    #[serde(default)]
    tags: Vec<RawTag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFields {
    headline: Option<String>,
    trail_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTag {
    id: String,
    #[serde(default)]
    web_title: Option<String>,
    #[serde(rename = "type", default)]
    tag_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionsResponse {
    #[serde(default)]
    results: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSection {
    id: String,
    web_title: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    total: u64,
}

fn unwrap_envelope<T: DeserializeOwned>(payload: Value, what: &str) -> NewsResult<T> {
    serde_json::from_value::<Envelope<T>>(payload)
        .map(|envelope| envelope.response)
        .map_err(|e| NewsError::InvalidResponse(format!("unexpected {} payload: {}", what, e)))
}

/// Parse a `/search` payload.
pub fn parse_search(payload: Value) -> NewsResult<SearchResults> {
    let response: SearchResponse = unwrap_envelope(payload, "search")?;

    Ok(SearchResults {
        total: response.total,
        articles: response.results.into_iter().map(into_article).collect(),
    })
}

/// Parse a `/sections` payload.
pub fn parse_sections(payload: Value) -> NewsResult<Vec<Section>> {
    let response: SectionsResponse = unwrap_envelope(payload, "sections")?;

    Ok(response
        .results
        .into_iter()
        .map(|raw| Section {
            id: raw.id,
            title: raw.web_title,
        })
        .collect())
}

/// Read the total hit count from a `/search` payload.
pub fn parse_total(payload: Value) -> NewsResult<u64> {
    let response: CountResponse = unwrap_envelope(payload, "search count")?;
    Ok(response.total)
}

fn into_article(raw: RawContent) -> Article {
    let headline = raw
        .fields
        .headline
        .or(raw.web_title)
        .unwrap_or_default();

    let section = match (raw.section_id, raw.section_name) {
        (Some(id), Some(name)) => Some(ArticleSection { id, name }),
        (Some(id), None) => Some(ArticleSection {
            name: id.clone(),
            id,
        }),
        _ => None,
    };

    let tags = raw
        .tags
        .into_iter()
        .map(|tag| Tag {
            name: tag.web_title.unwrap_or_else(|| tag.id.clone()),
            id: tag.id,
            tag_type: tag.tag_type.unwrap_or_else(|| "keyword".to_string()),
        })
        .collect();

    Article {
        url: raw.web_url,
        headline,
        summary: raw.fields.trail_text.map(|t| strip_markup(&t)).filter(|t| !t.is_empty()),
        section,
        published_at: raw.web_publication_date,
        tags,
        body: None,
    }
}

/// Trail text arrives as an HTML fragment; keep only its text.
fn strip_markup(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text: String = parsed.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
