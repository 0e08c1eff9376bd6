use super::{clamp_page_size, required_query, NewsService};
use crate::cache::CacheKey;
use crate::error::NewsResult;
use crate::normalize::parse_search;
use crate::types::{Article, RelatedTopics, Topic};
use std::collections::HashMap;
use std::sync::Arc;

/// Count tags across `articles` and rank them by descending count.
///
/// Ties keep the order in which the tags were first seen while walking the
/// articles in sequence.
pub fn rank_topics(articles: &[Article]) -> Vec<Topic> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut topics: Vec<Topic> = Vec::new();

    for tag in articles.iter().flat_map(|article| article.tags.iter()) {
        match position.get(tag.id.as_str()) {
            Some(&index) => topics[index].count += 1,
            None => {
                position.insert(tag.id.as_str(), topics.len());
                topics.push(Topic {
                    id: tag.id.clone(),
                    name: tag.name.clone(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so first-seen order survives among equal counts
    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics
}

impl NewsService {
    /// Tags most often attached to the newest articles matching `query`.
    pub async fn compute_related_topics(
        &self,
        query: &str,
        page_size: Option<i64>,
    ) -> NewsResult<Arc<RelatedTopics>> {
        let query = required_query(query)?;
        let page_size = clamp_page_size(
            page_size,
            self.limits.related_default_page_size,
            self.limits.related_max_page_size,
        );

        let key = CacheKey::builder("related_topics")
            .text("q", &query.normalized)
            .value("page_size", page_size)
            .build();

        if let Some(hit) = self.caches.related_topics.get(&key) {
            tracing::debug!(query = %query.normalized, "Related topics served from cache");
            return Ok(hit);
        }

        let params = vec![
            ("q", query.upstream.clone()),
            ("page-size", page_size.to_string()),
            ("order-by", "newest".to_string()),
            ("show-tags", "keyword".to_string()),
        ];
        let payload = self.upstream.get("search", &params).await?;
        let results = parse_search(payload)?;

        let related = Arc::new(RelatedTopics {
            query: query.normalized,
            articles_analyzed: results.articles.len(),
            topics: rank_topics(&results.articles),
        });

        self.caches.related_topics.put(key, Arc::clone(&related));
        tracing::debug!(
            query = %related.query,
            topics = related.topics.len(),
            "Related topics computed"
        );
        Ok(related)
    }
}
