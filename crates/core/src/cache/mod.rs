//! Per-kind in-memory caches sitting in front of the Guardian API.
//!
//! Each data kind gets its own [`TtlLruStore`] with independent capacity and
//! TTL, so churn in one store (e.g. a burst of distinct searches) can never
//! evict or expire entries in another.

mod key;
mod store;

pub use key::{normalize_text, CacheKey, CacheKeyBuilder};
pub use store::{CacheEntry, StoreStats, TtlLruStore};

use crate::config::CacheConfig;
use crate::types::{ArticleText, NewsTrend, RelatedTopics, SearchResults, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The data kinds that get their own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Search,
    Sections,
    ArticleText,
    Trend,
    RelatedTopics,
}

impl CacheKind {
    pub const ALL: [CacheKind; 5] = [
        CacheKind::Search,
        CacheKind::Sections,
        CacheKind::ArticleText,
        CacheKind::Trend,
        CacheKind::RelatedTopics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Sections => "sections",
            Self::ArticleText => "article_text",
            Self::Trend => "trend",
            Self::RelatedTopics => "related_topics",
        }
    }
}

/// All cache stores used by the query layer.
///
/// Constructed once at startup and handed to the service; tests build their
/// own isolated instance per case.
pub struct NewsCaches {
    pub search: TtlLruStore<Arc<SearchResults>>,
    pub sections: TtlLruStore<Arc<Vec<Section>>>,
    pub article_text: TtlLruStore<Arc<ArticleText>>,
    pub trend: TtlLruStore<Arc<NewsTrend>>,
    pub related_topics: TtlLruStore<Arc<RelatedTopics>>,
}

impl NewsCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            search: TtlLruStore::new(CacheKind::Search.as_str(), config.search),
            sections: TtlLruStore::new(CacheKind::Sections.as_str(), config.sections),
            article_text: TtlLruStore::new(CacheKind::ArticleText.as_str(), config.article_text),
            trend: TtlLruStore::new(CacheKind::Trend.as_str(), config.trend),
            related_topics: TtlLruStore::new(
                CacheKind::RelatedTopics.as_str(),
                config.related_topics,
            ),
        }
    }

    pub fn stats(&self, kind: CacheKind) -> StoreStats {
        match kind {
            CacheKind::Search => self.search.stats(),
            CacheKind::Sections => self.sections.stats(),
            CacheKind::ArticleText => self.article_text.stats(),
            CacheKind::Trend => self.trend.stats(),
            CacheKind::RelatedTopics => self.related_topics.stats(),
        }
    }

    pub fn all_stats(&self) -> BTreeMap<CacheKind, StoreStats> {
        CacheKind::ALL
            .iter()
            .map(|kind| (*kind, self.stats(*kind)))
            .collect()
    }
}

impl Default for NewsCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
