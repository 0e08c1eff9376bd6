pub mod meta;
pub mod news;
mod registry;

pub use meta::{HealthTool, ToolDefinitionsTool};
pub use news::{
    GetFullArticleTextTool, GetNewsTrendTool, GetRelatedTopicsTool, GetSectionsTool, SearchNewsTool,
};
pub use registry::{
    json_schema_date, json_schema_integer, json_schema_object, json_schema_string, parse_args,
    to_json, Tool, ToolRegistry,
};

use guardian_news_core::NewsService;
use std::sync::Arc;

/// Registry with every Guardian news tool, `get_tool_definitions` last.
pub fn news_registry(service: Arc<NewsService>, api_key: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(HealthTool::new(Arc::clone(&service), api_key)));
    registry.register(Arc::new(SearchNewsTool::new(Arc::clone(&service))));
    registry.register(Arc::new(GetSectionsTool::new(Arc::clone(&service))));
    registry.register(Arc::new(GetFullArticleTextTool::new(Arc::clone(&service))));
    registry.register(Arc::new(GetNewsTrendTool::new(Arc::clone(&service))));
    registry.register(Arc::new(GetRelatedTopicsTool::new(service)));

    let definitions = ToolDefinitionsTool::new(registry.list_schemas());
    registry.register(Arc::new(definitions));
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use guardian_news_core::{GuardianClient, NewsCaches, NewsConfig, NewsService};
    use std::sync::Arc;

    /// Service whose Guardian API and scrape host both point at `base_url`.
    pub fn service_for(base_url: &str) -> Arc<NewsService> {
        let mut config = NewsConfig::default();
        config.guardian.base_url = base_url.to_string();
        config.guardian.api_key = Some("test-key".to_string());
        config.scrape.allowed_hosts = vec!["theguardian.com".to_string(), "127.0.0.1".to_string()];

        let client = GuardianClient::new(&config.guardian, &config.scrape).unwrap();
        let caches = Arc::new(NewsCaches::new(&config.cache));
        Arc::new(NewsService::new(Arc::new(client), caches, &config))
    }
}
