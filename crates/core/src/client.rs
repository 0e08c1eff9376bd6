//! HTTP access to the Guardian Content API and article pages.

use crate::config::{GuardianConfig, ScrapeConfig};
use crate::error::{NewsError, NewsResult};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde_json::Value;
use url::Url;

/// Query parameters for an upstream call, in the order they are sent.
pub type QueryParams = Vec<(&'static str, String)>;

/// Everything the query layer needs from the network.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `endpoint` (relative to the API base) and return the JSON payload.
    async fn get(&self, endpoint: &str, params: &QueryParams) -> NewsResult<Value>;

    /// GET an article page and return its HTML.
    async fn fetch_html(&self, url: &Url) -> NewsResult<String>;
}

/// reqwest-backed [`Upstream`] for the Guardian.
///
/// One round trip per call and no retries; the configured timeout bounds
/// each request.
#[derive(Debug, Clone)]
pub struct GuardianClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    user_agent: String,
}

impl GuardianClient {
    pub fn new(guardian: &GuardianConfig, scrape: &ScrapeConfig) -> NewsResult<Self> {
        let base_url = guardian
            .base_url()
            .map_err(|e| NewsError::validation(format!("{:#}", e)))?;

        let client = Client::builder()
            .timeout(guardian.timeout())
            .build()
            .map_err(|e| NewsError::RemoteUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: guardian.api_key.clone(),
            user_agent: scrape.user_agent.clone(),
        })
    }

    fn build_url(&self, endpoint: &str) -> NewsResult<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| NewsError::validation(format!("Invalid endpoint {}: {}", endpoint, e)))
    }

    /// Turn a non-success status into a rejection, keeping the upstream message.
    async fn check_status(response: Response) -> NewsResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(NewsError::from_response(status.as_u16(), &body))
    }
}

#[async_trait]
impl Upstream for GuardianClient {
    async fn get(&self, endpoint: &str, params: &QueryParams) -> NewsResult<Value> {
        let api_key = self.api_key.as_deref().ok_or(NewsError::MissingApiKey)?;
        let url = self.build_url(endpoint)?;
        tracing::debug!(url = %url, params = ?params, "GET request");

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("api-key", api_key)])
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body = response.text().await?;

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| NewsError::InvalidResponse(format!("body is not JSON: {}", e)))?;
        if payload.get("response").is_none() {
            return Err(NewsError::InvalidResponse(
                "missing `response` envelope".to_string(),
            ));
        }

        Ok(payload)
    }

    async fn fetch_html(&self, url: &Url) -> NewsResult<String> {
        tracing::debug!(url = %url, "Fetching article page");

        let response = self
            .client
            .get(url.as_str())
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(response.text().await?)
    }
}
