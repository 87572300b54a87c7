use super::{SearchOptions, SearchProvider};
use crate::settings::ProviderSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com";

/// Client for the Tavily search API. The API key travels in the request body.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: Client,
    url: String,
    api_key: String,
}

impl TavilyClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        let Some(api_key) = api_key else {
            bail!("Tavily API key must be provided via TAVILY_API_KEY");
        };
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!("{}/search", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("truthlens/0.3")
            .timeout(settings.timeout())
            .build()
            .context("failed to build Tavily HTTP client")?;
        Ok(Self { http, url, api_key })
    }

    async fn post(&self, query: &str, options: &SearchOptions) -> Result<reqwest::Response> {
        let payload = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: &options.search_depth,
            include_answer: options.include_answer,
            max_results: options.max_results,
        };

        self.http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("failed to call Tavily search API")
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<serde_json::Value> {
        let response = self.post(query, options).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Tavily API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("failed to parse Tavily response")
    }

    async fn relay(&self, query: &str, options: &SearchOptions) -> Result<serde_json::Value> {
        let response = self.post(query, options).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Tavily answered with an error status; relaying body");
        }
        response
            .json()
            .await
            .context("failed to parse Tavily response")
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: u32,
}
