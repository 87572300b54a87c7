use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::settings::MissingKeyPolicy;

pub mod tavily;

/// Domains whose results are marked as trusted evidence.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "dawn.com",
    "geo.tv",
    "bbc.com",
    "reuters.com",
    "aljazeera.com",
    "cnn.com",
    "nytimes.com",
    "tribune.com.pk",
    "thenews.com.pk",
    "apnews.com",
    "bloomberg.com",
    "gov.pk",
    "wikipedia.org",
    "un.org",
];

/// Longest query sent upstream, in characters.
pub const MAX_QUERY_CHARS: usize = 300;
const MAX_SNIPPET_CHARS: usize = 300;

/// Request knobs forwarded to the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search_depth: String,
    pub include_answer: bool,
    pub max_results: u32,
}

impl SearchOptions {
    /// Options used by the analysis pipeline.
    pub fn gateway() -> Self {
        Self {
            search_depth: "basic".into(),
            include_answer: false,
            max_results: 6,
        }
    }

    /// Options used by the `/search` proxy endpoint.
    pub fn proxy() -> Self {
        Self {
            search_depth: "basic".into(),
            include_answer: true,
            max_results: 3,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::gateway()
    }
}

/// Transport to a web-search backend. Returns the provider payload untouched so
/// proxies can relay it verbatim.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<serde_json::Value>;

    /// Like [`search`](Self::search), but hands back whatever JSON the backend
    /// answered with, error statuses included. Used by the `/search` relay.
    async fn relay(&self, query: &str, options: &SearchOptions) -> Result<serde_json::Value> {
        self.search(query, options).await
    }
}

/// One ranked search hit with its trust classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub snippet: String,
    pub published_date: Option<String>,
    pub trusted: bool,
}

/// Evidence gathered for a single analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBundle {
    /// Prompt-ready evidence block, headed by the current date.
    pub context: String,
    pub trusted_count: usize,
    pub sources: Vec<SearchResult>,
}

impl SearchBundle {
    /// Bundle with no hits, used when the provider found nothing.
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            context: format!("TODAY'S DATE: {}\nNo news found.", format_date(today)),
            trusted_count: 0,
            sources: Vec::new(),
        }
    }
}

/// Allow-list used to classify result URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedDomains(Vec<String>);

impl TrustedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(domains.into_iter().map(Into::into).collect())
    }

    /// Case-sensitive substring match of any listed domain against the URL.
    pub fn is_trusted(&self, url: &str) -> bool {
        self.0.iter().any(|domain| url.contains(domain.as_str()))
    }

    pub fn domains(&self) -> &[String] {
        &self.0
    }
}

impl Default for TrustedDomains {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_DOMAINS.iter().copied())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderPayload {
    #[serde(default)]
    results: Option<Vec<ProviderHit>>,
}

#[derive(Debug, Deserialize)]
struct ProviderHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

/// Turns a claim into a [`SearchBundle`], or `None` when no evidence could be fetched.
pub struct SearchGateway {
    provider: Option<Arc<dyn SearchProvider>>,
    missing_key: MissingKeyPolicy,
    trusted: TrustedDomains,
    options: SearchOptions,
}

impl SearchGateway {
    pub fn new(provider: Option<Arc<dyn SearchProvider>>) -> Self {
        Self {
            provider,
            missing_key: MissingKeyPolicy::Fail,
            trusted: TrustedDomains::default(),
            options: SearchOptions::gateway(),
        }
    }

    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn with_trusted_domains(mut self, trusted: TrustedDomains) -> Self {
        self.trusted = trusted;
        self
    }

    /// Query the provider once. Every failure collapses into `None`; a payload
    /// without a `results` field is a valid, empty bundle.
    #[instrument(name = "search_gateway", skip(self, claim), fields(claim_len = claim.len()))]
    pub async fn gather(&self, claim: &str, today: NaiveDate) -> Option<SearchBundle> {
        let Some(provider) = &self.provider else {
            return match self.missing_key {
                MissingKeyPolicy::Neutral => {
                    debug!("search credential missing; continuing without evidence");
                    Some(SearchBundle::empty(today))
                }
                MissingKeyPolicy::Fail => {
                    warn!("search credential missing; no evidence available");
                    None
                }
            };
        };

        let query = take_chars(claim, MAX_QUERY_CHARS);
        let payload = match provider.search(&query, &self.options).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "search provider request failed");
                return None;
            }
        };
        let payload: ProviderPayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "search provider returned an unexpected payload");
                return None;
            }
        };

        let bundle = build_bundle(
            payload.results.unwrap_or_default(),
            &self.trusted,
            today,
        );
        debug!(
            results = bundle.sources.len(),
            trusted = bundle.trusted_count,
            "search completed"
        );
        Some(bundle)
    }
}

fn build_bundle(hits: Vec<ProviderHit>, trusted: &TrustedDomains, today: NaiveDate) -> SearchBundle {
    if hits.is_empty() {
        return SearchBundle::empty(today);
    }

    let mut context = format!("TODAY'S DATE: {}\n\nSEARCH RESULTS:\n", format_date(today));
    let mut sources = Vec::with_capacity(hits.len());
    for hit in hits {
        let is_trusted = trusted.is_trusted(&hit.url);
        let title = hit.title.unwrap_or_default();
        let snippet = take_chars(hit.content.as_deref().unwrap_or_default(), MAX_SNIPPET_CHARS);
        let _ = writeln!(
            context,
            "- {label} Date: {date} | Title: \"{title}\" | Snippet: {snippet} (Source: {url})",
            label = if is_trusted { "[TRUSTED]" } else { "[GENERAL]" },
            date = hit.published_date.as_deref().unwrap_or("Unknown"),
            title = title,
            snippet = snippet,
            url = hit.url,
        );
        sources.push(SearchResult {
            domain: domain_of(&hit.url),
            title,
            url: hit.url,
            snippet,
            published_date: hit.published_date,
            trusted: is_trusted,
        });
    }

    SearchBundle {
        context,
        trusted_count: sources.iter().filter(|s| s.trusted).count(),
        sources,
    }
}

/// Long-form date used in the evidence header, e.g. `Monday, October 19, 2026`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.replacen("www.", "", 1)))
        .unwrap_or_else(|| url.to_string())
}

pub(crate) fn take_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}
