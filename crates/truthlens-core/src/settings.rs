use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::search::{tavily::TavilyClient, SearchProvider};
use crate::verdict::{groq::GroqClient, ChatProvider};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// What a gateway does when its provider credential is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// Return a neutral, zero-confidence result and let the cycle complete.
    Neutral,
    /// Treat the gateway as unavailable.
    Fail,
}

impl MissingKeyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for MissingKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingKeyPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "fail" => Ok(Self::Fail),
            other => bail!("unknown missing-key policy `{other}` (expected `neutral` or `fail`)"),
        }
    }
}

/// Connection settings for one upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub missing_key: MissingKeyPolicy,
}

impl ProviderSettings {
    fn with_policy(missing_key: MissingKeyPolicy) -> Self {
        Self {
            api_key: None,
            endpoint: None,
            model: None,
            timeout_secs: None,
            missing_key,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Environment-driven configuration for the search and verdict providers.
///
/// Credentials are only ever read here, on the server side; nothing in the
/// crate ships them to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub search: ProviderSettings,
    pub verdict: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search: ProviderSettings::with_policy(MissingKeyPolicy::Fail),
            verdict: ProviderSettings::with_policy(MissingKeyPolicy::Neutral),
        }
    }
}

impl Settings {
    pub const SEARCH_KEY_ENV: &'static str = "TAVILY_API_KEY";
    pub const VERDICT_KEY_ENV: &'static str = "GROQ_API_KEY";
    pub const SEARCH_ENDPOINT_ENV: &'static str = "TRUTHLENS_SEARCH_ENDPOINT";
    pub const VERDICT_ENDPOINT_ENV: &'static str = "TRUTHLENS_VERDICT_ENDPOINT";
    pub const VERDICT_MODEL_ENV: &'static str = "TRUTHLENS_VERDICT_MODEL";
    pub const TIMEOUT_ENV: &'static str = "TRUTHLENS_TIMEOUT_SECS";
    pub const SEARCH_MISSING_KEY_ENV: &'static str = "TRUTHLENS_SEARCH_MISSING_KEY";
    pub const VERDICT_MISSING_KEY_ENV: &'static str = "TRUTHLENS_VERDICT_MISSING_KEY";

    /// Load settings from environment variables.
    ///
    /// * `TAVILY_API_KEY` / `GROQ_API_KEY` — provider secrets (optional; see
    ///   the missing-key policies).
    /// * `TRUTHLENS_SEARCH_MISSING_KEY` — `fail` (default) or `neutral`.
    /// * `TRUTHLENS_VERDICT_MISSING_KEY` — `neutral` (default) or `fail`.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    /// Build settings from an explicit variable map. Used by the CLI to layer
    /// file configuration underneath the process environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let timeout_secs = get(Self::TIMEOUT_ENV).and_then(|v| v.parse::<u64>().ok());

        let mut settings = Self::default();
        settings.search.api_key = get(Self::SEARCH_KEY_ENV);
        settings.search.endpoint = get(Self::SEARCH_ENDPOINT_ENV);
        settings.search.timeout_secs = timeout_secs;
        if let Some(policy) = get(Self::SEARCH_MISSING_KEY_ENV) {
            settings.search.missing_key = policy
                .parse()
                .with_context(|| format!("invalid {}", Self::SEARCH_MISSING_KEY_ENV))?;
        }

        settings.verdict.api_key = get(Self::VERDICT_KEY_ENV);
        settings.verdict.endpoint = get(Self::VERDICT_ENDPOINT_ENV);
        settings.verdict.model = get(Self::VERDICT_MODEL_ENV);
        settings.verdict.timeout_secs = timeout_secs;
        if let Some(policy) = get(Self::VERDICT_MISSING_KEY_ENV) {
            settings.verdict.missing_key = policy
                .parse()
                .with_context(|| format!("invalid {}", Self::VERDICT_MISSING_KEY_ENV))?;
        }

        Ok(settings)
    }

    /// Search client, or `None` when no search credential is configured.
    pub fn search_provider(&self) -> Result<Option<Arc<dyn SearchProvider>>> {
        if !self.search.has_key() {
            return Ok(None);
        }
        Ok(Some(Arc::new(TavilyClient::new(&self.search)?)))
    }

    /// Chat-completion client, or `None` when no model credential is configured.
    pub fn chat_provider(&self) -> Result<Option<Arc<dyn ChatProvider>>> {
        if !self.verdict.has_key() {
            return Ok(None);
        }
        Ok(Some(Arc::new(GroqClient::new(&self.verdict)?)))
    }
}
