use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use truthlens_core::{
    proxy::DEFAULT_ANALYZE_MODEL, HeuristicScorer, Settings, TrustedDomains, DEFAULT_COOLDOWN,
    MAX_COOLDOWN,
};

pub const DEFAULT_BIND: &str = "127.0.0.1:8888";

/// Optional TOML configuration layered underneath the process environment.
///
/// Secrets are deliberately absent: provider keys only come from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub search: SearchSection,
    pub verdict: VerdictSection,
    pub heuristics: HeuristicsSection,
    pub session: SessionSection,
    pub server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: Option<String>,
    pub missing_key: Option<String>,
    pub trusted_domains: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerdictSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub missing_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HeuristicsSection {
    pub spam_phrases: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Human-readable duration such as `5s` or `1m 30s`.
    pub cooldown: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub model: Option<String>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Provider settings: file values first, then the real environment on top.
    pub fn settings(&self) -> Result<Settings> {
        let mut vars = self.env_defaults();
        vars.extend(std::env::vars());
        Settings::from_map(vars)
    }

    fn env_defaults(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                vars.insert(key.to_string(), value);
            }
        };
        put(Settings::SEARCH_ENDPOINT_ENV, self.search.endpoint.clone());
        put(Settings::SEARCH_MISSING_KEY_ENV, self.search.missing_key.clone());
        put(Settings::VERDICT_ENDPOINT_ENV, self.verdict.endpoint.clone());
        put(Settings::VERDICT_MODEL_ENV, self.verdict.model.clone());
        put(Settings::VERDICT_MISSING_KEY_ENV, self.verdict.missing_key.clone());
        put(
            Settings::TIMEOUT_ENV,
            self.session.timeout_secs.map(|secs| secs.to_string()),
        );
        vars
    }

    pub fn scorer(&self) -> Result<HeuristicScorer> {
        match &self.heuristics.spam_phrases {
            Some(phrases) => HeuristicScorer::new(phrases.iter().cloned())
                .context("invalid [heuristics] spam_phrases"),
            None => Ok(HeuristicScorer::default()),
        }
    }

    pub fn trusted_domains(&self) -> TrustedDomains {
        match &self.search.trusted_domains {
            Some(domains) => TrustedDomains::new(domains.iter().cloned()),
            None => TrustedDomains::default(),
        }
    }

    pub fn cooldown(&self) -> Result<Duration> {
        match &self.session.cooldown {
            Some(raw) => {
                let cooldown = humantime::parse_duration(raw)
                    .with_context(|| format!("invalid [session] cooldown `{raw}`"))?;
                if cooldown > MAX_COOLDOWN {
                    anyhow::bail!(
                        "invalid [session] cooldown `{raw}`: longer than {}",
                        humantime::format_duration(MAX_COOLDOWN)
                    );
                }
                Ok(cooldown)
            }
            None => Ok(DEFAULT_COOLDOWN),
        }
    }

    pub fn bind(&self) -> String {
        self.server
            .bind
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn analyze_model(&self) -> String {
        self.server
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_ANALYZE_MODEL.to_string())
    }
}
