use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::search::SearchBundle;
use crate::settings::MissingKeyPolicy;

pub mod groq;
pub mod sanitize;

pub use sanitize::clean_reason;

pub const DEFAULT_VERDICT_MODEL: &str = "llama-3.1-8b-instant";

const VERDICT_TEMPERATURE: f32 = 0.0;
const TRUE_BASE_SCORE: usize = 90;
const TRUE_SCORE_PER_TRUSTED: usize = 2;
const TRUE_SCORE_CAP: usize = 99;
const UNCERTAIN_SCORE: u8 = 50;

const VERDICT_PROTOCOL: &str = r#"You are TruthLens Pro. You are a STRICT factual validator.

CORE PROTOCOLS:
1. NO META-TALK: Never say "Search says" or "Results show". State the fact directly.
2. GEOGRAPHY RULE: If the user says "A is in B", but the search data only describes diplomatic relations between A and B, the verdict is FALSE.
   - Example: "India is in Iceland" -> Verdict: False. (Reason: India is in South Asia.)
3. OUTPUT JSON: { "verdict": "True/False/Uncertain", "reasons": ["Concise fact 1", "Concise fact 2"] }"#;

/// Single chat-completion request sent to a language-model provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    /// Sent as the only (system) message.
    pub system: String,
    pub temperature: f32,
    /// Ask the provider for a JSON object response.
    pub json_output: bool,
}

/// Transport to a chat-completion backend, returning the first message content.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Outcome class of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictLabel {
    True,
    False,
    Uncertain,
    /// The model could not be consulted or answered nonsense.
    Error,
}

impl VerdictLabel {
    /// Case-insensitive parse of a model label; unknown labels are `Uncertain`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "true" => Self::True,
            "false" => Self::False,
            _ => Self::Uncertain,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Uncertain => "Uncertain",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model judgement of a claim, already mapped to a trust score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub reasons: Vec<String>,
    /// 0–100 trust score derived from the label.
    pub score: u8,
    /// 100 when the model answered, 0 for placeholder verdicts.
    pub confidence: u8,
}

impl Verdict {
    /// Verdict used whenever the model call fails: the claim is treated as false.
    pub fn fail_closed() -> Self {
        Self {
            label: VerdictLabel::Error,
            reasons: vec!["Analysis Failed.".to_string()],
            score: 0,
            confidence: 0,
        }
    }

    /// Placeholder used when no model credential is configured. It carries no
    /// score of its own, so it lands in the lowest tier.
    pub fn missing_key() -> Self {
        Self {
            label: VerdictLabel::Uncertain,
            reasons: vec!["API Key missing.".to_string()],
            score: 0,
            confidence: 0,
        }
    }
}

/// Map a label to a score: `True` earns 90 plus 2 per trusted source (max 99),
/// `False` and `Error` are a hard 0, everything else sits at 50.
pub fn derive_score(label: VerdictLabel, trusted_count: usize) -> u8 {
    match label {
        VerdictLabel::True => trusted_count
            .saturating_mul(TRUE_SCORE_PER_TRUSTED)
            .saturating_add(TRUE_BASE_SCORE)
            .min(TRUE_SCORE_CAP) as u8,
        VerdictLabel::False | VerdictLabel::Error => 0,
        VerdictLabel::Uncertain => UNCERTAIN_SCORE,
    }
}

/// Instruction payload for the verdict step. Deterministic for a given claim and evidence.
pub fn build_prompt(claim: &str, evidence: &str) -> String {
    format!("{VERDICT_PROTOCOL}\n\nINPUT DATA: {evidence}\nUSER CLAIM: \"{claim}\"\n")
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    verdict: String,
    reasons: Vec<String>,
}

/// Asks the language model to judge a claim against gathered evidence. Never
/// fails: provider problems turn into [`Verdict::fail_closed`].
pub struct VerdictGateway {
    provider: Option<Arc<dyn ChatProvider>>,
    missing_key: MissingKeyPolicy,
    model: String,
}

impl VerdictGateway {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self {
            provider,
            missing_key: MissingKeyPolicy::Neutral,
            model: DEFAULT_VERDICT_MODEL.to_string(),
        }
    }

    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[instrument(
        name = "verdict_gateway",
        skip(self, claim, bundle),
        fields(model = %self.model, trusted = bundle.trusted_count)
    )]
    pub async fn judge(&self, claim: &str, bundle: &SearchBundle) -> Verdict {
        let Some(provider) = &self.provider else {
            return match self.missing_key {
                MissingKeyPolicy::Neutral => {
                    warn!("model credential missing; returning neutral verdict");
                    Verdict::missing_key()
                }
                MissingKeyPolicy::Fail => {
                    warn!("model credential missing; failing closed");
                    Verdict::fail_closed()
                }
            };
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            system: build_prompt(claim, &bundle.context),
            temperature: VERDICT_TEMPERATURE,
            json_output: true,
        };

        match request_verdict(provider.as_ref(), &request).await {
            Ok(parsed) => {
                let label = VerdictLabel::parse(&parsed.verdict);
                let verdict = Verdict {
                    label,
                    reasons: parsed.reasons.iter().map(|r| clean_reason(r)).collect(),
                    score: derive_score(label, bundle.trusted_count),
                    confidence: 100,
                };
                debug!(label = %verdict.label, score = verdict.score, "verdict parsed");
                verdict
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "verdict request failed; failing closed");
                Verdict::fail_closed()
            }
        }
    }
}

async fn request_verdict(
    provider: &dyn ChatProvider,
    request: &CompletionRequest,
) -> Result<ModelVerdict> {
    let content = provider.complete(request).await?;
    serde_json::from_str(&content).context("expected JSON verdict from model response")
}
