use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Phrases that mark a claim as clickbait when found anywhere in it (case-insensitive).
pub const DEFAULT_SPAM_PHRASES: &[&str] = &["urgent", "viral", "share max", "100% true"];

const START_SCORE: i32 = 100;
const SHORT_CLAIM_CHARS: usize = 20;
const MAX_CAPS_RUNS: usize = 2;
const CAPS_PENALTY: i32 = 10;
const CLICKBAIT_PENALTY: i32 = 20;

static CAPS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{3,}").expect("valid regex"));

/// How a heuristic flag should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warn,
    Bad,
}

/// A single observation made by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub severity: Severity,
    pub message: String,
}

impl Flag {
    fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
        }
    }
}

/// Local, network-free assessment of a claim's tone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicReport {
    /// 0–100, starting at 100 and only ever reduced by penalties.
    pub score: u8,
    pub flags: Vec<Flag>,
}

/// Errors raised while building a scorer from a custom phrase list.
#[derive(Debug, Error)]
pub enum HeuristicConfigError {
    #[error("spam phrase #{index} must not be blank")]
    BlankPhrase { index: usize },
    #[error("failed to build spam phrase automaton: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

/// Fixed-weight scorer penalising shouting and clickbait vocabulary.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    phrases: Vec<String>,
    automaton: AhoCorasick,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(DEFAULT_SPAM_PHRASES.iter().copied())
            .expect("default spam phrases are non-blank")
    }
}

impl HeuristicScorer {
    pub fn new<I, S>(phrases: I) -> Result<Self, HeuristicConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let phrases: Vec<String> = phrases.into_iter().map(Into::into).collect();
        if let Some(index) = phrases.iter().position(|p| p.trim().is_empty()) {
            return Err(HeuristicConfigError::BlankPhrase { index });
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&phrases)?;
        Ok(Self { phrases, automaton })
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    #[instrument(name = "score_claim", skip(self, text), fields(text_len = text.len()))]
    pub fn analyze(&self, text: &str) -> HeuristicReport {
        let mut score = START_SCORE;
        let mut flags = Vec::new();

        if text.chars().count() < SHORT_CLAIM_CHARS {
            flags.push(Flag::new(Severity::Warn, "Short claim detected."));
        }

        if CAPS_RUN.find_iter(text).count() > MAX_CAPS_RUNS {
            score -= CAPS_PENALTY;
            flags.push(Flag::new(Severity::Bad, "Aggressive capitalization."));
        }

        if !self.phrases.is_empty() && self.automaton.is_match(text) {
            score -= CLICKBAIT_PENALTY;
            flags.push(Flag::new(Severity::Bad, "Clickbait language detected."));
        }

        if flags.is_empty() {
            flags.push(Flag::new(Severity::Good, "Tone analysis: Neutral"));
            flags.push(Flag::new(Severity::Good, "Grammar check: Passed"));
        }

        let score = score.clamp(0, 100) as u8;
        debug!(score, flags = flags.len(), "heuristics completed");
        HeuristicReport { score, flags }
    }
}
