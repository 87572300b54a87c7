//! Analysis pipeline and the submission gate in front of it.
//!
//! The gate is a plain value: [`Gate::submit`] takes the current state and the
//! current time and returns the next state, so throttling is testable without
//! timers. [`Session`] owns a gate and an [`Orchestrator`] and is what
//! interactive front-ends drive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::heuristics::{HeuristicReport, HeuristicScorer};
use crate::search::{SearchGateway, SearchResult, TrustedDomains};
use crate::settings::Settings;
use crate::tier::{tier_for, Tier};
use crate::verdict::{Verdict, VerdictGateway};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
/// Longest cooldown a gate will hold; longer windows are clamped to it.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

const MIN_WORDS: usize = 2;
const MIN_CHARS: usize = 10;

/// A validated, trimmed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Claim(String);

impl Claim {
    /// Trim the input and reject empty or too-short claims.
    pub fn parse(input: &str) -> Result<Self, SubmitError> {
        let text = input.trim();
        let words = word_count(text);
        if words == 0 {
            return Err(SubmitError::Empty);
        }
        if words < MIN_WORDS && text.chars().count() < MIN_CHARS {
            return Err(SubmitError::TooShort);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.0)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Why a submission was not accepted. All variants are recoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Please enter a claim to analyze.")]
    Empty,
    #[error("Too short! Please enter a full claim.")]
    TooShort,
    #[error("Please wait {} seconds before scanning again.", .window.as_secs())]
    CoolingDown { window: Duration, remaining: Duration },
}

/// Terminal failure of an analysis cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("System Error. Please try again.")]
    SearchUnavailable,
}

/// Either outcome of a rejected or failed session submission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] SubmitError),
    #[error(transparent)]
    Failed(#[from] AnalysisError),
}

/// Throttle state in front of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gate {
    #[default]
    Idle,
    CoolingDown { until: Instant },
}

impl Gate {
    /// Collapse an expired cooldown back to `Idle`.
    pub fn settle(self, now: Instant) -> Self {
        match self {
            Self::CoolingDown { until } if now >= until => Self::Idle,
            other => other,
        }
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        matches!(self.settle(now), Self::CoolingDown { .. })
    }

    /// Transition for a submission at `now`.
    ///
    /// A rejected submission during cooldown leaves the window untouched.
    /// Validation failures leave the gate idle. An accepted claim starts a new
    /// `window`-long cooldown, whatever the analysis outcome turns out to be.
    /// Windows beyond [`MAX_COOLDOWN`] are clamped.
    pub fn submit(
        self,
        input: &str,
        now: Instant,
        window: Duration,
    ) -> (Self, Result<Claim, SubmitError>) {
        let window = window.min(MAX_COOLDOWN);
        let state = self.settle(now);
        if let Self::CoolingDown { until } = state {
            let remaining = until.saturating_duration_since(now);
            return (state, Err(SubmitError::CoolingDown { window, remaining }));
        }
        match (Claim::parse(input), now.checked_add(window)) {
            (Ok(claim), Some(until)) => (Self::CoolingDown { until }, Ok(claim)),
            (Ok(claim), None) => (state, Ok(claim)),
            (Err(err), _) => (state, Err(err)),
        }
    }
}

/// Everything the presentation layer needs for one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub claim: Claim,
    pub heuristics: HeuristicReport,
    pub verdict: Verdict,
    pub trusted_count: usize,
    pub sources: Vec<SearchResult>,
    pub tier: Tier,
}

impl Analysis {
    /// Final trust score (the verdict score).
    pub fn score(&self) -> u8 {
        self.verdict.score
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Runs heuristics, search and verdict strictly in sequence.
pub struct Orchestrator {
    scorer: HeuristicScorer,
    search: SearchGateway,
    verdict: VerdictGateway,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(scorer: HeuristicScorer, search: SearchGateway, verdict: VerdictGateway) -> Self {
        Self {
            scorer,
            search,
            verdict,
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Wire gateways from provider settings with the default scorer and allow-list.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::from_settings_with(settings, HeuristicScorer::default(), TrustedDomains::default())
    }

    pub fn from_settings_with(
        settings: &Settings,
        scorer: HeuristicScorer,
        trusted: TrustedDomains,
    ) -> Result<Self> {
        let search = SearchGateway::new(settings.search_provider()?)
            .with_missing_key_policy(settings.search.missing_key)
            .with_trusted_domains(trusted);
        let mut verdict = VerdictGateway::new(settings.chat_provider()?)
            .with_missing_key_policy(settings.verdict.missing_key);
        if let Some(model) = &settings.verdict.model {
            verdict = verdict.with_model(model.clone());
        }
        Ok(Self::new(scorer, search, verdict))
    }

    /// Replace the source of "today" used in the evidence header.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn scorer(&self) -> &HeuristicScorer {
        &self.scorer
    }

    /// Run one analysis cycle. Only a missing search result aborts the cycle;
    /// verdict problems are already folded into a fail-closed verdict.
    #[instrument(name = "analyze_claim", skip_all, fields(words = claim.word_count()))]
    pub async fn analyze(&self, claim: &Claim) -> Result<Analysis, AnalysisError> {
        let heuristics = self.scorer.analyze(claim.as_str());

        let Some(bundle) = self.search.gather(claim.as_str(), (self.clock)()).await else {
            warn!("search returned no data; aborting analysis");
            return Err(AnalysisError::SearchUnavailable);
        };

        let verdict = self.verdict.judge(claim.as_str(), &bundle).await;
        let tier = *tier_for(verdict.score);
        info!(
            score = verdict.score,
            label = %verdict.label,
            tier = tier.label,
            "analysis completed"
        );

        Ok(Analysis {
            claim: claim.clone(),
            heuristics,
            verdict,
            trusted_count: bundle.trusted_count,
            sources: bundle.sources,
            tier,
        })
    }
}

/// A gate plus the pipeline behind it.
pub struct Session {
    orchestrator: Orchestrator,
    gate: Gate,
    cooldown: Duration,
}

impl Session {
    pub fn new(orchestrator: Orchestrator, cooldown: Duration) -> Self {
        Self {
            orchestrator,
            gate: Gate::Idle,
            cooldown,
        }
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Submit raw input at `now`. The gate is updated before the pipeline runs,
    /// so the cooldown holds even when the analysis fails.
    pub async fn submit(&mut self, input: &str, now: Instant) -> Result<Analysis, SessionError> {
        let (gate, claim) = self.gate.submit(input, now, self.cooldown);
        self.gate = gate;
        let claim = claim.map_err(|err| {
            debug!(reason = %err, "submission rejected");
            err
        })?;
        Ok(self.orchestrator.analyze(&claim).await?)
    }
}
