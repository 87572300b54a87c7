pub mod heuristics;
pub mod orchestrator;
pub mod proxy;
pub mod report;
pub mod search;
pub mod settings;
pub mod tier;
pub mod verdict;

pub use heuristics::{Flag, HeuristicReport, HeuristicScorer, Severity};
pub use orchestrator::{
    Analysis, AnalysisError, Claim, Gate, Orchestrator, Session, SessionError, SubmitError,
    DEFAULT_COOLDOWN, MAX_COOLDOWN,
};
pub use report::{render_analysis, OutputFormat};
pub use search::{SearchBundle, SearchGateway, SearchProvider, SearchResult, TrustedDomains};
pub use settings::{MissingKeyPolicy, ProviderSettings, Settings};
pub use tier::{tier_for, Tier, TIERS};
pub use verdict::{ChatProvider, CompletionRequest, Verdict, VerdictGateway, VerdictLabel};
