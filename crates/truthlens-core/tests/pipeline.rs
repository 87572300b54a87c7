use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use truthlens_core::{
    render_analysis, search::SearchOptions, ChatProvider, CompletionRequest, HeuristicScorer,
    Orchestrator, OutputFormat, SearchGateway, SearchProvider, Session, SessionError,
    SubmitError, VerdictGateway, DEFAULT_COOLDOWN,
};

struct CannedSearch {
    payload: serde_json::Value,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(&self, _query: &str, _options: &SearchOptions) -> anyhow::Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

struct CannedChat {
    reply: &'static str,
}

#[async_trait]
impl ChatProvider for CannedChat {
    async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<String> {
        Ok(self.reply.to_string())
    }
}

fn session(search: Arc<CannedSearch>, reply: &'static str) -> Session {
    let orchestrator = Orchestrator::new(
        HeuristicScorer::default(),
        SearchGateway::new(Some(search)),
        VerdictGateway::new(Some(Arc::new(CannedChat { reply }))),
    )
    .with_clock(|| NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    Session::new(orchestrator, DEFAULT_COOLDOWN)
}

fn evidence() -> Arc<CannedSearch> {
    Arc::new(CannedSearch {
        payload: json!({
            "results": [
                {
                    "title": "Earth's orbit",
                    "url": "https://www.bbc.com/science/orbit",
                    "content": "Earth completes one orbit around the Sun every 365.25 days."
                },
                {
                    "title": "Sun",
                    "url": "https://en.wikipedia.org/wiki/Sun",
                    "content": "The Sun is the star at the centre of the Solar System."
                },
                {
                    "title": "Astronomy forum",
                    "url": "https://forum.example.net/t/1",
                    "content": "People discuss orbits."
                }
            ]
        }),
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test(flavor = "current_thread")]
async fn verified_claim_renders_with_sources() {
    let mut session = session(
        evidence(),
        r#"{"verdict":"True","reasons":["Earth orbits the Sun once a year (Source: bbc.com)."]}"#,
    );
    let analysis = session
        .submit("The Earth orbits the Sun", Instant::now())
        .await
        .expect("analysis should complete");

    assert_eq!(analysis.trusted_count, 2);
    assert_eq!(analysis.score(), 94);
    assert_eq!(analysis.tier.label, "Verified Fact");
    assert_eq!(analysis.heuristics.score, 100);

    let human = render_analysis(&analysis, OutputFormat::Human).unwrap();
    assert!(human.contains("Trust Score: 94 (Verified Fact)"));
    assert!(human.contains("Earth orbits the Sun once a year."));
    assert!(!human.contains("(Source:"));
    assert!(human.contains("3 links, 2 trusted"));

    let json: serde_json::Value =
        serde_json::from_str(&render_analysis(&analysis, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json["sources"][2]["trusted"], false);
    assert_eq!(json["sources"][0]["domain"], "bbc.com");
}

#[tokio::test(flavor = "current_thread")]
async fn rapid_resubmission_is_throttled() {
    let search = evidence();
    let mut session = session(search.clone(), r#"{"verdict":"Uncertain","reasons":[]}"#);
    let start = Instant::now();

    session.submit("The Earth orbits the Sun", start).await.unwrap();
    let err = session
        .submit("The Earth orbits the Sun", start + Duration::from_millis(4_999))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(SubmitError::CoolingDown { .. })
    ));
    assert_eq!(err.to_string(), "Please wait 5 seconds before scanning again.");

    session
        .submit("The Earth orbits the Sun", start + DEFAULT_COOLDOWN)
        .await
        .unwrap();
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn clickbait_claim_keeps_heuristic_flags_alongside_verdict() {
    let mut session = session(
        evidence(),
        r#"{"verdict":"False","reasons":["No evidence supports this."]}"#,
    );
    let analysis = session
        .submit("URGENT!!! SHARE MAX: the SUN is COLD", Instant::now())
        .await
        .unwrap();
    assert_eq!(analysis.heuristics.score, 70);
    assert_eq!(analysis.score(), 0);
    assert_eq!(analysis.tier.label, "Fabricated (Fake)");
}
