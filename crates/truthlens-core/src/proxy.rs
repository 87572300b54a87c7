//! Server-side relays that attach provider secrets to browser requests.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, instrument};

use crate::search::{take_chars, SearchOptions, SearchProvider, MAX_QUERY_CHARS};
use crate::settings::Settings;
use crate::verdict::{ChatProvider, CompletionRequest};

pub const DEFAULT_ANALYZE_MODEL: &str = "llama-3.3-70b-versatile";

const ANALYZE_TEMPERATURE: f32 = 0.3;
const MISSING_KEY_MESSAGE: &str = "Server API Key Missing";

/// Providers and request knobs shared by the proxy handlers.
pub struct ProxyState {
    search: Option<Arc<dyn SearchProvider>>,
    chat: Option<Arc<dyn ChatProvider>>,
    search_options: SearchOptions,
    analyze_model: String,
}

impl ProxyState {
    pub fn new(
        search: Option<Arc<dyn SearchProvider>>,
        chat: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            search,
            chat,
            search_options: SearchOptions::proxy(),
            analyze_model: DEFAULT_ANALYZE_MODEL.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(
            settings.search_provider()?,
            settings.chat_provider()?,
        ))
    }

    pub fn with_analyze_model(mut self, model: impl Into<String>) -> Self {
        self.analyze_model = model.into();
        self
    }
}

/// Routes for both relays, under `/api/*` and the legacy function paths.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/search", any(search))
        .route("/.netlify/functions/search", any(search))
        .route("/api/analyze", any(analyze))
        .route("/.netlify/functions/analyze", any(analyze))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    user_text: String,
    #[serde(default)]
    web_context: Option<String>,
}

#[instrument(name = "proxy_search", skip_all)]
async fn search(State(state): State<Arc<ProxyState>>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }
    let request: SearchBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return failure("Search Failed", &err),
    };
    let Some(provider) = &state.search else {
        return missing_key();
    };

    let query = take_chars(&request.query, MAX_QUERY_CHARS);
    match provider.relay(&query, &state.search_options).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => failure("Search Failed", &err),
    }
}

#[instrument(name = "proxy_analyze", skip_all)]
async fn analyze(State(state): State<Arc<ProxyState>>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }
    let request: AnalyzeBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return failure("Backend Error", &err),
    };
    let Some(provider) = &state.chat else {
        return missing_key();
    };

    let completion = CompletionRequest {
        model: state.analyze_model.clone(),
        system: scoring_prompt(&request.user_text, request.web_context.as_deref()),
        temperature: ANALYZE_TEMPERATURE,
        json_output: true,
    };
    match provider.complete(&completion).await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            content,
        )
            .into_response(),
        Err(err) => failure("Backend Error", &err),
    }
}

async fn health(State(state): State<Arc<ProxyState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "search_key": state.search.is_some(),
        "model_key": state.chat.is_some(),
    }))
}

/// Prompt for the single-step scoring relay.
fn scoring_prompt(user_text: &str, web_context: Option<&str>) -> String {
    let news = web_context
        .filter(|context| !context.trim().is_empty())
        .unwrap_or("No live news found.");
    format!(
        "You are TruthLens. Compare USER CLAIM with LIVE NEWS.\n\
         If news confirms it -> 100/Verified. If contradicts -> 0/Fake.\n\
         Output JSON: {{ \"score\": 0-100, \"reasons\": [\"Fact 1\", \"Fact 2\"], \"confidence\": 0-100 }}\n\n\
         LIVE NEWS: {news}\n\
         USER CLAIM: {user_text}\n"
    )
}

fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

fn missing_key() -> Response {
    error!("proxy request rejected: provider secret not configured");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": MISSING_KEY_MESSAGE })),
    )
        .into_response()
}

fn failure(prefix: &str, err: &dyn std::fmt::Display) -> Response {
    error!(error = %err, "{prefix}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("{prefix}: {err}") })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct EchoSearch {
        seen: Mutex<Vec<(String, SearchOptions)>>,
    }

    #[async_trait]
    impl SearchProvider for EchoSearch {
        async fn search(
            &self,
            query: &str,
            options: &SearchOptions,
        ) -> anyhow::Result<serde_json::Value> {
            self.seen
                .lock()
                .unwrap()
                .push((query.to_string(), options.clone()));
            Ok(json!({ "answer": "ok", "results": [] }))
        }
    }

    /// Backend that rejects the request but still answers with a JSON body.
    struct RejectingSearch;

    #[async_trait]
    impl SearchProvider for RejectingSearch {
        async fn search(&self, _: &str, _: &SearchOptions) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("Tavily API error (401 Unauthorized)")
        }

        async fn relay(&self, _: &str, _: &SearchOptions) -> anyhow::Result<serde_json::Value> {
            Ok(json!({ "detail": { "error": "Unauthorized" } }))
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchProvider for BrokenSearch {
        async fn search(&self, _: &str, _: &SearchOptions) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("connection reset")
        }
    }

    struct RecordingChat {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatProvider for RecordingChat {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(r#"{"score":0,"reasons":["India is in South Asia."],"confidence":95}"#.into())
        }
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn rejects_non_post() {
        let app = router(ProxyState::new(None, None));
        for uri in ["/api/search", "/api/analyze", "/.netlify/functions/analyze"] {
            let (status, body) = call(app.clone(), "GET", uri, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
            assert_eq!(body, "Method Not Allowed");
        }
    }

    #[tokio::test]
    async fn missing_keys_are_server_errors() {
        let app = router(ProxyState::new(None, None));
        let (status, body) = call(app.clone(), "POST", "/api/search", r#"{"query":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&body).unwrap(),
            json!({ "error": "Server API Key Missing" })
        );

        let (status, body) =
            call(app, "POST", "/api/analyze", r#"{"userText":"x","webContext":""}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Server API Key Missing"));
    }

    #[tokio::test]
    async fn search_relays_provider_payload() {
        let provider = Arc::new(EchoSearch {
            seen: Mutex::new(Vec::new()),
        });
        let app = router(ProxyState::new(Some(provider.clone()), None));
        let (status, body) = call(
            app,
            "POST",
            "/.netlify/functions/search",
            r#"{"query":"India is in Iceland"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&body).unwrap(),
            json!({ "answer": "ok", "results": [] })
        );
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].0, "India is in Iceland");
        assert_eq!(seen[0].1, SearchOptions::proxy());
    }

    #[tokio::test]
    async fn search_failure_is_wrapped() {
        let app = router(ProxyState::new(Some(Arc::new(BrokenSearch)), None));
        let (status, body) = call(app, "POST", "/api/search", r#"{"query":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Search Failed: connection reset"));
    }

    #[tokio::test]
    async fn upstream_error_body_is_relayed_with_ok_status() {
        let app = router(ProxyState::new(Some(Arc::new(RejectingSearch)), None));
        let (status, body) = call(app, "POST", "/api/search", r#"{"query":"x"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&body).unwrap(),
            json!({ "detail": { "error": "Unauthorized" } })
        );
    }

    #[tokio::test]
    async fn malformed_body_is_a_server_error() {
        let chat = Arc::new(RecordingChat {
            seen: Mutex::new(Vec::new()),
        });
        let app = router(ProxyState::new(None, Some(chat)));
        let (status, body) = call(app, "POST", "/api/analyze", "{not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Backend Error"));
    }

    #[tokio::test]
    async fn analyze_forwards_model_content_verbatim() {
        let chat = Arc::new(RecordingChat {
            seen: Mutex::new(Vec::new()),
        });
        let app = router(ProxyState::new(None, Some(chat.clone())));
        let (status, body) = call(
            app,
            "POST",
            "/api/analyze",
            r#"{"userText":"India is in Iceland","webContext":""}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"score":0,"reasons":["India is in South Asia."],"confidence":95}"#
        );
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].model, DEFAULT_ANALYZE_MODEL);
        assert!((seen[0].temperature - 0.3).abs() < f32::EPSILON);
        assert!(seen[0].json_output);
        assert!(seen[0].system.contains("LIVE NEWS: No live news found."));
        assert!(seen[0].system.contains("USER CLAIM: India is in Iceland"));
    }

    #[tokio::test]
    async fn health_reports_configured_secrets() {
        let chat = Arc::new(RecordingChat {
            seen: Mutex::new(Vec::new()),
        });
        let app = router(ProxyState::new(None, Some(chat)));
        let (status, body) = call(app, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["search_key"], false);
        assert_eq!(value["model_key"], true);
    }
}
