use super::{ChatProvider, CompletionRequest};
use crate::settings::ProviderSettings;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_ENDPOINT: &str = "https://api.groq.com";

/// OpenAI-compatible chat-completions client pointed at Groq by default.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    url: String,
    api_key: String,
}

impl GroqClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        let Some(api_key) = api_key else {
            bail!("Groq API key must be provided via GROQ_API_KEY");
        };
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!("{}/openai/v1/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("truthlens/0.3")
            .timeout(settings.timeout())
            .build()
            .context("failed to build Groq HTTP client")?;
        Ok(Self { http, url, api_key })
    }
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "system",
                content: &request.system,
            }],
            response_format: request
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call Groq chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Groq API error ({}): {}", status, body);
        }

        let chat: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to parse Groq response")?;
        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Groq response missing message content"))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
