//! HTTP extractor backed by a Messages-style language model API.

use async_trait::async_trait;
use clausebook_core::Clause;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ExtractError;
use crate::extractor::{AnalysisInput, Extractor};
use crate::prompt::{SYSTEM_PROMPT, parse_clauses, user_prompt};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// e.g. `https://api.anthropic.com` (trailing slash is trimmed).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 8192,
            temperature: 0.0,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct LlmExtractor {
    client: reqwest::Client,
    config: ExtractorConfig,
}

impl LlmExtractor {
    pub fn new(mut config: ExtractorConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn analyze(&self, input: &AnalysisInput) -> Result<Vec<Clause>, ExtractError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: user_prompt(input),
            }],
        };

        let url = self.endpoint();
        debug!(url = %url, model = %self.config.model, "requesting clause extraction");
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), body));
        }

        let body: MessagesResponse = resp.json().await?;
        let clauses = parse_clauses(&reply_text(body))?;
        info!(count = clauses.len(), "extracted clauses");
        Ok(clauses)
    }
}

fn reply_text(resp: MessagesResponse) -> String {
    resp.content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect()
}

/// Prefer the API's own error message; fall back to status and raw body.
fn error_from_body(status: u16, body: String) -> ExtractError {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => ExtractError::Failed(parsed.error.message),
        Err(_) => ExtractError::Server { status, body },
    }
}
