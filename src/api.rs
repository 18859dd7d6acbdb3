//! Hosted language-model access.
//!
//! The extraction pipeline talks to any OpenAI-compatible chat-completions
//! endpoint. Vendors are picked by the `<vendor>/<model>` provider string,
//! which maps to a default base URL unless one is configured explicitly.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending text to a model
//! - [`ChatCompletionsClient`]: `reqwest` implementation of [`AskAsync`]
//!
//! Calls are made exactly once; a failed call is reported to the caller.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::ExtractSettings;
use crate::utils::truncate_for_log;

/// Environment variable holding the hosted-model API token.
pub const API_TOKEN_ENV: &str = "LLM_API_TOKEN";

/// Trait for async LLM interaction.
///
/// Implementors send text to a model and return its reply. Tests use canned
/// implementations in place of a network client.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send `text` as the user turn and return the model's reply.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Connection and sampling parameters for a hosted model.
#[derive(Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub api_token: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmConfig {
    /// Build from settings. `env_token` wins over a token in the settings file.
    pub fn from_settings(
        settings: &ExtractSettings,
        env_token: Option<String>,
    ) -> Result<Self, Box<dyn Error>> {
        let (vendor, model) = settings
            .provider
            .split_once('/')
            .ok_or_else(|| format!("provider `{}` is not `<vendor>/<model>`", settings.provider))?;

        let base_url = match &settings.base_url {
            Some(url) => url.clone(),
            None => default_base_url(vendor)
                .ok_or_else(|| format!("no default endpoint for vendor `{vendor}`; set extract.base_url"))?
                .to_string(),
        };

        Ok(Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: env_token
                .filter(|t| !t.is_empty())
                .or_else(|| settings.api_token.clone()),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        })
    }
}

/// OpenAI-compatible endpoint for a provider vendor.
pub fn default_base_url(vendor: &str) -> Option<&'static str> {
    match vendor {
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "openai" => Some("https://api.openai.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions client implementing [`AskAsync`].
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(http: Client, config: LlmConfig) -> Self {
        Self { http, config }
    }
}

impl AskAsync for ChatCompletionsClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.config.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![RequestMessage {
                role: "user",
                content: text,
            }],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let raw = response.text().await?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(%status, elapsed_ms, body = %truncate_for_log(&raw, 300), "Model API call failed");
            return Err(format!("model API returned {}: {}", status, truncate_for_log(&raw, 300)).into());
        }

        let parsed: ChatResponse = serde_json::from_str(&raw)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or("model response contained no message content")?;

        debug!(elapsed_ms, bytes = content.len(), "Model replied");
        Ok(content)
    }
}
