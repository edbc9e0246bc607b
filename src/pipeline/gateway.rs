//! Recommendation gateway
//!
//! The boundary to the external text-generation backend. The planner only
//! sees the [`RecommendationGateway`] trait; [`GroqGateway`] is the concrete
//! adapter speaking the OpenAI-compatible chat-completions protocol.

use crate::config::{ConfigError, GatewayConfig};
use crate::error::{generation_error, AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Sampling options forwarded with every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl From<&GatewayConfig> for GenerationOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Anything that turns a prompt into generated text.
///
/// Implementations must report unavailability as an error and never as an
/// empty string.
#[async_trait]
pub trait RecommendationGateway: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> AppResult<String>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// A gateway that may have failed to construct.
///
/// Construction failures are not fatal: every request against an
/// unavailable gateway fails with the original configuration error.
#[derive(Clone)]
pub enum GatewayHandle {
    Ready(Arc<dyn RecommendationGateway>),
    Unavailable(String),
}

impl GatewayHandle {
    pub fn ready<G: RecommendationGateway + 'static>(gateway: G) -> Self {
        GatewayHandle::Ready(Arc::new(gateway))
    }

    pub fn from_result<G: RecommendationGateway + 'static>(result: AppResult<G>) -> Self {
        match result {
            Ok(gateway) => Self::ready(gateway),
            Err(AppError::Config(reason)) => GatewayHandle::Unavailable(reason),
            Err(other) => GatewayHandle::Unavailable(other.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GatewayHandle::Ready(_))
    }

    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> AppResult<String> {
        match self {
            GatewayHandle::Ready(gateway) => gateway.generate(prompt, options).await,
            GatewayHandle::Unavailable(reason) => Err(AppError::Config(reason.clone())),
        }
    }
}

impl std::fmt::Debug for GatewayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayHandle::Ready(gateway) => f.debug_tuple("Ready").field(&gateway.name()).finish(),
            GatewayHandle::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Groq chat-completions adapter
pub struct GroqGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GroqGateway {
    /// Build the adapter. An explicit `api_key` wins over the configured one;
    /// having neither is a configuration error.
    pub fn new(config: &GatewayConfig, api_key: Option<String>) -> AppResult<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| config.api_key.clone())
            .ok_or_else(|| ConfigError::MissingVar("GROQ_API_KEY".to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("schemaflow-remediation/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl RecommendationGateway for GroqGateway {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &options.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!("POST {} (model: {})", url, options.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(200).collect();
            return Err(generation_error(format!("backend returned {}: {}", status, detail)));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| generation_error("backend returned no content"))
    }

    fn name(&self) -> &str {
        "groq"
    }
}
