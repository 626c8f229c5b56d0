use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;
use crate::error::{AppError, Result};
use crate::models::SummarySource;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A remote text generator that can turn a prompt into a summary.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn source(&self) -> SummarySource;

    /// Issues exactly one request. Any non-success status or empty text is
    /// reported as [`AppError::Provider`].
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Provider {
        status: status.as_u16(),
        body,
    })
}

/// Like [`check_status`], but a 401 means the key itself was refused.
async fn check_auth(response: Response) -> Result<Response> {
    if response.status() == StatusCode::UNAUTHORIZED {
        return Err(AppError::Provider {
            status: 401,
            body: "Invalid API key".to_string(),
        });
    }
    check_status(response).await
}

fn non_empty(text: Option<String>, status: u16, provider: &str) -> Result<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(AppError::empty_response(status, provider)),
    }
}

static OPENAI_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9]{48}$").expect("valid regex"));
static ANTHROPIC_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-ant-[A-Za-z0-9\-_]{95}$").expect("valid regex"));

/// Checks the shape of an API key without contacting anyone. Providers
/// that take no key accept anything.
pub fn validate_api_key(key: &str, provider: LlmProvider) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::Config("API key is required".to_string()));
    }
    match provider {
        LlmProvider::OpenAi if !OPENAI_KEY.is_match(key) => {
            Err(AppError::Config("Invalid OpenAI API key format".to_string()))
        }
        LlmProvider::Anthropic if !ANTHROPIC_KEY.is_match(key) => {
            Err(AppError::Config("Invalid Anthropic API key format".to_string()))
        }
        _ => Ok(()),
    }
}

/// Outcome of a successful connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub source: SummarySource,
    pub models: Vec<String>,
    /// Whether the configured model is installed. Ollama only.
    pub model_found: Option<bool>,
    pub organization: Option<String>,
}

impl fmt::Display for ConnectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.source, self.model_found) {
            (SummarySource::Anthropic, _) => {
                write!(f, "Connected! Model: {}", self.models.join(", "))
            }
            (_, Some(found)) => write!(
                f,
                "Connected! {} models available. {}",
                self.models.len(),
                if found { "Model found." } else { "Model not found." }
            ),
            _ => write!(f, "Connected! {} models available.", self.models.len()),
        }
    }
}

// Local Ollama server

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<NamedModel>,
}

#[derive(Debug, Deserialize)]
struct NamedModel {
    name: String,
}

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Lists installed models and reports whether the configured one is
    /// among them. Tags such as `:latest` still count as a match.
    pub async fn check(&self) -> Result<ConnectionReport> {
        let url = format!("{}/api/tags", self.base_url);
        tracing::debug!("Testing Ollama at {}", url);

        let response = self.client.get(&url).send().await?;
        let body: TagsResponse = check_status(response).await?.json().await?;

        let models: Vec<String> = body.models.into_iter().map(|m| m.name).collect();
        let found = models.iter().any(|name| name.contains(&self.model));
        Ok(ConnectionReport {
            source: SummarySource::Ollama,
            models,
            model_found: Some(found),
            organization: None,
        })
    }
}

#[async_trait]
impl SummaryProvider for OllamaProvider {
    fn source(&self) -> SummarySource {
        SummarySource::Ollama
    }

    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!("Ollama request to {} (model {}, {} chars)", url, self.model, prompt.len());

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = check_status(response).await?;
        let status = response.status().as_u16();

        let body: GenerateResponse = response.json().await?;
        non_empty(body.response, status, "Ollama")
    }
}

// OpenAI chat completions

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelId>,
}

#[derive(Debug, Deserialize)]
struct ModelId {
    id: String,
}

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    models_endpoint: String,
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_endpoint(client, api_key, OPENAI_API_URL)
    }

    pub fn with_endpoint(client: Client, api_key: &str, endpoint: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            models_endpoint: OPENAI_MODELS_URL.to_string(),
        }
    }

    pub fn with_models_endpoint(mut self, endpoint: &str) -> Self {
        self.models_endpoint = endpoint.to_string();
        self
    }

    /// Lists the models the key can see.
    pub async fn check(&self) -> Result<ConnectionReport> {
        let response = self
            .client
            .get(&self.models_endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = check_auth(response).await?;

        let organization = response
            .headers()
            .get("openai-organization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: ModelList = response.json().await?;

        Ok(ConnectionReport {
            source: SummarySource::OpenAi,
            models: body.data.into_iter().map(|m| m.id).collect(),
            model_found: None,
            organization,
        })
    }
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    fn source(&self) -> SummarySource {
        SummarySource::OpenAi
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: OPENAI_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let status = response.status().as_u16();

        let body: ChatCompletionResponse = response.json().await?;
        let text = body.choices.into_iter().next().and_then(|c| c.message.content);
        non_empty(text, status, "OpenAI")
    }
}

// Anthropic messages

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_endpoint(client, api_key, ANTHROPIC_API_URL)
    }

    pub fn with_endpoint(client: Client, api_key: &str, endpoint: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Sends a one-token message, the cheapest call that proves the key.
    pub async fn check(&self) -> Result<ConnectionReport> {
        let request = MessageRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: 1,
            messages: vec![ChatMessage {
                role: "user",
                content: "test",
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        check_auth(response).await?;

        Ok(ConnectionReport {
            source: SummarySource::Anthropic,
            models: vec![ANTHROPIC_MODEL.to_string()],
            model_found: None,
            organization: None,
        })
    }
}

#[async_trait]
impl SummaryProvider for AnthropicProvider {
    fn source(&self) -> SummarySource {
        SummarySource::Anthropic
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = MessageRequest {
            model: ANTHROPIC_MODEL,
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let status = response.status().as_u16();

        let body: MessageResponse = response.json().await?;
        let text = body.content.into_iter().next().and_then(|b| b.text);
        non_empty(text, status, "Anthropic")
    }
}
