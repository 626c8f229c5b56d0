use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use tokio::sync::Mutex;

use super::fallback::fallback_summary;
use super::prompt::{build_smart_prompt, build_summary_prompt};
use super::provider::{
    validate_api_key, AnthropicProvider, ConnectionReport, OllamaProvider, OpenAiProvider,
    SummaryProvider, ANTHROPIC_API_URL, OPENAI_API_URL, OPENAI_MODELS_URL,
};
use super::validator::validate_summary;
use crate::config::{LlmProvider, Settings};
use crate::error::{AppError, Result};
use crate::models::{Conversation, SummaryResult, SummarySource};
use crate::render::{render, OutputFormat};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote API locations. Only tests point these anywhere else.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub openai: String,
    pub openai_models: String,
    pub anthropic: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: OPENAI_API_URL.to_string(),
            openai_models: OPENAI_MODELS_URL.to_string(),
            anthropic: ANTHROPIC_API_URL.to_string(),
        }
    }
}

type SharedSummary = Shared<BoxFuture<'static, SummaryResult>>;

struct InFlight {
    ticket: u64,
    result: SharedSummary,
}

/// Picks a provider from the settings, calls it once and falls back to a
/// local summary on any failure. Never returns an error.
pub struct Summarizer {
    client: Client,
    endpoints: Endpoints,
    fixed_provider: Option<Arc<dyn SummaryProvider>>,
    inflight: Mutex<HashMap<u64, InFlight>>,
    next_ticket: AtomicU64,
}

impl Summarizer {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoints,
            fixed_provider: None,
            inflight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Uses `provider` for every request regardless of the settings.
    pub fn with_provider(provider: Arc<dyn SummaryProvider>) -> Result<Self> {
        let mut summarizer = Self::new()?;
        summarizer.fixed_provider = Some(provider);
        Ok(summarizer)
    }

    /// The single provider a request should go to, if any.
    pub fn provider_for(&self, settings: &Settings) -> Option<Arc<dyn SummaryProvider>> {
        if let Some(provider) = &self.fixed_provider {
            return Some(Arc::clone(provider));
        }

        match settings.preferred_llm {
            LlmProvider::Ollama => Some(Arc::new(OllamaProvider::new(
                self.client.clone(),
                &settings.ollama_url,
                &settings.ollama_model,
            ))),
            LlmProvider::OpenAi => settings.openai_key().map(|key| {
                Arc::new(OpenAiProvider::with_endpoint(
                    self.client.clone(),
                    key,
                    &self.endpoints.openai,
                )) as Arc<dyn SummaryProvider>
            }),
            LlmProvider::Anthropic => settings.anthropic_key().map(|key| {
                Arc::new(AnthropicProvider::with_endpoint(
                    self.client.clone(),
                    key,
                    &self.endpoints.anthropic,
                )) as Arc<dyn SummaryProvider>
            }),
            LlmProvider::Disabled => None,
        }
    }

    /// Tests the connection to `provider` with the configured URL, model
    /// or key. A key with an unexpected shape is only warned about.
    pub async fn check_connection(
        &self,
        provider: LlmProvider,
        settings: &Settings,
    ) -> Result<ConnectionReport> {
        let key = match provider {
            LlmProvider::Ollama => {
                return OllamaProvider::new(
                    self.client.clone(),
                    &settings.ollama_url,
                    &settings.ollama_model,
                )
                .check()
                .await;
            }
            LlmProvider::OpenAi => settings.openai_key(),
            LlmProvider::Anthropic => settings.anthropic_key(),
            LlmProvider::Disabled => {
                return Err(AppError::Config("No summary provider selected".to_string()));
            }
        };

        let key = key.ok_or_else(|| AppError::Config("API key is required".to_string()))?;
        if let Err(e) = validate_api_key(key, provider) {
            tracing::warn!("{}", e);
        }

        if provider == LlmProvider::OpenAi {
            OpenAiProvider::with_endpoint(self.client.clone(), key, &self.endpoints.openai)
                .with_models_endpoint(&self.endpoints.openai_models)
                .check()
                .await
        } else {
            AnthropicProvider::with_endpoint(self.client.clone(), key, &self.endpoints.anthropic)
                .check()
                .await
        }
    }

    /// Length-driven summary using the basic prompt.
    pub async fn summarize(
        &self,
        conversation: &Conversation,
        settings: &Settings,
    ) -> SummaryResult {
        let provider = self.provider_for(settings);
        summarize_with(provider.as_deref(), conversation, settings).await
    }

    /// Structured summary in `format`. Concurrent requests for the same
    /// conversation content and options share one provider call.
    pub async fn smart_summarize(
        &self,
        conversation: &Conversation,
        format: OutputFormat,
        settings: &Settings,
    ) -> SummaryResult {
        let key = snapshot_key(conversation, format, settings);

        let (ticket, shared) = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(existing) => {
                    tracing::debug!("Joining in-flight smart summary");
                    (existing.ticket, existing.result.clone())
                }
                None => {
                    let provider = self.provider_for(settings);
                    let conversation = conversation.clone();
                    let settings = settings.clone();
                    let result: SharedSummary = async move {
                        smart_summarize_with(provider.as_deref(), &conversation, format, &settings)
                            .await
                    }
                    .boxed()
                    .shared();

                    let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                    inflight.insert(
                        key,
                        InFlight {
                            ticket,
                            result: result.clone(),
                        },
                    );
                    (ticket, result)
                }
            }
        };

        let result = shared.await;

        let mut inflight = self.inflight.lock().await;
        if inflight.get(&key).is_some_and(|entry| entry.ticket == ticket) {
            inflight.remove(&key);
        }

        result
    }
}

pub async fn summarize_with(
    provider: Option<&dyn SummaryProvider>,
    conversation: &Conversation,
    settings: &Settings,
) -> SummaryResult {
    let Some(provider) = provider else {
        tracing::info!("No AI provider configured, using fallback summary");
        return fallback(conversation, OutputFormat::Markdown);
    };

    let length = settings.summary_length;
    let prompt = build_summary_prompt(conversation, length);
    tracing::info!(
        "Summarizing {} messages with {}",
        conversation.total_messages(),
        provider.source()
    );

    match provider.complete(&prompt, length.max_tokens()).await {
        Ok(text) => SummaryResult::new(text, provider.source()),
        Err(e) => {
            tracing::warn!("{} summarization failed, using fallback: {}", provider.source(), e);
            fallback(conversation, OutputFormat::Markdown)
        }
    }
}

pub async fn smart_summarize_with(
    provider: Option<&dyn SummaryProvider>,
    conversation: &Conversation,
    format: OutputFormat,
    settings: &Settings,
) -> SummaryResult {
    let Some(provider) = provider else {
        tracing::info!("No AI provider configured, using fallback summary");
        return fallback(conversation, format);
    };

    let length = settings.summary_length;
    let prompt = build_smart_prompt(conversation, format, length);
    tracing::info!(
        "Smart summary of {} messages with {}",
        conversation.total_messages(),
        provider.source()
    );

    let text = match provider.complete(&prompt, length.max_tokens()).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("{} smart summary failed, using fallback: {}", provider.source(), e);
            return fallback(conversation, format);
        }
    };

    let original = render(conversation, format).unwrap_or_else(|_| conversation.transcript());
    let check = validate_summary(&text, &original);
    if !check.is_summary() {
        if settings.enforce_summary_validation {
            tracing::warn!(
                "{} result does not look like a summary (similarity {:.2}), using fallback",
                provider.source(),
                check.similarity
            );
            return fallback(conversation, format);
        }
        tracing::debug!("{} result may be an echoed transcript", provider.source());
    }

    SummaryResult::new(text, provider.source())
}

fn fallback(conversation: &Conversation, format: OutputFormat) -> SummaryResult {
    SummaryResult::new(fallback_summary(conversation, format), SummarySource::Fallback)
}

/// Identifies requests that would produce the same result: the conversation
/// content, the output options and every setting the provider call or the
/// validation gate reads.
fn snapshot_key(conversation: &Conversation, format: OutputFormat, settings: &Settings) -> u64 {
    let mut hasher = DefaultHasher::new();
    conversation.platform.hash(&mut hasher);
    conversation.url.hash(&mut hasher);
    for msg in &conversation.messages {
        msg.role.hash(&mut hasher);
        msg.content.hash(&mut hasher);
    }
    format.hash(&mut hasher);
    settings.summary_length.as_str().hash(&mut hasher);
    SummarySource::from(settings.preferred_llm).as_str().hash(&mut hasher);
    settings.enforce_summary_validation.hash(&mut hasher);
    settings.ollama_url.hash(&mut hasher);
    settings.ollama_model.hash(&mut hasher);
    settings.openai_key().hash(&mut hasher);
    settings.anthropic_key().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummaryLength;
    use crate::error::AppError;
    use crate::models::{Message, Platform, Role};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn conversation() -> Conversation {
        let at = Utc.with_ymd_and_hms(2024, 4, 4, 10, 0, 0).unwrap();
        Conversation::new(
            Platform::ChatGpt,
            vec![
                Message::new(Role::User, "Hi", at).unwrap(),
                Message::new(Role::Assistant, "Hello", at).unwrap(),
                Message::new(Role::User, "Explain how to build a CLI in Rust", at).unwrap(),
                Message::new(Role::Assistant, "Use clap for argument parsing.", at).unwrap(),
            ],
            "https://chatgpt.com/c/42",
            at,
        )
    }

    fn settings(preferred: LlmProvider) -> Settings {
        Settings {
            preferred_llm: preferred,
            db_path: ":memory:".to_string(),
            ..Settings::default()
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SummaryProvider for FailingProvider {
        fn source(&self) -> SummarySource {
            SummarySource::Ollama
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            Err(AppError::Provider {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
        reply: String,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(reply: &str, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
                delay,
            }
        }
    }

    #[async_trait]
    impl SummaryProvider for CountingProvider {
        fn source(&self) -> SummarySource {
            SummarySource::Anthropic
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn failing_provider_yields_fallback_text() {
        let conv = conversation();
        let summarizer = Summarizer::with_provider(Arc::new(FailingProvider)).unwrap();

        let result = summarizer.summarize(&conv, &settings(LlmProvider::Ollama)).await;

        assert_eq!(result.source, SummarySource::Fallback);
        assert!(!result.text.is_empty());
        assert_eq!(result.text, fallback_summary(&conv, OutputFormat::Markdown));
    }

    #[tokio::test]
    async fn failing_provider_smart_fallback_uses_target_format() {
        let conv = conversation();
        let summarizer = Summarizer::with_provider(Arc::new(FailingProvider)).unwrap();

        let result = summarizer
            .smart_summarize(&conv, OutputFormat::Plain, &settings(LlmProvider::Ollama))
            .await;

        assert!(result.is_fallback());
        assert_eq!(result.text, fallback_summary(&conv, OutputFormat::Plain));
    }

    #[tokio::test]
    async fn missing_key_skips_remote_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let summarizer = Summarizer::with_endpoints(Endpoints {
            openai: server.uri(),
            openai_models: server.uri(),
            anthropic: server.uri(),
        })
        .unwrap();

        for preferred in [LlmProvider::OpenAi, LlmProvider::Anthropic, LlmProvider::Disabled] {
            let result = summarizer.summarize(&conversation(), &settings(preferred)).await;
            assert!(result.is_fallback());
        }
    }

    #[tokio::test]
    async fn ollama_success_is_attributed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("in 2-3 sentences"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "They discussed CLIs."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let summarizer = Summarizer::new().unwrap();
        let settings = Settings {
            ollama_url: server.uri(),
            summary_length: SummaryLength::Short,
            ..settings(LlmProvider::Ollama)
        };

        let result = summarizer.summarize(&conversation(), &settings).await;
        assert_eq!(result.source, SummarySource::Ollama);
        assert_eq!(result.text, "They discussed CLIs.");
    }

    #[tokio::test]
    async fn anthropic_error_status_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&server)
            .await;

        let summarizer = Summarizer::with_endpoints(Endpoints {
            openai: server.uri(),
            openai_models: server.uri(),
            anthropic: server.uri(),
        })
        .unwrap();
        let settings = Settings {
            anthropic_api_key: Some("sk-ant-test".to_string()),
            ..settings(LlmProvider::Anthropic)
        };

        let result = summarizer.summarize(&conversation(), &settings).await;
        assert!(result.is_fallback());
        assert!(result.text.contains("ChatGPT"));
    }

    #[tokio::test]
    async fn validation_is_advisory_unless_enforced() {
        let conv = conversation();
        let echoed = crate::render::render_markdown(&conv);
        let provider = Arc::new(CountingProvider::new(&echoed, Duration::ZERO));
        let summarizer = Summarizer::with_provider(provider).unwrap();

        let advisory = summarizer
            .smart_summarize(&conv, OutputFormat::Markdown, &settings(LlmProvider::Anthropic))
            .await;
        assert_eq!(advisory.source, SummarySource::Anthropic);
        assert_eq!(advisory.text, echoed);

        let enforced_settings = Settings {
            enforce_summary_validation: true,
            ..settings(LlmProvider::Anthropic)
        };
        let enforced = summarizer
            .smart_summarize(&conv, OutputFormat::Markdown, &enforced_settings)
            .await;
        assert!(enforced.is_fallback());
    }

    #[tokio::test]
    async fn enforced_validation_accepts_real_summary() {
        let provider = Arc::new(CountingProvider::new(
            "### Core Objective\nBuild a CLI.\n### Next Steps\nWire up clap subcommands.",
            Duration::ZERO,
        ));
        let summarizer = Summarizer::with_provider(provider).unwrap();
        let settings = Settings {
            enforce_summary_validation: true,
            ..settings(LlmProvider::Anthropic)
        };

        let result = summarizer
            .smart_summarize(&conversation(), OutputFormat::Markdown, &settings)
            .await;
        assert_eq!(result.source, SummarySource::Anthropic);
    }

    #[tokio::test]
    async fn overlapping_smart_requests_share_one_call() {
        let provider = Arc::new(CountingProvider::new(
            "## Key Topics\n- CLIs",
            Duration::from_millis(100),
        ));
        let summarizer = Summarizer::with_provider(provider.clone()).unwrap();
        let conv = conversation();
        let settings = settings(LlmProvider::Anthropic);

        let (a, b) = tokio::join!(
            summarizer.smart_summarize(&conv, OutputFormat::Markdown, &settings),
            summarizer.smart_summarize(&conv, OutputFormat::Markdown, &settings),
        );

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);

        // Finished requests are not cached.
        summarizer
            .smart_summarize(&conv, OutputFormat::Markdown, &settings)
            .await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_formats_do_not_coalesce() {
        let provider = Arc::new(CountingProvider::new("summary", Duration::from_millis(50)));
        let summarizer = Summarizer::with_provider(provider.clone()).unwrap();
        let conv = conversation();
        let settings = settings(LlmProvider::Anthropic);

        tokio::join!(
            summarizer.smart_summarize(&conv, OutputFormat::Markdown, &settings),
            summarizer.smart_summarize(&conv, OutputFormat::Plain, &settings),
        );

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn strict_request_does_not_join_lax_one() {
        let conv = conversation();
        let echoed = crate::render::render_markdown(&conv);
        let provider = Arc::new(CountingProvider::new(&echoed, Duration::from_millis(50)));
        let summarizer = Summarizer::with_provider(provider.clone()).unwrap();
        let lax = settings(LlmProvider::Anthropic);
        let strict = Settings {
            enforce_summary_validation: true,
            ..settings(LlmProvider::Anthropic)
        };

        let (lax_result, strict_result) = tokio::join!(
            summarizer.smart_summarize(&conv, OutputFormat::Markdown, &lax),
            summarizer.smart_summarize(&conv, OutputFormat::Markdown, &strict),
        );

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(lax_result.source, SummarySource::Anthropic);
        assert!(strict_result.is_fallback());
    }

    #[test]
    fn key_tracks_provider_settings() {
        let conv = conversation();
        let base = settings(LlmProvider::Ollama);
        let key = |s: &Settings| snapshot_key(&conv, OutputFormat::Markdown, s);

        assert_eq!(key(&base), key(&base.clone()));
        let other_model = Settings {
            ollama_model: "mistral".to_string(),
            ..base.clone()
        };
        let other_url = Settings {
            ollama_url: "http://gpu-box:11434".to_string(),
            ..base.clone()
        };
        let with_key = Settings {
            anthropic_api_key: Some("sk-ant".to_string()),
            ..base.clone()
        };
        assert_ne!(key(&base), key(&other_model));
        assert_ne!(key(&base), key(&other_url));
        assert_ne!(key(&base), key(&with_key));
    }

    #[tokio::test]
    async fn empty_conversation_never_fails() {
        let at = Utc.with_ymd_and_hms(2024, 4, 4, 10, 0, 0).unwrap();
        let conv = Conversation::new(Platform::Claude, vec![], "https://claude.ai/new", at);
        let summarizer = Summarizer::with_provider(Arc::new(FailingProvider)).unwrap();

        let result = summarizer.summarize(&conv, &settings(LlmProvider::Ollama)).await;
        assert!(result.text.contains("Claude"));
    }

    #[tokio::test]
    async fn check_connection_needs_a_provider_and_key() {
        let summarizer = Summarizer::new().unwrap();

        for preferred in [LlmProvider::OpenAi, LlmProvider::Anthropic] {
            let err = summarizer
                .check_connection(preferred, &settings(preferred))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Configuration error: API key is required");
        }

        let disabled = summarizer
            .check_connection(LlmProvider::Disabled, &settings(LlmProvider::Disabled))
            .await;
        assert!(matches!(disabled, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn check_connection_uses_models_endpoint_despite_odd_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "gpt-4"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let summarizer = Summarizer::with_endpoints(Endpoints {
            openai_models: format!("{}/v1/models", server.uri()),
            ..Endpoints::default()
        })
        .unwrap();
        let settings = Settings {
            openai_api_key: Some("sk-proj-newer-format".to_string()),
            ..settings(LlmProvider::OpenAi)
        };

        let report = summarizer
            .check_connection(LlmProvider::OpenAi, &settings)
            .await
            .unwrap();
        assert_eq!(report.source, SummarySource::OpenAi);
        assert_eq!(report.models, ["gpt-4"]);
    }
}
