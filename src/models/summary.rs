use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;

/// Who produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Ollama,
    OpenAi,
    Anthropic,
    Fallback,
}

impl SummarySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarySource::Ollama => "ollama",
            SummarySource::OpenAi => "openai",
            SummarySource::Anthropic => "anthropic",
            SummarySource::Fallback => "fallback",
        }
    }

    /// Unknown names read back as `Fallback`.
    pub fn parse(value: &str) -> Self {
        match value {
            "ollama" => SummarySource::Ollama,
            "openai" => SummarySource::OpenAi,
            "anthropic" => SummarySource::Anthropic,
            _ => SummarySource::Fallback,
        }
    }
}

impl From<LlmProvider> for SummarySource {
    fn from(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Ollama => SummarySource::Ollama,
            LlmProvider::OpenAi => SummarySource::OpenAi,
            LlmProvider::Anthropic => SummarySource::Anthropic,
            LlmProvider::Disabled => SummarySource::Fallback,
        }
    }
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub text: String,
    pub source: SummarySource,
    pub generated_at: DateTime<Utc>,
}

impl SummaryResult {
    pub fn new(text: String, source: SummarySource) -> Self {
        Self {
            text,
            source,
            generated_at: Utc::now(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SummarySource::Fallback
    }
}
