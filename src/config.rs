use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "chat-handoff";

/// Which summarization backend the user prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    /// Anything unrecognized; summaries go straight to the local fallback.
    #[serde(rename = "none")]
    Disabled,
}

impl From<String> for LlmProvider {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => LlmProvider::Ollama,
            "openai" => LlmProvider::OpenAi,
            "anthropic" => LlmProvider::Anthropic,
            _ => LlmProvider::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl From<String> for SummaryLength {
    fn from(value: String) -> Self {
        SummaryLength::parse(&value)
    }
}

impl SummaryLength {
    /// Unrecognized values map to `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "short" => SummaryLength::Short,
            "long" => SummaryLength::Long,
            _ => SummaryLength::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Long => "long",
        }
    }

    /// Length instruction appended to the basic prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            SummaryLength::Short => "in 2-3 sentences",
            SummaryLength::Medium => "in 1-2 paragraphs",
            SummaryLength::Long => "in 3-4 paragraphs with key details",
        }
    }

    /// Per-request token ceiling for remote providers.
    pub fn max_tokens(&self) -> u32 {
        match self {
            SummaryLength::Short => 150,
            SummaryLength::Medium => 300,
            SummaryLength::Long => 500,
        }
    }
}

/// User settings. Read once per operation and never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_preferred_llm")]
    pub preferred_llm: LlmProvider,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,

    #[serde(default)]
    pub summary_length: SummaryLength,

    #[serde(default = "default_true")]
    pub auto_detect_rate_limit: bool,

    #[serde(default = "default_true")]
    pub enable_notifications: bool,

    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Reject remote smart summaries that look like an echoed transcript.
    #[serde(default)]
    pub enforce_summary_validation: bool,

    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_preferred_llm() -> LlmProvider {
    LlmProvider::Ollama
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    50
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("history.db").to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preferred_llm: default_preferred_llm(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            openai_api_key: None,
            anthropic_api_key: None,
            summary_length: SummaryLength::default(),
            auto_detect_rate_limit: true,
            enable_notifications: true,
            max_history: default_max_history(),
            enforce_summary_validation: false,
            db_path: default_db_path(),
        }
    }
}

impl Settings {
    /// Reads settings from the default location. A settings store that
    /// cannot be read behaves like an empty one.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Settings unavailable ({}), using defaults", e);
                Settings::default()
            }
        }
    }

    /// Reads settings from `path`, writing defaults there if the file does
    /// not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save_to(path)?;
            Ok(settings)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn openai_key(&self) -> Option<&str> {
        non_empty(self.openai_api_key.as_deref())
    }

    pub fn anthropic_key(&self) -> Option<&str> {
        non_empty(self.anthropic_api_key.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
