//! Per-page context: the platform a page was activated for, the settings
//! snapshot taken at activation, and the page's rate-limit watcher.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::ai::Summarizer;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::extract::{self, Page};
use crate::models::{Conversation, Platform, SummaryResult};
use crate::render::OutputFormat;
use crate::services::Command;
use crate::watcher::{MutationBatch, RateLimitWatcher, WatchState};

/// Result of a summarize action plus the effects it requests.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub conversation: Conversation,
    pub summary: SummaryResult,
    pub commands: Vec<Command>,
}

pub struct PageSession {
    url: String,
    platform: Platform,
    settings: Settings,
    summarizer: Arc<Summarizer>,
    watcher: Option<RateLimitWatcher>,
}

impl PageSession {
    /// Binds a session to `url`. Pages on unsupported sites are rejected.
    pub fn activate(url: &str, settings: Settings, summarizer: Arc<Summarizer>) -> Result<Self> {
        let platform = extract::detect(url);
        if !platform.is_supported() {
            return Err(AppError::UnsupportedPlatform(url.to_string()));
        }

        let watcher = settings
            .auto_detect_rate_limit
            .then(|| RateLimitWatcher::new(platform, url));
        if watcher.is_none() {
            tracing::debug!("Rate limit detection disabled for {}", url);
        }

        tracing::info!("Session active on {} ({})", platform, url);
        Ok(Self {
            url: url.to_string(),
            platform,
            settings,
            summarizer,
            watcher,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `None` when detection is turned off for this page.
    pub fn watch_state(&self) -> Option<WatchState> {
        self.watcher.as_ref().map(RateLimitWatcher::state)
    }

    pub fn on_mutations(&mut self, batch: &MutationBatch) -> Vec<Command> {
        self.on_mutations_at(batch, Utc::now())
    }

    pub fn on_mutations_at(&mut self, batch: &MutationBatch, now: DateTime<Utc>) -> Vec<Command> {
        self.watcher
            .as_mut()
            .and_then(|w| w.observe_at(batch, now))
            .map(Command::rate_limited)
            .unwrap_or_default()
    }

    pub fn extract(&self, html: &str) -> Result<Conversation> {
        self.extract_at(html, Utc::now())
    }

    pub fn extract_at(&self, html: &str, now: DateTime<Utc>) -> Result<Conversation> {
        let page = Page::parse(&self.url, html);
        extract::extract_at(&page, self.platform, now)
    }

    /// Extract, summarize with the configured provider and request the
    /// save and badge effects.
    pub async fn summarize(&self, html: &str) -> Result<Handoff> {
        let conversation = self.extract_non_empty(html)?;
        let summary = self.summarizer.summarize(&conversation, &self.settings).await;
        Ok(self.handoff(conversation, summary))
    }

    pub async fn smart_summarize(&self, html: &str, format: OutputFormat) -> Result<Handoff> {
        let conversation = self.extract_non_empty(html)?;
        let summary = self
            .summarizer
            .smart_summarize(&conversation, format, &self.settings)
            .await;
        Ok(self.handoff(conversation, summary))
    }

    /// Feeds batches to the watcher until the sender closes, forwarding
    /// the commands each batch produces.
    pub async fn watch(
        mut self,
        mut batches: mpsc::Receiver<MutationBatch>,
        commands: mpsc::Sender<Command>,
    ) -> Option<WatchState> {
        while let Some(batch) = batches.recv().await {
            for command in self.on_mutations(&batch) {
                if commands.send(command).await.is_err() {
                    tracing::debug!("Command receiver dropped, stopping watch");
                    return self.watch_state();
                }
            }
        }
        self.watch_state()
    }

    fn extract_non_empty(&self, html: &str) -> Result<Conversation> {
        let conversation = self.extract(html)?;
        if conversation.is_empty() {
            return Err(AppError::EmptyConversation);
        }
        Ok(conversation)
    }

    fn handoff(&self, conversation: Conversation, summary: SummaryResult) -> Handoff {
        let commands = Command::summarized(conversation.clone(), summary.clone());
        Handoff {
            conversation,
            summary,
            commands,
        }
    }
}
