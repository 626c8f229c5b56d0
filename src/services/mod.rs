//! Side effects requested by the core, and the collaborators that carry
//! them out. The core never performs I/O on its own; it returns
//! [`Command`]s and a [`CommandDispatcher`] runs them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::Result;
use crate::models::{Conversation, SummaryResult};
use crate::watcher::RateLimitEvent;

pub const ALERT_BADGE: &str = "!";
pub const ALERT_COLOR: &str = "#FF4444";
pub const DONE_BADGE: &str = "✓";
pub const DONE_COLOR: &str = "#10B981";
pub const DONE_BADGE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NotifyRateLimit(RateLimitEvent),
    SetBadge { text: String, color: String },
    ClearBadge { after: Duration },
    ShowTransferButton,
    SaveResult {
        conversation: Conversation,
        summary: SummaryResult,
    },
}

impl Command {
    pub fn badge(text: &str, color: &str) -> Self {
        Command::SetBadge {
            text: text.to_string(),
            color: color.to_string(),
        }
    }

    /// Commands emitted when a rate limit is first seen on a page.
    pub fn rate_limited(event: RateLimitEvent) -> Vec<Command> {
        vec![
            Command::NotifyRateLimit(event),
            Command::badge(ALERT_BADGE, ALERT_COLOR),
            Command::ShowTransferButton,
        ]
    }

    /// Commands emitted after a manual summary completes.
    pub fn summarized(conversation: Conversation, summary: SummaryResult) -> Vec<Command> {
        vec![
            Command::SaveResult {
                conversation,
                summary,
            },
            Command::badge(DONE_BADGE, DONE_COLOR),
            Command::ClearBadge {
                after: DONE_BADGE_TTL,
            },
        ]
    }
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn get_settings(&self) -> Settings;
}

/// A fixed snapshot, mostly for tests and one-shot CLI runs.
#[async_trait]
impl SettingsSource for Settings {
    async fn get_settings(&self) -> Settings {
        self.clone()
    }
}

/// Reads the TOML settings file on every request.
#[derive(Debug, Default)]
pub struct FileSettings {
    path: Option<PathBuf>,
}

impl FileSettings {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

#[async_trait]
impl SettingsSource for FileSettings {
    async fn get_settings(&self) -> Settings {
        match &self.path {
            Some(path) => Settings::load_from(path).unwrap_or_else(|e| {
                tracing::warn!("Settings unavailable ({}), using defaults", e);
                Settings::default()
            }),
            None => Settings::load(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify_rate_limit_detected(&self, event: &RateLimitEvent);
}

/// Reports detections through the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_rate_limit_detected(&self, event: &RateLimitEvent) {
        tracing::warn!(
            "Rate limit on {} ({}): {}",
            event.platform,
            event.url,
            event.matched_text
        );
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save_result(&self, conversation: &Conversation, summary: &SummaryResult) -> Result<()>;
}

/// Runs commands against the collaborators.
pub struct CommandDispatcher {
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn ResultSink>,
    notifications_enabled: bool,
}

impl CommandDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn ResultSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            notifier,
            sink,
            notifications_enabled: settings.enable_notifications,
        }
    }

    /// Storage failures are logged and do not stop the remaining commands.
    pub async fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch_one(command).await;
        }
    }

    async fn dispatch_one(&self, command: Command) {
        match command {
            Command::NotifyRateLimit(event) => {
                if self.notifications_enabled {
                    self.notifier.notify_rate_limit_detected(&event);
                } else {
                    tracing::debug!("Notifications disabled, skipping rate limit notice");
                }
            }
            Command::SetBadge { text, color } => {
                tracing::info!("Badge set to {:?} ({})", text, color);
            }
            Command::ClearBadge { after } => {
                tracing::debug!("Badge clears in {:?}", after);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    tracing::debug!("Badge cleared");
                });
            }
            Command::ShowTransferButton => {
                tracing::info!("Transfer action offered");
            }
            Command::SaveResult {
                conversation,
                summary,
            } => {
                if let Err(e) = self.sink.save_result(&conversation, &summary).await {
                    tracing::warn!("Failed to save summary to history: {}", e);
                }
            }
        }
    }
}
