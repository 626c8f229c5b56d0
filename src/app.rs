use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use chat_handoff::ai::{build_smart_prompt, build_summary_prompt, ConnectionReport, Summarizer};
use chat_handoff::config::{LlmProvider, Settings};
use chat_handoff::db::{HistoryEntry, Repository, UsageAction, UsageStat};
use chat_handoff::error::{AppError, Result};
use chat_handoff::models::SummaryResult;
use chat_handoff::render::{render, OutputFormat};
use chat_handoff::services::{Command, CommandDispatcher, LogNotifier, ResultSink};
use chat_handoff::session::PageSession;
use chat_handoff::watcher::{MutationBatch, RateLimitEvent};

pub struct App {
    settings: Settings,
    repository: Arc<Repository>,
    summarizer: Arc<Summarizer>,
    dispatcher: CommandDispatcher,
}

impl App {
    pub async fn new(settings: Settings) -> Result<Self> {
        let repository = Arc::new(
            Repository::new(&settings.db_path)
                .await?
                .with_max_history(settings.max_history),
        );
        let summarizer = Arc::new(Summarizer::new()?);
        let dispatcher = CommandDispatcher::new(
            Arc::new(LogNotifier),
            repository.clone() as Arc<dyn ResultSink>,
            &settings,
        );

        Ok(Self {
            settings,
            repository,
            summarizer,
            dispatcher,
        })
    }

    fn session(&self, url: &str) -> Result<PageSession> {
        PageSession::activate(url, self.settings.clone(), self.summarizer.clone())
    }

    /// Renders the page's conversation for pasting into another chat.
    pub async fn extract(&self, url: &str, html: &str, format: OutputFormat) -> Result<String> {
        let session = self.session(url)?;
        let conversation = session.extract(html)?;
        let rendered = render(&conversation, format)?;

        if let Err(e) = self
            .repository
            .record_usage(UsageAction::Transfer, session.platform().as_str())
            .await
        {
            tracing::warn!("Failed to record usage: {}", e);
        }
        Ok(rendered)
    }

    pub async fn summarize(
        &self,
        url: &str,
        html: &str,
        smart: bool,
        format: OutputFormat,
    ) -> Result<SummaryResult> {
        let session = self.session(url)?;
        let handoff = if smart {
            session.smart_summarize(html, format).await?
        } else {
            session.summarize(html).await?
        };

        self.dispatcher.dispatch(handoff.commands).await;
        Ok(handoff.summary)
    }

    pub fn prompt(
        &self,
        url: &str,
        html: &str,
        smart: bool,
        format: OutputFormat,
    ) -> Result<String> {
        let session = self.session(url)?;
        let conversation = session.extract(html)?;
        let length = self.settings.summary_length;
        Ok(if smart {
            build_smart_prompt(&conversation, format, length)
        } else {
            build_summary_prompt(&conversation, length)
        })
    }

    /// Treats each non-blank input line as one batch of added elements.
    /// Returns the detection, if the input contained one.
    pub async fn watch(
        &self,
        url: &str,
        input: Box<dyn AsyncBufRead + Unpin + Send>,
    ) -> Result<Option<RateLimitEvent>> {
        let session = self.session(url)?;
        let (batch_tx, batch_rx) = mpsc::channel(32);
        let (command_tx, mut command_rx) = mpsc::channel(32);

        let watcher = tokio::spawn(session.watch(batch_rx, command_tx));
        let feeder = tokio::spawn(async move {
            let mut lines = input.lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                if batch_tx.send(MutationBatch::element(line)).await.is_err() {
                    break;
                }
            }
            Ok::<_, std::io::Error>(())
        });

        let mut detected = None;
        while let Some(command) = command_rx.recv().await {
            if let Command::NotifyRateLimit(event) = &command {
                detected.get_or_insert_with(|| event.clone());
            }
            self.dispatcher.dispatch(vec![command]).await;
        }

        feeder.await.map_err(|e| AppError::Other(e.into()))??;
        let state = watcher.await.map_err(|e| AppError::Other(e.into()))?;
        tracing::debug!("Watch finished in state {:?}", state);

        Ok(detected)
    }

    /// Tests `provider`, or the preferred one when none is given.
    pub async fn check(&self, provider: Option<LlmProvider>) -> Result<ConnectionReport> {
        let provider = provider.unwrap_or(self.settings.preferred_llm);
        self.summarizer.check_connection(provider, &self.settings).await
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.repository.recent(limit).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.repository.clear().await
    }

    pub async fn delete_history(&self, id: i64) -> Result<bool> {
        self.repository.delete(id).await
    }

    pub async fn stats(&self) -> Result<Vec<UsageStat>> {
        self.repository.usage_stats().await
    }
}
