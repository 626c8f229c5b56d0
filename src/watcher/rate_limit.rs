use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::mutation::MutationBatch;
use crate::models::Platform;

/// Per-node cap on scanned text so a huge insertion cannot stall a batch.
const MAX_SCAN_CHARS: usize = 16 * 1024;

/// Cap on the text carried in a detection event.
const MAX_MATCHED_TEXT_CHARS: usize = 500;

const CHATGPT_INDICATORS: &[&str] = &[
    "too many requests",
    "rate limit",
    "please try again later",
    "quota exceeded",
    "temporarily unavailable",
    "you have reached your",
    "usage limit",
];

const CLAUDE_INDICATORS: &[&str] = &[
    "rate limit",
    "too many messages",
    "please wait",
    "quota exceeded",
    "usage limit",
    "try again in",
    "temporarily unavailable",
];

pub fn indicators_for(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::ChatGpt => CHATGPT_INDICATORS,
        Platform::Claude => CLAUDE_INDICATORS,
        Platform::Unknown => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Armed,
    /// Terminal for the lifetime of the watcher.
    Tripped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEvent {
    pub platform: Platform,
    pub matched_text: String,
    pub indicator: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// One-shot rate-limit detector for a single page lifetime.
#[derive(Debug)]
pub struct RateLimitWatcher {
    platform: Platform,
    url: String,
    state: WatchState,
}

impl RateLimitWatcher {
    pub fn new(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            platform,
            url: url.into(),
            state: WatchState::Armed,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn is_tripped(&self) -> bool {
        self.state == WatchState::Tripped
    }

    pub fn observe(&mut self, batch: &MutationBatch) -> Option<RateLimitEvent> {
        self.observe_at(batch, Utc::now())
    }

    /// Scans only the nodes added by `batch`. Returns an event the first
    /// time an indicator phrase shows up; afterwards it returns `None`
    /// without looking at the batch.
    pub fn observe_at(
        &mut self,
        batch: &MutationBatch,
        now: DateTime<Utc>,
    ) -> Option<RateLimitEvent> {
        if self.is_tripped() {
            return None;
        }

        let indicators = indicators_for(self.platform);
        if indicators.is_empty() {
            return None;
        }

        for node in &batch.added {
            let Some(text) = node.element_text() else {
                continue;
            };
            let scanned: String = text.chars().take(MAX_SCAN_CHARS).collect();
            let lowered = scanned.to_lowercase();

            if let Some(indicator) = indicators.iter().find(|i| lowered.contains(*i)) {
                self.state = WatchState::Tripped;
                tracing::info!("Rate limit detected on {} ({:?})", self.platform, indicator);
                return Some(RateLimitEvent {
                    platform: self.platform,
                    matched_text: scanned.chars().take(MAX_MATCHED_TEXT_CHARS).collect(),
                    indicator: indicator.to_string(),
                    url: self.url.clone(),
                    timestamp: now,
                });
            }
        }

        None
    }

    /// Consumes mutation batches until the sender closes, forwarding the
    /// single detection event if one occurs.
    pub async fn run(
        mut self,
        mut batches: mpsc::Receiver<MutationBatch>,
        events: mpsc::Sender<RateLimitEvent>,
    ) -> WatchState {
        while let Some(batch) = batches.recv().await {
            if let Some(event) = self.observe(&batch) {
                if events.send(event).await.is_err() {
                    tracing::debug!("Rate limit event receiver dropped");
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::AddedNode;

    fn watcher(platform: Platform) -> RateLimitWatcher {
        RateLimitWatcher::new(platform, "https://chatgpt.com/c/1")
    }

    #[test]
    fn trips_on_case_insensitive_match() {
        let mut w = watcher(Platform::ChatGpt);
        let batch = MutationBatch::element(
            "<div class='toast'><p>Too Many Requests. Please slow down.</p></div>",
        );

        let event = w.observe(&batch).expect("should trip");
        assert_eq!(event.platform, Platform::ChatGpt);
        assert_eq!(event.indicator, "too many requests");
        assert!(event.matched_text.contains("Too Many Requests"));
        assert_eq!(event.url, "https://chatgpt.com/c/1");
        assert_eq!(w.state(), WatchState::Tripped);
    }

    #[test]
    fn fires_at_most_once() {
        let mut w = watcher(Platform::Claude);
        let hit = MutationBatch::element("<div>You have hit the usage limit.</div>");

        assert!(w.observe(&hit).is_some());
        for _ in 0..5 {
            assert!(w.observe(&hit).is_none());
        }
        assert!(w.is_tripped());
    }

    #[test]
    fn unrelated_and_text_nodes_do_not_trip() {
        let mut w = watcher(Platform::ChatGpt);
        let batch = MutationBatch::new(vec![
            AddedNode::Element("<p>Here is your answer about rates.</p>".to_string()),
            AddedNode::Text("rate limit".to_string()),
        ]);

        assert!(w.observe(&batch).is_none());
        assert_eq!(w.state(), WatchState::Armed);
    }

    #[test]
    fn indicator_sets_are_platform_specific() {
        let batch = MutationBatch::element("<div>Too many messages in a short period</div>");

        assert!(watcher(Platform::ChatGpt).observe(&batch).is_none());
        assert!(watcher(Platform::Claude).observe(&batch).is_some());
        assert!(watcher(Platform::Unknown).observe(&batch).is_none());
    }

    #[test]
    fn match_in_later_node_of_batch() {
        let mut w = watcher(Platform::ChatGpt);
        let batch = MutationBatch::new(vec![
            AddedNode::Element("<span>typing...</span>".to_string()),
            AddedNode::Element("<div>Quota exceeded for this model</div>".to_string()),
        ]);
        assert_eq!(w.observe(&batch).unwrap().indicator, "quota exceeded");
    }

    #[test]
    fn notice_inside_button_trips() {
        let mut w = watcher(Platform::ChatGpt);
        let batch = MutationBatch::element(
            "<div role='alert'><button>Rate limit reached. Please try again later.</button></div>",
        );

        let event = w.observe(&batch).expect("button text is scanned");
        assert_eq!(event.indicator, "rate limit");
        assert_eq!(event.matched_text, "Rate limit reached. Please try again later.");
        assert!(w.is_tripped());
    }

    #[test]
    fn bare_button_element_trips() {
        let mut w = watcher(Platform::ChatGpt);
        let batch = MutationBatch::element("<button>Too many requests</button>");
        assert_eq!(w.observe(&batch).unwrap().indicator, "too many requests");
    }

    #[tokio::test]
    async fn run_forwards_single_event() {
        let (batch_tx, batch_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let handle = tokio::spawn(watcher(Platform::ChatGpt).run(batch_rx, event_tx));

        batch_tx.send(MutationBatch::element("<p>hello</p>")).await.unwrap();
        batch_tx
            .send(MutationBatch::element("<p>Rate limit reached</p>"))
            .await
            .unwrap();
        batch_tx
            .send(MutationBatch::element("<p>Rate limit reached again</p>"))
            .await
            .unwrap();
        drop(batch_tx);

        let final_state = handle.await.unwrap();
        assert_eq!(final_state, WatchState::Tripped);

        let first = event_rx.recv().await.unwrap();
        assert_eq!(first.indicator, "rate limit");
        assert!(event_rx.recv().await.is_none());
    }
}
