//! Turns an HTML snapshot of a chat page into a [`Conversation`].
//!
//! Each supported platform has a [`PlatformAdapter`] describing which
//! selectors locate message turns, how a turn's role is decided and where
//! its text lives. Chat sites change their markup often, so every lookup is
//! a prioritized list and the first tier that matches anything wins.

mod chatgpt;
mod claude;
mod platform;
mod text;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Conversation, Message, Platform, Role};

pub use platform::detect;
pub use text::{element_text, text_content, truncate_content};

/// A parsed snapshot of a page at one instant.
pub struct Page {
    pub url: String,
    document: Html,
}

impl Page {
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        Self {
            url: url.into(),
            document: Html::parse_document(html),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// Extraction rules for one platform.
pub struct PlatformAdapter {
    pub platform: Platform,
    /// Turn selectors, most specific first. Tiers are never merged.
    pub message_selectors: &'static [&'static str],
    /// Inner content regions, tried in order before the whole element.
    pub content_selectors: &'static [&'static str],
    /// Chrome inside a turn that is not part of the message.
    pub excluded_selectors: &'static [&'static str],
    pub detect_role: fn(&ElementRef) -> Role,
}

/// Adapter table keyed by platform.
pub fn adapter_for(platform: Platform) -> Option<&'static PlatformAdapter> {
    match platform {
        Platform::ChatGpt => Some(&chatgpt::ADAPTER),
        Platform::Claude => Some(&claude::ADAPTER),
        Platform::Unknown => None,
    }
}

pub fn extract(page: &Page, platform: Platform) -> Result<Conversation> {
    extract_at(page, platform, Utc::now())
}

/// Same as [`extract`] with an explicit capture time.
pub fn extract_at(page: &Page, platform: Platform, now: DateTime<Utc>) -> Result<Conversation> {
    let adapter = adapter_for(platform)
        .ok_or_else(|| AppError::UnsupportedPlatform(page.url.clone()))?;

    let excluded = compile(adapter.excluded_selectors);
    let content_selectors = compile(adapter.content_selectors);

    let elements = find_turns(page.document(), adapter);

    let messages: Vec<Message> = elements
        .iter()
        .filter_map(|el| {
            let role = (adapter.detect_role)(el);
            let content = turn_content(el, &content_selectors, &excluded);
            Message::new(role, &content, now)
        })
        .collect();

    tracing::debug!(
        "Extracted {} messages from {} turn elements on {}",
        messages.len(),
        elements.len(),
        platform
    );

    Ok(Conversation::new(platform, messages, page.url.clone(), now))
}

/// Returns the elements of the first selector tier that matches anything.
fn find_turns<'a>(document: &'a Html, adapter: &PlatformAdapter) -> Vec<ElementRef<'a>> {
    for raw in adapter.message_selectors {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        let found: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if !found.is_empty() {
            tracing::debug!("Selector tier {} matched {} turns", raw, found.len());
            return found;
        }
    }
    Vec::new()
}

fn turn_content(el: &ElementRef, content_selectors: &[Selector], excluded: &[Selector]) -> String {
    for selector in content_selectors {
        if let Some(inner) = el.select(selector).next() {
            return element_text(&inner, excluded);
        }
    }
    element_text(el, excluded)
}

fn compile(raw: &[&str]) -> Vec<Selector> {
    raw.iter().filter_map(|s| parse_selector(s)).collect()
}

pub(crate) fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!("Invalid selector {}: {:?}", raw, e);
            None
        }
    }
}

/// True if any descendant of `el` matches one of `selectors`.
pub(crate) fn has_descendant(el: &ElementRef, selectors: &[&str]) -> bool {
    selectors
        .iter()
        .filter_map(|s| parse_selector(s))
        .any(|s| el.select(&s).next().is_some())
}

/// The element's raw text without leading whitespace, for prefix heuristics.
pub(crate) fn leading_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim_start().to_string()
}
