use scraper::ElementRef;

use super::{has_descendant, leading_text, PlatformAdapter};
use crate::models::{Platform, Role};

pub static ADAPTER: PlatformAdapter = PlatformAdapter {
    platform: Platform::Claude,
    message_selectors: &[
        r#"[data-is-streaming="false"]"#,
        r#"[data-testid*="turn"]"#,
        ".font-claude-message",
    ],
    content_selectors: &[".font-user-message", ".font-claude-message"],
    excluded_selectors: &[
        r#"[data-testid="copy-button"]"#,
        ".copy-button",
        ".timestamp",
        ".metadata",
    ],
    detect_role,
};

const HUMAN_MARKERS: &[&str] = &[r#"[data-testid="human-turn"]"#, ".human", ".font-user-message"];

const ASSISTANT_MARKERS: &[&str] = &[
    r#"[data-testid="assistant-turn"]"#,
    ".assistant",
    ".font-claude-message",
];

/// Turns that carry no recognizable marker are treated as assistant turns.
fn detect_role(el: &ElementRef) -> Role {
    if let Some(testid) = el.value().attr("data-testid") {
        if testid.contains("human") || testid.contains("user") {
            return Role::User;
        }
        if testid.contains("assistant") {
            return Role::Assistant;
        }
    }

    if has_descendant(el, HUMAN_MARKERS) {
        return Role::User;
    }
    if has_descendant(el, ASSISTANT_MARKERS) {
        return Role::Assistant;
    }

    let text = leading_text(el);
    if text.starts_with("Human:") {
        return Role::User;
    }
    if text.starts_with("Assistant:") {
        return Role::Assistant;
    }

    Role::Assistant
}
