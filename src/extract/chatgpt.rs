use scraper::ElementRef;

use super::{has_descendant, leading_text, PlatformAdapter};
use crate::models::{Platform, Role};

pub static ADAPTER: PlatformAdapter = PlatformAdapter {
    platform: Platform::ChatGpt,
    message_selectors: &[
        "[data-message-author-role]",
        r#"[data-testid^="conversation-turn"]"#,
        ".group.w-full",
    ],
    content_selectors: &[
        ".markdown",
        "[data-message-content]",
        ".whitespace-pre-wrap",
        ".prose",
    ],
    excluded_selectors: &[],
    detect_role,
};

const USER_MARKERS: &[&str] = &[
    r#"[data-message-author-role="user"]"#,
    r#"[data-testid="user-message"]"#,
];

const ASSISTANT_MARKERS: &[&str] = &[r#"[data-message-author-role="assistant"]"#];

fn detect_role(el: &ElementRef) -> Role {
    if let Some(author) = el.value().attr("data-message-author-role") {
        return if author == "user" { Role::User } else { Role::Assistant };
    }

    if has_descendant(el, USER_MARKERS) {
        return Role::User;
    }
    if has_descendant(el, ASSISTANT_MARKERS) {
        return Role::Assistant;
    }

    if leading_text(el).starts_with("You:") || el.value().classes().any(|c| c == "user") {
        return Role::User;
    }

    Role::Assistant
}
