use url::Url;

use crate::models::Platform;

const CHATGPT_PATTERNS: &[&str] = &[
    "chat.openai.com",
    "chatgpt.com",
    "openai.com/chat",
    "beta.openai.com",
    "platform.openai.com",
];

const CLAUDE_PATTERNS: &[&str] = &[
    "claude.ai",
    "console.anthropic.com",
    "beta.claude.ai",
    "app.claude.ai",
];

/// Classifies a page URL. ChatGPT patterns are checked before Claude
/// patterns, then the looser per-platform domain rules apply.
pub fn detect(url: &str) -> Platform {
    let url = url.trim().to_ascii_lowercase();
    let host = Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let matches = |patterns: &[&str]| {
        patterns
            .iter()
            .any(|p| url.contains(p) || (!host.is_empty() && host.contains(p)))
    };

    if matches(CHATGPT_PATTERNS) {
        return Platform::ChatGpt;
    }

    if matches(CLAUDE_PATTERNS) {
        return Platform::Claude;
    }

    if host.ends_with("openai.com") && (url.contains("chat") || url.contains("gpt")) {
        return Platform::ChatGpt;
    }

    if host.ends_with("anthropic.com") && url.contains("claude") {
        return Platform::Claude;
    }

    tracing::debug!("No platform matched {}", url);
    Platform::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chatgpt_urls() {
        for url in [
            "https://chatgpt.com/c/6650f0e1",
            "https://chat.openai.com/c/abc",
            "https://platform.openai.com/playground",
            "https://CHATGPT.com/",
        ] {
            assert_eq!(detect(url), Platform::ChatGpt, "{}", url);
        }
    }

    #[test]
    fn claude_urls() {
        for url in [
            "https://claude.ai/chat/1234",
            "https://app.claude.ai/new",
            "https://console.anthropic.com/workbench",
        ] {
            assert_eq!(detect(url), Platform::Claude, "{}", url);
        }
    }

    #[test]
    fn domain_fallback_rules() {
        assert_eq!(detect("https://labs.openai.com/gpt-store"), Platform::ChatGpt);
        assert_eq!(detect("https://docs.anthropic.com/claude/intro"), Platform::Claude);
        assert_eq!(detect("https://docs.anthropic.com/api"), Platform::Unknown);
    }

    #[test]
    fn unrelated_urls_are_unknown() {
        for url in [
            "https://example.com",
            "https://news.ycombinator.com/item?id=1",
            "not a url",
            "",
        ] {
            assert_eq!(detect(url), Platform::Unknown, "{}", url);
        }
    }

    #[test]
    fn detection_is_stable() {
        let url = "https://claude.ai/chat/abc";
        assert_eq!(detect(url), detect(url));
    }
}
