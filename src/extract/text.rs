use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "button", "svg"];

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static ANY_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Rendered text of an element, roughly what a browser's `innerText` gives:
/// block elements start new lines, whitespace runs collapse, and any subtree
/// matching `excluded` is left out.
pub fn element_text(el: &ElementRef, excluded: &[Selector]) -> String {
    let mut raw = String::new();
    collect(el, excluded, &mut raw);
    normalize(&raw)
}

/// Every text node under `el`, like the DOM's `textContent`, with
/// whitespace runs collapsed to single spaces. Nothing is skipped.
pub fn text_content(el: &ElementRef) -> String {
    let raw: String = el.text().collect();
    ANY_SPACE.replace_all(&raw, " ").trim().to_string()
}

fn collect(el: &ElementRef, excluded: &[Selector], out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = element.name();
                if SKIPPED_TAGS.contains(&name) || excluded.iter().any(|s| s.matches(&child_el)) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect(&child_el, excluded, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn normalize(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Shortens `content` to at most `max_len` characters, preferring to cut at
/// a word boundary when one falls in the last fifth of the allowance.
pub fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        return content.to_string();
    }

    let keep = max_len.saturating_sub(3);
    let truncated: String = content.chars().take(keep).collect();

    if let Some(space) = truncated.rfind(' ') {
        let space_chars = truncated[..space].chars().count();
        if space_chars as f64 > max_len as f64 * 0.8 {
            return format!("{}...", &truncated[..space]);
        }
    }

    format!("{}...", truncated)
}
