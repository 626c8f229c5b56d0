//! Deterministic renderings of a [`Conversation`].
//!
//! `Json` is a lossless serialization. The other formats are for people:
//! a header naming the platform and extraction time, one block per message,
//! and a fixed footer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Conversation, Role};

pub const FOOTER: &str = "Generated by Chat Handoff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Plain,
    Json,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Plain => "plain",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "plain" | "text" | "txt" => Ok(OutputFormat::Plain),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            other => Err(AppError::Config(format!("unknown output format: {}", other))),
        }
    }
}

pub fn render(conversation: &Conversation, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(conversation)),
        OutputFormat::Plain => Ok(render_plain(conversation)),
        OutputFormat::Json => render_json(conversation),
        OutputFormat::Html => Ok(render_html(conversation)),
    }
}

pub fn render_json(conversation: &Conversation) -> Result<String> {
    Ok(serde_json::to_string_pretty(conversation)?)
}

pub fn parse_json(json: &str) -> Result<Conversation> {
    Ok(serde_json::from_str(json)?)
}

pub fn render_markdown(conversation: &Conversation) -> String {
    let mut out = format!("# Conversation Context ({})\n\n", conversation.platform);
    out.push_str(&format!("*Extracted: {}*\n\n", timestamp(&conversation.extracted_at)));
    out.push_str("---\n\n");

    let last = conversation.messages.len().saturating_sub(1);
    for (i, msg) in conversation.messages.iter().enumerate() {
        out.push_str(&format!("**{}**:\n{}\n\n", msg.role.display_label(), msg.content));
        if i < last {
            out.push_str("---\n\n");
        }
    }

    out.push_str(&format!("\n*{}*", FOOTER));
    out
}

pub fn render_plain(conversation: &Conversation) -> String {
    let mut out = format!("Conversation Context ({})\n", conversation.platform);
    out.push_str(&format!("Extracted: {}\n\n", timestamp(&conversation.extracted_at)));
    out.push_str(&format!("{}\n\n", "=".repeat(50)));

    let last = conversation.messages.len().saturating_sub(1);
    for (i, msg) in conversation.messages.iter().enumerate() {
        out.push_str(&format!("{}: {}\n\n", msg.role.display_label(), msg.content));
        if i < last {
            out.push_str(&format!("{}\n\n", "-".repeat(30)));
        }
    }

    out.push_str(&format!("\n{}", FOOTER));
    out
}

const HTML_STYLE: &str = r#"    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
      line-height: 1.6;
      max-width: 800px;
      margin: 0 auto;
      padding: 20px;
    }
    .header { text-align: center; margin-bottom: 30px; }
    .message { margin: 20px 0; padding: 15px; border-radius: 10px; }
    .user { border-left: 4px solid #333; background: #f4f4f4; }
    .assistant { border-left: 4px solid #999; }
    .role { font-weight: bold; margin-bottom: 8px; }
    .content { white-space: pre-wrap; }
    .footer { text-align: center; margin-top: 30px; opacity: 0.6; }
"#;

pub fn render_html(conversation: &Conversation) -> String {
    let platform = escape_html(conversation.platform.display_name());
    let extracted = timestamp(&conversation.extracted_at);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n");
    out.push_str(&format!("  <title>Conversation Context - {}</title>\n", platform));
    out.push_str("  <style>\n");
    out.push_str(HTML_STYLE);
    out.push_str("  </style>\n</head>\n<body>\n");
    out.push_str("  <div class=\"header\">\n");
    out.push_str(&format!("    <h1>Conversation Context - {}</h1>\n", platform));
    out.push_str(&format!("    <p>Extracted: {}</p>\n", extracted));
    out.push_str("  </div>\n");

    for msg in &conversation.messages {
        let class = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        out.push_str(&format!("  <div class=\"message {}\">\n", class));
        out.push_str(&format!("    <div class=\"role\">{}</div>\n", msg.role.display_label()));
        out.push_str(&format!(
            "    <div class=\"content\">{}</div>\n",
            escape_html(&msg.content)
        ));
        out.push_str("  </div>\n");
    }

    out.push_str(&format!("  <div class=\"footer\">\n    <p>{}</p>\n  </div>\n", FOOTER));
    out.push_str("</body>\n</html>\n");
    out
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
