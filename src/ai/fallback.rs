//! Provider-free summaries built from the conversation itself.

use std::collections::HashSet;

use crate::models::{Conversation, Message, Role};
use crate::render::OutputFormat;

const TOPIC_TRIGGERS: &[&str] = &[
    "about", "how", "what", "why", "when", "where", "help", "explain", "create", "build", "make",
];

const MAX_TOPICS: usize = 5;
const TOPIC_WORDS: usize = 4;
const MIN_TOPIC_CHARS: usize = 10;

const EXCHANGE_TITLE_CHARS: usize = 50;
const EXCHANGE_USER_CHARS: usize = 150;
const EXCHANGE_ASSISTANT_CHARS: usize = 200;

/// Maximum number of exchanges any fallback summary will show.
pub const MAX_EXCHANGES: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub topic: String,
    pub user_message: String,
    pub assistant_message: String,
}

/// How many exchanges to keep: 2 up to 5 messages, 4 up to 15, then 6.
pub fn exchange_budget(message_count: usize) -> usize {
    if message_count <= 5 {
        2
    } else if message_count <= 15 {
        4
    } else {
        MAX_EXCHANGES
    }
}

pub fn fallback_summary(conversation: &Conversation, format: OutputFormat) -> String {
    let platform = conversation.platform.display_name();
    let topics = extract_topics(&conversation.messages);
    let exchanges = extract_key_exchanges(
        &conversation.messages,
        exchange_budget(conversation.total_messages()),
    );

    let mut out = String::new();
    if format == OutputFormat::Markdown {
        out.push_str(&format!("# Conversation Summary - {}\n\n", platform));
        out.push_str("## Key Topics\n");
        for topic in &topics {
            out.push_str(&format!("- {}\n", topic));
        }
        out.push_str("\n## Key Exchanges\n");
        for exchange in &exchanges {
            out.push_str(&format!("### {}\n", exchange.topic));
            out.push_str(&format!("**You**: {}\n\n", exchange.user_message));
            out.push_str(&format!("**Assistant**: {}\n\n", exchange.assistant_message));
        }
    } else {
        out.push_str(&format!("Conversation Summary - {}\n\n", platform));
        out.push_str("Key Topics:\n");
        for topic in &topics {
            out.push_str(&format!("• {}\n", topic));
        }
        out.push_str("\nKey Exchanges:\n");
        for exchange in &exchanges {
            out.push_str(&format!("\n{}:\n", exchange.topic));
            out.push_str(&format!("You: {}\n", exchange.user_message));
            out.push_str(&format!("Assistant: {}\n", exchange.assistant_message));
        }
    }

    out
}

/// Short phrases following a trigger word in user turns, first seen first.
pub fn extract_topics(messages: &[Message]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for msg in messages.iter().filter(|m| m.role == Role::User) {
        let lowered = msg.content.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        for (i, word) in words.iter().enumerate() {
            if !TOPIC_TRIGGERS.contains(word) || i + 1 >= words.len() {
                continue;
            }
            let end = (i + TOPIC_WORDS).min(words.len());
            let topic = words[i..end].join(" ");
            if topic.chars().count() > MIN_TOPIC_CHARS && seen.insert(topic.clone()) {
                topics.push(topic);
            }
        }
    }

    topics.truncate(MAX_TOPICS);
    topics
}

/// The last `max` user→assistant pairs, with each side clipped.
pub fn extract_key_exchanges(messages: &[Message], max: usize) -> Vec<Exchange> {
    let mut exchanges: Vec<Exchange> = messages
        .windows(2)
        .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
        .map(|pair| {
            let first_sentence = pair[0]
                .content
                .split(['.', '!', '?'])
                .next()
                .unwrap_or_default();
            Exchange {
                topic: format!("{}...", clip(first_sentence, EXCHANGE_TITLE_CHARS)),
                user_message: ellipsize(&pair[0].content, EXCHANGE_USER_CHARS),
                assistant_message: ellipsize(&pair[1].content, EXCHANGE_ASSISTANT_CHARS),
            }
        })
        .collect();

    let skip = exchanges.len().saturating_sub(max.min(MAX_EXCHANGES));
    exchanges.drain(..skip);
    exchanges
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", clip(text, max_chars))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use chrono::{TimeZone, Utc};

    fn conversation(pairs: usize) -> Conversation {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap();
        let mut messages = Vec::new();
        for i in 0..pairs {
            let question = format!("Question {} about lifetimes in rust?", i);
            messages.push(Message::new(Role::User, &question, at).unwrap());
            messages.push(Message::new(Role::Assistant, &format!("Answer {}.", i), at).unwrap());
        }
        Conversation::new(Platform::Claude, messages, "https://claude.ai/chat/9", at)
    }

    #[test]
    fn budget_thresholds() {
        assert_eq!(exchange_budget(5), 2);
        assert_eq!(exchange_budget(6), 4);
        assert_eq!(exchange_budget(15), 4);
        assert_eq!(exchange_budget(16), 6);
    }

    #[test]
    fn long_conversation_is_capped_at_six_recent_exchanges() {
        let conv = conversation(20);
        let summary = fallback_summary(&conv, OutputFormat::Markdown);

        assert!(summary.contains("Claude"));
        assert_eq!(summary.matches("**You**:").count(), 6);
        assert!(summary.contains("Question 19"));
        assert!(!summary.contains("Question 13 "));
    }

    #[test]
    fn short_conversation_keeps_two_exchanges_in_plain_text() {
        let conv = conversation(2);
        let summary = fallback_summary(&conv, OutputFormat::Plain);

        assert!(summary.starts_with("Conversation Summary - Claude"));
        assert_eq!(summary.matches("\nYou: ").count(), 2);
        assert!(summary.contains("• about lifetimes in rust?"));
    }

    #[test]
    fn empty_conversation_still_names_platform() {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap();
        let conv = Conversation::new(Platform::ChatGpt, vec![], "https://chatgpt.com", at);
        let summary = fallback_summary(&conv, OutputFormat::Html);
        assert!(summary.contains("ChatGPT"));
    }

    #[test]
    fn topics_are_deduplicated_and_limited() {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap();
        let messages: Vec<Message> = [
            "how do I build a parser",
            "how do I build a parser",
            "explain the borrow checker please",
            "help me create a web server",
            "what is a trait object",
            "why does this lifetime fail",
            "where should tests live",
        ]
        .iter()
        .map(|t| Message::new(Role::User, t, at).unwrap())
        .collect();

        let topics = extract_topics(&messages);
        assert_eq!(topics.len(), 5);
        assert_eq!(topics[0], "how do i build");
        assert_eq!(topics.iter().filter(|t| t.as_str() == "how do i build").count(), 1);
    }

    #[test]
    fn exchange_text_is_clipped() {
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap();
        let long_user = "u".repeat(400);
        let long_reply = "a".repeat(400);
        let messages = vec![
            Message::new(Role::User, &long_user, at).unwrap(),
            Message::new(Role::Assistant, &long_reply, at).unwrap(),
        ];
        let exchanges = extract_key_exchanges(&messages, 2);

        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].topic.chars().count(), 53);
        assert_eq!(exchanges[0].user_message.chars().count(), 153);
        assert_eq!(exchanges[0].assistant_message.chars().count(), 203);
    }
}
