use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// The chat product a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Unknown => "unknown",
        }
    }

    /// Human-facing product name used in rendered output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "ChatGPT",
            Platform::Claude => "Claude",
            Platform::Unknown => "Unknown",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Platform::Unknown)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used in provider prompts.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Role::User => "Human",
            Role::Assistant => "Assistant",
        }
    }

    /// Speaker label used in rendered transcripts.
    pub fn display_label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Capture time, not the time the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Builds a message from raw page text. Returns `None` when nothing is
    /// left after trimming.
    pub fn new(role: Role, content: &str, timestamp: DateTime<Utc>) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            role,
            content: content.to_string(),
            timestamp,
        })
    }
}

/// A snapshot of one chat page. Message order is the on-page order and is
/// never changed after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub platform: Platform,
    pub messages: Vec<Message>,
    pub url: String,
    pub extracted_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        platform: Platform,
        messages: Vec<Message>,
        url: impl Into<String>,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            messages,
            url: url.into(),
            extracted_at,
        }
    }

    pub fn total_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    /// "Human: ..." / "Assistant: ..." lines separated by blank lines.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.prompt_label(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// `totalMessages` is derived, so it is written out but ignored on the way back in.
impl Serialize for Conversation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Conversation", 5)?;
        state.serialize_field("platform", &self.platform)?;
        state.serialize_field("messages", &self.messages)?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("extractedAt", &self.extracted_at)?;
        state.serialize_field("totalMessages", &self.total_messages())?;
        state.end()
    }
}
