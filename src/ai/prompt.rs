use crate::config::SummaryLength;
use crate::models::Conversation;
use crate::render::OutputFormat;

/// How deep a smart summary should go, scaled by message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDepth {
    Concise,
    Balanced,
    Comprehensive,
}

impl SummaryDepth {
    pub fn for_message_count(count: usize) -> Self {
        if count <= 3 {
            SummaryDepth::Concise
        } else if count <= 8 {
            SummaryDepth::Balanced
        } else {
            SummaryDepth::Comprehensive
        }
    }

    pub fn summary_length(&self) -> &'static str {
        match self {
            SummaryDepth::Concise => "concise",
            SummaryDepth::Balanced => "balanced",
            SummaryDepth::Comprehensive => "comprehensive",
        }
    }

    pub fn structure_depth(&self) -> &'static str {
        match self {
            SummaryDepth::Concise => "basic",
            SummaryDepth::Balanced => "detailed",
            SummaryDepth::Comprehensive => "extensive",
        }
    }

    fn guideline(&self) -> &'static str {
        match self {
            SummaryDepth::Concise => "Keep it brief but complete",
            SummaryDepth::Balanced => "Balance detail with brevity",
            SummaryDepth::Comprehensive => {
                "Provide comprehensive detail while staying organized"
            }
        }
    }
}

pub fn build_summary_prompt(conversation: &Conversation, length: SummaryLength) -> String {
    format!(
        "Please summarize this conversation {}. Focus on the main topics, key questions asked, \
and important information shared. Make it suitable for continuing the conversation \
in a new chat session.

Conversation:
{}

Summary:",
        length.instruction(),
        conversation.transcript()
    )
}

pub fn build_smart_prompt(
    conversation: &Conversation,
    format: OutputFormat,
    length: SummaryLength,
) -> String {
    let count = conversation.total_messages();
    let platform = conversation.platform.display_name();
    let depth = SummaryDepth::for_message_count(count);

    format!(
        "You are an expert conversation analyst tasked with creating a high-quality, \
structured summary of a conversation between a human and an AI assistant ({platform}). \
This summary will be used to continue the conversation in a new session, so it must \
capture all essential context, decisions, and progress made.

## ANALYSIS TASK:
Create a {summary_length} summary with {structure} structure that extracts the core \
essence and actionable insights from this conversation.

## CONVERSATION TO ANALYZE:
{transcript}

## REQUIRED STRUCTURE:
Format your response as {format} with these sections:

### Core Objective
- What was the human trying to accomplish?
- What problem were they solving?

### Key Topics & Decisions
- Main subjects discussed
- Important decisions made
- Technical specifications or requirements mentioned

### Current Progress
- What has been completed or resolved
- What solutions were provided
- Code, steps, or instructions given

### Open Questions & Next Steps
- Unresolved issues or pending questions
- Suggested next actions
- Areas that need further discussion

### Context for Continuation
- Important background information
- User preferences or constraints mentioned
- Relevant details for future interactions

## GUIDELINES:
1. **Be Precise**: Extract only essential, actionable information
2. **Be Contextual**: Focus on information needed to continue the conversation
3. **Be Structured**: Use clear sections and bullet points
4. **Be Concise**: {guideline}
5. **Be Actionable**: Include concrete next steps or follow-up items

## CONVERSATION METADATA:
- Messages: {count}
- Platform: {platform}
- Requested Length: {length}
- Summary Type: Smart AI Analysis

Generate a professional, structured summary that captures the essence of this conversation:",
        platform = platform,
        summary_length = depth.summary_length(),
        structure = depth.structure_depth(),
        transcript = conversation.transcript(),
        format = format,
        guideline = depth.guideline(),
        count = count,
        length = length.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, Platform, Role};
    use chrono::{TimeZone, Utc};

    fn conversation(n: usize) -> Conversation {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let messages = (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                Message::new(role, &format!("message {}", i), at).unwrap()
            })
            .collect();
        Conversation::new(Platform::Claude, messages, "https://claude.ai/chat/1", at)
    }

    #[test]
    fn basic_prompt_for_short_three_message_chat() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let conv = Conversation::new(
            Platform::ChatGpt,
            vec![
                Message::new(Role::User, "Hi", at).unwrap(),
                Message::new(Role::Assistant, "Hello", at).unwrap(),
                Message::new(Role::User, "Explain X", at).unwrap(),
            ],
            "https://chatgpt.com/c/1",
            at,
        );

        let prompt = build_summary_prompt(&conv, SummaryLength::Short);
        assert!(prompt.contains("2-3 sentences"));
        assert!(prompt.contains("Human: Hi\n"));
        assert!(prompt.contains("Assistant: Hello\n"));
        assert!(prompt.contains("Human: Explain X\n"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn basic_prompt_length_instructions() {
        let conv = conversation(2);
        assert!(build_summary_prompt(&conv, SummaryLength::Medium).contains("1-2 paragraphs"));
        assert!(build_summary_prompt(&conv, SummaryLength::Long)
            .contains("3-4 paragraphs with key details"));
        let prompt = build_summary_prompt(&conv, SummaryLength::parse("huge"));
        assert!(prompt.contains("1-2 paragraphs"));
    }

    #[test]
    fn depth_thresholds() {
        assert_eq!(SummaryDepth::for_message_count(0), SummaryDepth::Concise);
        assert_eq!(SummaryDepth::for_message_count(3), SummaryDepth::Concise);
        assert_eq!(SummaryDepth::for_message_count(4), SummaryDepth::Balanced);
        assert_eq!(SummaryDepth::for_message_count(8), SummaryDepth::Balanced);
        assert_eq!(SummaryDepth::for_message_count(9), SummaryDepth::Comprehensive);
    }

    #[test]
    fn smart_prompt_for_twelve_messages_is_comprehensive() {
        let prompt =
            build_smart_prompt(&conversation(12), OutputFormat::Markdown, SummaryLength::Medium);
        assert!(prompt.contains("comprehensive"));
        assert!(prompt.contains("extensive"));
        assert!(prompt.contains("- Messages: 12"));
        assert!(prompt.contains("Format your response as markdown"));
        for section in [
            "Core Objective",
            "Key Topics & Decisions",
            "Current Progress",
            "Open Questions & Next Steps",
            "Context for Continuation",
        ] {
            assert!(prompt.contains(section), "missing {}", section);
        }
    }

    #[test]
    fn smart_prompt_is_deterministic() {
        let conv = conversation(5);
        let a = build_smart_prompt(&conv, OutputFormat::Plain, SummaryLength::Short);
        let b = build_smart_prompt(&conv, OutputFormat::Plain, SummaryLength::Short);
        assert_eq!(a, b);
        assert!(a.contains("balanced"));
        assert!(a.contains("Claude"));
    }
}
