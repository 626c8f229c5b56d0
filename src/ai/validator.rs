use std::collections::HashSet;

const SUMMARY_INDICATORS: &[&str] = &[
    "core objective",
    "key topics",
    "main goals",
    "summary",
    "progress made",
    "next steps",
    "decisions",
    "important points",
    "context for continuation",
];

/// Above this overlap a result is considered an echo of the transcript.
pub const MAX_SIMILARITY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryCheck {
    pub has_indicators: bool,
    pub similarity: f64,
}

impl SummaryCheck {
    pub fn is_summary(&self) -> bool {
        self.has_indicators && self.similarity < MAX_SIMILARITY
    }
}

/// Scores whether `summary` reads like a summary of `original` rather than
/// a copy of it.
pub fn validate_summary(summary: &str, original: &str) -> SummaryCheck {
    let lowered = summary.to_lowercase();
    let has_indicators = SUMMARY_INDICATORS.iter().any(|i| lowered.contains(i));
    let similarity = word_overlap(summary, original);

    tracing::debug!(
        "Summary check: indicators={} similarity={:.2} ({} vs {} chars)",
        has_indicators,
        similarity,
        summary.len(),
        original.len()
    );

    SummaryCheck {
        has_indicators,
        similarity,
    }
}

/// Share of `a`'s words (with repeats) that also appear in `b`, relative to
/// the longer of the two word lists.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let words_a: Vec<&str> = a_lower.split_whitespace().collect();
    let words_b: Vec<&str> = b_lower.split_whitespace().collect();

    let longest = words_a.len().max(words_b.len());
    if longest == 0 {
        return 0.0;
    }

    let vocabulary: HashSet<&str> = words_b.iter().copied().collect();
    let shared = words_a.iter().filter(|w| vocabulary.contains(*w)).count();
    shared as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str =
        "You: how do I parse json in rust\n\nAssistant: use serde_json with derive";

    #[test]
    fn structured_summary_passes() {
        let summary = "### Core Objective\nParse JSON.\n### Next Steps\nTry serde.";
        let check = validate_summary(summary, TRANSCRIPT);
        assert!(check.has_indicators);
        assert!(check.is_summary());
    }

    #[test]
    fn echoed_transcript_fails() {
        let echoed = format!("Summary\n{}", TRANSCRIPT);
        let check = validate_summary(&echoed, TRANSCRIPT);
        assert!(check.has_indicators);
        assert!(check.similarity >= MAX_SIMILARITY);
        assert!(!check.is_summary());
    }

    #[test]
    fn text_without_indicators_fails() {
        let check = validate_summary("They talked about JSON.", TRANSCRIPT);
        assert!(!check.has_indicators);
        assert!(!check.is_summary());
    }

    #[test]
    fn overlap_edges() {
        assert_eq!(word_overlap("", ""), 0.0);
        assert_eq!(word_overlap("a b", "a b"), 1.0);
        assert_eq!(word_overlap("a b c d", "a b"), 0.5);
    }
}
