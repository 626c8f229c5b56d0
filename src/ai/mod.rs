mod fallback;
mod prompt;
mod provider;
mod summarizer;
mod validator;

pub use fallback::{
    exchange_budget, extract_key_exchanges, extract_topics, fallback_summary, Exchange,
};
pub use prompt::{build_smart_prompt, build_summary_prompt, SummaryDepth};
pub use provider::{
    validate_api_key, AnthropicProvider, ConnectionReport, OllamaProvider, OpenAiProvider,
    SummaryProvider,
};
pub use summarizer::{smart_summarize_with, summarize_with, Endpoints, Summarizer};
pub use validator::{validate_summary, word_overlap, SummaryCheck};
