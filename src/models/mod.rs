mod conversation;
mod summary;

pub use conversation::{Conversation, Message, Platform, Role};
pub use summary::{SummaryResult, SummarySource};
