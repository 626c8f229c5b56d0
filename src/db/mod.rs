mod repository;
mod schema;

pub use repository::{HistoryEntry, Repository, UsageAction, UsageStat};
