mod mutation;
mod rate_limit;

pub use mutation::{AddedNode, MutationBatch};
pub use rate_limit::{indicators_for, RateLimitEvent, RateLimitWatcher, WatchState};
