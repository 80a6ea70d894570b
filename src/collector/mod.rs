pub mod channel;
pub mod history;

#[cfg(test)]
mod tests;

pub use channel::{ChannelResolver, ResolveState};
pub use history::{filter_before, HistoryCollector};
