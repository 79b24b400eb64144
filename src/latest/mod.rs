//! Latest value caching and change notification

mod cache;
mod notify;

#[cfg(test)]
mod tests;

pub use cache::{LatestCache, MokaLatestCache, NoopLatestCache};
pub use notify::{ChannelListener, LatestEvent, LatestListener, NoopListener, ObjectType};
