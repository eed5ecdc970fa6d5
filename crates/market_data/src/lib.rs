pub mod broadcast;
pub mod feed_cache;
pub mod remote;
pub mod services;
pub mod traits;

pub use broadcast::SubscriberHub;
pub use feed_cache::FeedCache;
pub use traits::ClosesSource;
