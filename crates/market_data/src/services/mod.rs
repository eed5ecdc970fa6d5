pub mod indicator_cache;
pub mod market_gateway;
pub mod ticker_broadcaster;

pub use indicator_cache::{IndicatorBand, IndicatorCache};
pub use market_gateway::FeedGateway;
pub use ticker_broadcaster::TickerBroadcaster;
