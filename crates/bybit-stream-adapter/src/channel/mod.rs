/*
[INPUT]:  Connection managers for public and private streams
[OUTPUT]: Typed per-topic feeds
[POS]:    Channel layer - facade over the connection manager
[UPDATE]: When adding channels or feeds
*/

pub mod feed;
pub mod private;
pub mod public;

pub use feed::{
    AccountFeed, ExecutionFeed, IntervalFeed, KlineFeed, LiquidationFeed, LtKlineFeed, LtNavFeed,
    LtTickerFeed, OrderBookFeed, OrderFeed, PositionFeed, StreamEvent, SymbolFeed, TickerFeed,
    TopicFamily, TradeFeed, WalletFeed, normalize_depth,
};
pub use private::PrivateChannel;
pub use public::PublicChannel;
