/*
[INPUT]:  Symbols, intervals, depths and typed callbacks from callers
[OUTPUT]: Topic keys and decoding handlers registered with a connection
[POS]:    Channel layer - per-topic adapters
[UPDATE]: When adding topic families or changing topic key formats
*/

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{BybitError, Result};
use crate::types::{
    ChannelKind, ExecutionUpdate, FrameType, KlineData, LiquidationData, LtNavData, LtTickerData,
    OrderBookData, OrderUpdate, PositionUpdate, TickerData, TradeData, WalletUpdate,
};
use crate::ws::{ConnectionManager, SubscriptionHandle, TopicHandler, TopicMessage};

const DECODE_FAIL_LOG_LIMIT: usize = 3;

/// Decoded data frame delivered to feed callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent<T> {
    pub topic: String,
    pub frame_type: FrameType,
    pub ts: Option<i64>,
    pub data: T,
}

/// Topic families and their key prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicFamily {
    Ticker,
    Kline,
    OrderBook,
    Trade,
    Liquidation,
    LtKline,
    LtTicker,
    LtNav,
    Order,
    Execution,
    Position,
    Wallet,
}

impl TopicFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            TopicFamily::Ticker => "tickers",
            TopicFamily::Kline => "kline",
            TopicFamily::OrderBook => "orderbook",
            TopicFamily::Trade => "publicTrade",
            TopicFamily::Liquidation => "allLiquidation",
            TopicFamily::LtKline => "kline_lt",
            TopicFamily::LtTicker => "tickers_lt",
            TopicFamily::LtNav => "lt",
            TopicFamily::Order => "order",
            TopicFamily::Execution => "execution",
            TopicFamily::Position => "position",
            TopicFamily::Wallet => "wallet",
        }
    }

    pub fn channel(self) -> ChannelKind {
        match self {
            TopicFamily::Order
            | TopicFamily::Execution
            | TopicFamily::Position
            | TopicFamily::Wallet => ChannelKind::Private,
            _ => ChannelKind::Public,
        }
    }
}

/// Clamp a requested order book depth to a level the venue publishes
pub fn normalize_depth(depth: u32) -> u32 {
    match depth {
        0 | 1 => 1,
        2..=50 => 50,
        51..=200 => 200,
        _ => 500,
    }
}

/// Wrap a typed callback; payloads that fail to decode are logged and dropped.
pub(crate) fn decoding_handler<T, F>(callback: F) -> TopicHandler
where
    T: DeserializeOwned + 'static,
    F: Fn(StreamEvent<T>) + Send + Sync + 'static,
{
    let failures = AtomicUsize::new(0);
    Arc::new(move |message: &TopicMessage| match <T as serde::Deserialize>::deserialize(&message.data) {
        Ok(data) => callback(StreamEvent {
            topic: message.topic.clone(),
            frame_type: message.frame_type,
            ts: message.ts,
            data,
        }),
        Err(err) => {
            let err = BybitError::Decode {
                topic: message.topic.clone(),
                message: err.to_string(),
            };
            let count = failures.fetch_add(1, Ordering::Relaxed);
            if count < DECODE_FAIL_LOG_LIMIT {
                warn!(
                    sample_index = count + 1,
                    sample_limit = DECODE_FAIL_LOG_LIMIT,
                    topic = %message.topic,
                    error = %err,
                    "stream payload dropped"
                );
            } else {
                debug!(topic = %message.topic, error = %err, "stream payload dropped");
            }
        }
    })
}

/// Topics keyed by symbol: `{prefix}.{symbol}`
#[derive(Debug, Clone)]
pub struct SymbolFeed<T> {
    manager: ConnectionManager,
    family: TopicFamily,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + 'static> SymbolFeed<T> {
    pub(crate) fn new(manager: ConnectionManager, family: TopicFamily) -> Self {
        Self {
            manager,
            family,
            _payload: PhantomData,
        }
    }

    pub fn topic(&self, symbol: &str) -> String {
        format!("{}.{symbol}", self.family.prefix())
    }

    pub async fn subscribe<F>(&self, symbol: &str, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(StreamEvent<T>) + Send + Sync + 'static,
    {
        self.manager
            .subscribe(self.topic(symbol), decoding_handler(callback))
            .await
    }

    /// One subscription per symbol, all sharing `callback`
    pub async fn subscribe_many<F, S>(
        &self,
        symbols: &[S],
        callback: F,
    ) -> Result<Vec<SubscriptionHandle>>
    where
        F: Fn(StreamEvent<T>) + Send + Sync + 'static,
        S: AsRef<str>,
    {
        let callback = Arc::new(callback);
        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let callback = callback.clone();
            handles.push(
                self.subscribe(symbol.as_ref(), move |event| callback(event))
                    .await?,
            );
        }
        Ok(handles)
    }

    pub async fn unsubscribe(&self, symbol: &str) -> Result<()> {
        self.manager.unsubscribe_topic(&self.topic(symbol)).await
    }
}

/// Topics keyed by interval and symbol: `{prefix}.{interval}.{symbol}`
#[derive(Debug, Clone)]
pub struct IntervalFeed<T> {
    manager: ConnectionManager,
    family: TopicFamily,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + 'static> IntervalFeed<T> {
    pub(crate) fn new(manager: ConnectionManager, family: TopicFamily) -> Self {
        Self {
            manager,
            family,
            _payload: PhantomData,
        }
    }

    pub fn topic(&self, interval: &str, symbol: &str) -> String {
        format!("{}.{interval}.{symbol}", self.family.prefix())
    }

    pub async fn subscribe<F>(
        &self,
        interval: &str,
        symbol: &str,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(StreamEvent<T>) + Send + Sync + 'static,
    {
        self.manager
            .subscribe(self.topic(interval, symbol), decoding_handler(callback))
            .await
    }

    pub async fn subscribe_many<F, S>(
        &self,
        interval: &str,
        symbols: &[S],
        callback: F,
    ) -> Result<Vec<SubscriptionHandle>>
    where
        F: Fn(StreamEvent<T>) + Send + Sync + 'static,
        S: AsRef<str>,
    {
        let callback = Arc::new(callback);
        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let callback = callback.clone();
            handles.push(
                self.subscribe(interval, symbol.as_ref(), move |event| callback(event))
                    .await?,
            );
        }
        Ok(handles)
    }

    pub async fn unsubscribe(&self, interval: &str, symbol: &str) -> Result<()> {
        self.manager
            .unsubscribe_topic(&self.topic(interval, symbol))
            .await
    }
}

/// `orderbook.{depth}.{symbol}` with depth normalisation
#[derive(Debug, Clone)]
pub struct OrderBookFeed {
    manager: ConnectionManager,
}

impl OrderBookFeed {
    pub(crate) fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn topic(&self, depth: u32, symbol: &str) -> String {
        format!(
            "{}.{}.{symbol}",
            TopicFamily::OrderBook.prefix(),
            normalize_depth(depth)
        )
    }

    pub async fn subscribe<F>(&self, depth: u32, symbol: &str, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(StreamEvent<OrderBookData>) + Send + Sync + 'static,
    {
        self.manager
            .subscribe(self.topic(depth, symbol), decoding_handler(callback))
            .await
    }

    pub async fn unsubscribe(&self, depth: u32, symbol: &str) -> Result<()> {
        self.manager.unsubscribe_topic(&self.topic(depth, symbol)).await
    }
}

/// Account-wide private topics: the topic key is the bare prefix
#[derive(Debug, Clone)]
pub struct AccountFeed<T> {
    manager: ConnectionManager,
    family: TopicFamily,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + 'static> AccountFeed<T> {
    pub(crate) fn new(manager: ConnectionManager, family: TopicFamily) -> Self {
        Self {
            manager,
            family,
            _payload: PhantomData,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.family.prefix()
    }

    pub async fn subscribe<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(StreamEvent<T>) + Send + Sync + 'static,
    {
        self.manager
            .subscribe(self.topic(), decoding_handler(callback))
            .await
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        self.manager.unsubscribe_topic(self.topic()).await
    }
}

pub type TickerFeed = SymbolFeed<TickerData>;
pub type KlineFeed = IntervalFeed<Vec<KlineData>>;
pub type TradeFeed = SymbolFeed<Vec<TradeData>>;
pub type LiquidationFeed = SymbolFeed<Vec<LiquidationData>>;
pub type LtKlineFeed = IntervalFeed<Vec<KlineData>>;
pub type LtTickerFeed = SymbolFeed<LtTickerData>;
pub type LtNavFeed = SymbolFeed<LtNavData>;
pub type OrderFeed = AccountFeed<Vec<OrderUpdate>>;
pub type ExecutionFeed = AccountFeed<Vec<ExecutionUpdate>>;
pub type PositionFeed = AccountFeed<Vec<PositionUpdate>>;
pub type WalletFeed = AccountFeed<Vec<WalletUpdate>>;
