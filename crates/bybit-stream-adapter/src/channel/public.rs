/*
[INPUT]:  Public connection config (testnet flag, category)
[OUTPUT]: Market data feeds on one public connection
[POS]:    Channel layer - public market data
[UPDATE]: When adding public topic families
*/

use crate::error::{BybitError, Result};
use crate::types::ChannelKind;
use crate::ws::{ConnectionConfig, ConnectionHooks, ConnectionManager};

use super::feed::{
    KlineFeed, LiquidationFeed, LtKlineFeed, LtNavFeed, LtTickerFeed, OrderBookFeed, TickerFeed,
    TopicFamily, TradeFeed,
};

/// Market data over one public connection
#[derive(Debug, Clone)]
pub struct PublicChannel {
    manager: ConnectionManager,
}

impl PublicChannel {
    pub fn new(config: ConnectionConfig, hooks: ConnectionHooks) -> Result<Self> {
        if config.channel != ChannelKind::Public {
            return Err(BybitError::Config(
                "public channel needs a public connection config".to_string(),
            ));
        }
        Ok(Self::with_manager(ConnectionManager::new(config, hooks)?))
    }

    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    pub async fn close(&self) {
        self.manager.close().await;
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn ticker(&self) -> TickerFeed {
        TickerFeed::new(self.manager.clone(), TopicFamily::Ticker)
    }

    pub fn kline(&self) -> KlineFeed {
        KlineFeed::new(self.manager.clone(), TopicFamily::Kline)
    }

    pub fn orderbook(&self) -> OrderBookFeed {
        OrderBookFeed::new(self.manager.clone())
    }

    pub fn trade(&self) -> TradeFeed {
        TradeFeed::new(self.manager.clone(), TopicFamily::Trade)
    }

    pub fn liquidation(&self) -> LiquidationFeed {
        LiquidationFeed::new(self.manager.clone(), TopicFamily::Liquidation)
    }

    /// Leveraged token klines (spot)
    pub fn lt_kline(&self) -> LtKlineFeed {
        LtKlineFeed::new(self.manager.clone(), TopicFamily::LtKline)
    }

    pub fn lt_ticker(&self) -> LtTickerFeed {
        LtTickerFeed::new(self.manager.clone(), TopicFamily::LtTicker)
    }

    pub fn lt_nav(&self) -> LtNavFeed {
        LtNavFeed::new(self.manager.clone(), TopicFamily::LtNav)
    }
}
