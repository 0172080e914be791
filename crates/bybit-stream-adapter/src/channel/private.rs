/*
[INPUT]:  Private connection config (credentials, max_active_time)
[OUTPUT]: Account update feeds on one authenticated connection
[POS]:    Channel layer - private account streams
[UPDATE]: When adding private topic families
*/

use crate::error::{BybitError, Result};
use crate::types::ChannelKind;
use crate::ws::{ConnectionConfig, ConnectionHooks, ConnectionManager};

use super::feed::{ExecutionFeed, OrderFeed, PositionFeed, TopicFamily, WalletFeed};

/// Account updates over one authenticated connection
#[derive(Debug, Clone)]
pub struct PrivateChannel {
    manager: ConnectionManager,
}

impl PrivateChannel {
    pub fn new(config: ConnectionConfig, hooks: ConnectionHooks) -> Result<Self> {
        if config.channel != ChannelKind::Private {
            return Err(BybitError::Config(
                "private channel needs a private connection config".to_string(),
            ));
        }
        Ok(Self::with_manager(ConnectionManager::new(config, hooks)?))
    }

    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Connects and authenticates
    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    pub async fn close(&self) {
        self.manager.close().await;
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn order(&self) -> OrderFeed {
        OrderFeed::new(self.manager.clone(), TopicFamily::Order)
    }

    pub fn execution(&self) -> ExecutionFeed {
        ExecutionFeed::new(self.manager.clone(), TopicFamily::Execution)
    }

    pub fn position(&self) -> PositionFeed {
        PositionFeed::new(self.manager.clone(), TopicFamily::Position)
    }

    pub fn wallet(&self) -> WalletFeed {
        WalletFeed::new(self.manager.clone(), TopicFamily::Wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    #[test]
    fn private_url_and_topics() {
        let config = ConnectionConfig::private(
            Credentials::new("key", "secret"),
            false,
            Some("1m".to_string()),
            "spot",
        );
        let channel = PrivateChannel::new(config, ConnectionHooks::new()).unwrap();
        assert_eq!(
            channel.manager().url().as_str(),
            "wss://stream.bybit.com/v5/private?max_active_time=1m"
        );
        assert_eq!(channel.order().topic(), "order");
        assert_eq!(channel.position().topic(), "position");
    }

    #[test]
    fn rejects_public_config() {
        let result = PrivateChannel::new(ConnectionConfig::public(false, "usdt_contract"), ConnectionHooks::new());
        assert!(matches!(result, Err(BybitError::Config(_))));
    }
}
