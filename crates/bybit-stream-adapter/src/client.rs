/*
[INPUT]:  Optional public and private connection configs
[OUTPUT]: One handle over both stream channels
[POS]:    Crate facade - entry point for stream consumers
[UPDATE]: When adding channels or changing connect/close orchestration
*/

use tracing::info;

use crate::channel::{PrivateChannel, PublicChannel};
use crate::error::{BybitError, Result};
use crate::types::ChannelKind;
use crate::ws::{ConnectionConfig, ConnectionHooks};

/// Public and private Bybit v5 streams behind one handle
#[derive(Debug, Clone, Default)]
pub struct BybitStream {
    public: Option<PublicChannel>,
    private: Option<PrivateChannel>,
}

impl BybitStream {
    pub fn new(public: Option<PublicChannel>, private: Option<PrivateChannel>) -> Self {
        Self { public, private }
    }

    /// Build channels from configs; both share the same hooks
    pub fn from_configs(
        public: Option<ConnectionConfig>,
        private: Option<ConnectionConfig>,
        hooks: ConnectionHooks,
    ) -> Result<Self> {
        let public = public
            .map(|config| PublicChannel::new(config, hooks.clone()))
            .transpose()?;
        let private = private
            .map(|config| PrivateChannel::new(config, hooks))
            .transpose()?;
        Ok(Self::new(public, private))
    }

    pub fn public(&self) -> Result<&PublicChannel> {
        self.public
            .as_ref()
            .ok_or_else(|| BybitError::ChannelUnavailable(ChannelKind::Public.to_string()))
    }

    pub fn private(&self) -> Result<&PrivateChannel> {
        self.private
            .as_ref()
            .ok_or_else(|| BybitError::ChannelUnavailable(ChannelKind::Private.to_string()))
    }

    /// Connect every configured channel, public first
    pub async fn connect_all(&self) -> Result<()> {
        if let Some(public) = &self.public {
            public.connect().await?;
        }
        if let Some(private) = &self.private {
            private.connect().await?;
        }
        info!(
            public = self.public.is_some(),
            private = self.private.is_some(),
            "bybit streams connected"
        );
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(public) = &self.public {
            public.close().await;
        }
        if let Some(private) = &self.private {
            private.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_channels_are_reported() {
        let stream = BybitStream::default();
        assert_eq!(
            stream.public().unwrap_err(),
            BybitError::ChannelUnavailable("public".to_string())
        );
        assert_eq!(
            stream.private().unwrap_err(),
            BybitError::ChannelUnavailable("private".to_string())
        );
    }

    #[test]
    fn from_configs_builds_public_only() {
        let stream = BybitStream::from_configs(
            Some(ConnectionConfig::public(true, "usdt_contract")),
            None,
            ConnectionHooks::new(),
        )
        .unwrap();
        assert!(stream.public().is_ok());
        assert!(stream.private().is_err());
    }
}
