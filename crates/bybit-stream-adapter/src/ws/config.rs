/*
[INPUT]:  Construction-time options (environment, channel, credentials, timings, hooks)
[OUTPUT]: Validated connection configuration
[POS]:    WebSocket layer - connection configuration
[UPDATE]: When adding connection options or lifecycle hooks
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;

use crate::auth::Credentials;
use crate::error::{BybitError, Result};
use crate::types::{Category, ChannelKind, Environment};

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_AUTH_WINDOW: Duration = Duration::from_millis(1000);
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub environment: Environment,
    pub channel: ChannelKind,
    pub category: Category,
    /// Required for private channels
    pub credentials: Option<Credentials>,
    /// Advisory session lifetime for private streams, e.g. `"10m"`
    pub max_active_time: Option<String>,
    /// Bypasses the routing table
    pub url_override: Option<String>,
    pub ping_interval: Duration,
    /// Request id attached to every keepalive ping
    pub ping_req_id: String,
    pub auth_window: Duration,
    pub auth_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Mainnet,
            channel: ChannelKind::Public,
            category: Category::Linear,
            credentials: None,
            max_active_time: None,
            url_override: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_req_id: random_request_id(),
            auth_window: DEFAULT_AUTH_WINDOW,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ConnectionConfig {
    /// Public market-data stream for a category label or [`Category`]
    pub fn public(is_testnet: bool, category: impl Into<Category>) -> Self {
        Self {
            environment: Environment::from_testnet(is_testnet),
            channel: ChannelKind::Public,
            category: category.into(),
            ..Self::default()
        }
    }

    /// Authenticated account stream
    pub fn private(
        credentials: Credentials,
        is_testnet: bool,
        max_active_time: Option<String>,
        category: impl Into<Category>,
    ) -> Self {
        Self {
            environment: Environment::from_testnet(is_testnet),
            channel: ChannelKind::Private,
            category: category.into(),
            credentials: Some(credentials),
            max_active_time,
            ..Self::default()
        }
    }

    pub fn with_url_override(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_ping_req_id(mut self, req_id: impl Into<String>) -> Self {
        self.ping_req_id = req_id.into();
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel == ChannelKind::Private {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                BybitError::Config("private channel requires api credentials".to_string())
            })?;
            if credentials.api_key.is_empty() || credentials.api_secret.is_empty() {
                return Err(BybitError::Config(
                    "api key and secret must be non-empty".to_string(),
                ));
            }
        }

        if self.ping_interval.is_zero() {
            return Err(BybitError::Config("ping interval must be non-zero".to_string()));
        }

        if self.ping_req_id.is_empty() {
            return Err(BybitError::Config("ping request id must be non-empty".to_string()));
        }

        if self.send_timeout.is_zero() || self.auth_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(BybitError::Config("timeouts must be non-zero".to_string()));
        }

        Ok(())
    }
}

/// 8 random bytes, hex encoded
pub fn random_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub type ConnectedHook = Arc<dyn Fn() + Send + Sync>;
pub type ConnectionErrorHook = Arc<dyn Fn(&BybitError) + Send + Sync>;

/// Lifecycle callbacks
#[derive(Clone, Default)]
pub struct ConnectionHooks {
    on_connected: Option<ConnectedHook>,
    on_connection_error: Option<ConnectionErrorHook>,
}

impl ConnectionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once per successful connect, including reconnects
    pub fn on_connected(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Fired on dial/auth failures and when reconnection gives up
    pub fn on_connection_error(
        mut self,
        hook: impl Fn(&BybitError) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn connected(&self) {
        if let Some(hook) = &self.on_connected {
            hook();
        }
    }

    pub(crate) fn connection_error(&self, err: &BybitError) {
        if let Some(hook) = &self.on_connection_error {
            hook(err);
        }
    }
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_connection_error", &self.on_connection_error.is_some())
            .finish()
    }
}
