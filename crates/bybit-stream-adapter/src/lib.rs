/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Bybit v5 stream adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod channel;
pub mod client;
pub mod error;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{AuthArgs, Credentials, StreamSigner, sign};

// Re-export the facade and channels
pub use channel::{PrivateChannel, PublicChannel, StreamEvent, TopicFamily, normalize_depth};
pub use client::BybitStream;

pub use error::{BybitError, Result};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    ConnectionConfig,
    ConnectionHooks,
    ConnectionManager,
    ConnectionState,
    Connector,
    SubscriptionHandle,
    TopicMessage,
    Transport,
    TungsteniteConnector,
};
