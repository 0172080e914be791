/*
[INPUT]:  Connection configuration, topic subscriptions, raw websocket frames
[OUTPUT]: Managed Bybit v5 stream connections with per-topic dispatch
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding ws submodules or changing the public surface
*/

pub mod config;
pub mod manager;
pub mod message;
pub mod pending;
pub mod registry;
pub mod router;
pub mod routing;
pub mod transport;

pub use config::{ConnectionConfig, ConnectionHooks};
pub use manager::{ConnectionManager, ConnectionState};
pub use message::{FrameKind, InboundFrame, Operation, RequestFrame, TopicMessage};
pub use pending::{Ack, PendingRequests, RequestKind};
pub use registry::{Registration, SubscriptionHandle, SubscriptionRegistry, TopicHandler};
pub use router::{MessageRouter, RouteOutcome, RouterStats};
pub use routing::{endpoint_url, stream_url};
pub use transport::{Connector, FrameSink, FrameStream, Transport, TungsteniteConnector};
