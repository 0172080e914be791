/*
[INPUT]:  Endpoint URL
[OUTPUT]: Text frame sink + text frame stream over one websocket
[POS]:    WebSocket layer - transport seam between manager and socket
[UPDATE]: When changing socket library or frame decoding
*/

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use crate::error::{BybitError, Result};

/// Outbound half; every write goes through the manager's writer lock
pub type FrameSink = Pin<Box<dyn Sink<String, Error = BybitError> + Send>>;

/// Inbound half; `Err` or end-of-stream means the connection is gone
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One open connection, split into halves
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports; swapped for an in-memory connector in tests
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, url: &str) -> Result<Transport>;
}

/// Production connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        let (ws_stream, _response) =
            connect_async(url)
                .await
                .map_err(|err| BybitError::Dial {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|err| BybitError::Write(err.to_string()))
            .with(|text: String| future::ready(Ok::<_, BybitError>(WsMessage::Text(text.into()))));

        let stream = read.filter_map(|incoming| {
            future::ready(match incoming {
                Ok(WsMessage::Text(text)) => Some(Ok(text.to_string())),
                Ok(WsMessage::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|err| BybitError::Read(format!("non-utf8 binary frame: {err}"))),
                ),
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "ws close frame received");
                    Some(Err(BybitError::Read("connection closed by peer".to_string())))
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => None,
                Err(err) => Some(Err(BybitError::Read(err.to_string()))),
            })
        });

        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}
