/*
[INPUT]:  Testnet public stream endpoint
[OUTPUT]: Ticker and kline updates printed for a few seconds
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When the channel facade API changes
*/

use bybit_stream_adapter::*;
use tokio::time::{Duration, sleep};

/// Example: public market data over one connection
///
/// Subscriptions registered before or after `connect()` are replayed
/// automatically whenever the connection is re-established.
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Bybit WebSocket Example ===\n");

    let hooks = ConnectionHooks::new()
        .on_connected(|| println!("✓ connected"))
        .on_connection_error(|err| println!("✗ connection error: {err}"));
    let public = PublicChannel::new(ConnectionConfig::public(true, "usdt_contract"), hooks)?;

    public.connect().await?;
    println!("✓ endpoint: {}\n", public.manager().url());

    public
        .ticker()
        .subscribe_many(&["BTCUSDT", "ETHUSDT"], |event| {
            println!("{} last={:?}", event.topic, event.data.last_price);
        })
        .await?;
    public
        .kline()
        .subscribe("1", "BTCUSDT", |event| {
            for candle in &event.data {
                println!("{} close={} confirm={}", event.topic, candle.close, candle.confirm);
            }
        })
        .await?;

    println!("Streaming for 10 seconds...");
    sleep(Duration::from_secs(10)).await;

    public.close().await;
    println!("\n✓ WebSocket example complete");
    Ok(())
}
