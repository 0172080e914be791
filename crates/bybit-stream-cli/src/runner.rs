/*
[INPUT]:  StreamConfig, shutdown CancellationToken
[OUTPUT]: Live ticker/kline/order book/account subscriptions logged through tracing
[POS]:    Runtime layer - drives the Bybit stream facade until shutdown
[UPDATE]: When adding subscribed feeds or changing startup/shutdown order
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use bybit_stream_adapter::{
    BybitError, BybitStream, ConnectionHooks, ConnectionManager, ExecutionUpdate, KlineData,
    OrderBookData, OrderUpdate, PositionUpdate, StreamEvent, TickerData, WalletUpdate,
    normalize_depth,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;

/// Owns the stream facade and the subscriptions derived from config
#[derive(Debug)]
pub struct StreamRunner {
    config: StreamConfig,
    stream: BybitStream,
    shutdown: CancellationToken,
    exhausted: Arc<AtomicBool>,
}

impl StreamRunner {
    pub fn new(config: StreamConfig, shutdown: CancellationToken) -> Result<Self> {
        let exhausted = Arc::new(AtomicBool::new(false));
        let hooks = {
            let shutdown = shutdown.clone();
            let exhausted = exhausted.clone();
            ConnectionHooks::new()
                .on_connected(|| info!("stream connected"))
                .on_connection_error(move |err| {
                    warn!(error = %err, "stream connection error");
                    if matches!(err, BybitError::ReconnectExhausted { .. }) {
                        exhausted.store(true, Ordering::SeqCst);
                        shutdown.cancel();
                    }
                })
        };

        let stream = BybitStream::from_configs(
            config.public_connection(),
            config.private_connection(),
            hooks,
        )
        .context("build stream channels")?;

        Ok(Self {
            config,
            stream,
            shutdown,
            exhausted,
        })
    }

    pub fn stream(&self) -> &BybitStream {
        &self.stream
    }

    /// Topic keys the runner subscribes to, public first
    pub fn planned_topics(&self) -> Vec<String> {
        let mut topics = Vec::new();
        for symbol in &self.config.symbols {
            topics.push(format!("tickers.{symbol}"));
            topics.push(format!("kline.{}.{symbol}", self.config.kline_interval));
            if let Some(depth) = self.config.orderbook_depth {
                topics.push(format!("orderbook.{}.{symbol}", normalize_depth(depth)));
            }
        }
        if self.config.credentials.is_some() {
            topics.extend(
                ["order", "execution", "position", "wallet"].map(str::to_string),
            );
        }
        topics
    }

    /// Connect and subscribe; subscriptions registered here survive reconnects
    pub async fn start(&self) -> Result<()> {
        self.stream
            .connect_all()
            .await
            .context("connect bybit streams")?;
        self.subscribe_public().await?;
        self.subscribe_private().await?;
        info!(topics = self.planned_topics().len(), "subscriptions registered");
        Ok(())
    }

    /// Run until the shutdown token fires, then close every channel
    pub async fn run(self) -> Result<()> {
        let watchers = self.spawn_state_watchers();

        let started = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Ok(()),
            result = self.start() => result,
        };
        if started.is_ok() {
            self.shutdown.cancelled().await;
        }

        info!("closing bybit streams");
        self.stream.close().await;
        for watcher in watchers {
            watcher.abort();
        }

        started?;
        if self.exhausted.load(Ordering::SeqCst) {
            bail!("stream lost: reconnection attempts exhausted");
        }
        Ok(())
    }

    async fn subscribe_public(&self) -> Result<()> {
        let Ok(public) = self.stream.public() else {
            return Ok(());
        };
        let symbols = &self.config.symbols;

        public
            .ticker()
            .subscribe_many(symbols, log_ticker)
            .await
            .context("subscribe tickers")?;
        public
            .kline()
            .subscribe_many(&self.config.kline_interval, symbols, log_kline)
            .await
            .context("subscribe klines")?;

        if let Some(depth) = self.config.orderbook_depth {
            let orderbook = public.orderbook();
            for symbol in symbols {
                orderbook
                    .subscribe(depth, symbol, log_orderbook)
                    .await
                    .with_context(|| format!("subscribe order book for {symbol}"))?;
            }
        }
        Ok(())
    }

    async fn subscribe_private(&self) -> Result<()> {
        let Ok(private) = self.stream.private() else {
            return Ok(());
        };
        private
            .order()
            .subscribe(log_orders)
            .await
            .context("subscribe orders")?;
        private
            .execution()
            .subscribe(log_executions)
            .await
            .context("subscribe executions")?;
        private
            .position()
            .subscribe(log_positions)
            .await
            .context("subscribe positions")?;
        private
            .wallet()
            .subscribe(log_wallets)
            .await
            .context("subscribe wallet")?;
        Ok(())
    }

    fn spawn_state_watchers(&self) -> Vec<JoinHandle<()>> {
        let mut watchers = Vec::new();
        if let Ok(public) = self.stream.public() {
            watchers.push(watch_state("public", public.manager()));
        }
        if let Ok(private) = self.stream.private() {
            watchers.push(watch_state("private", private.manager()));
        }
        watchers
    }
}

fn watch_state(channel: &'static str, manager: &ConnectionManager) -> JoinHandle<()> {
    let mut states = manager.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(channel, %state, "connection state changed");
        }
    })
}

fn log_ticker(event: StreamEvent<TickerData>) {
    info!(
        topic = %event.topic,
        last_price = ?event.data.last_price,
        bid = ?event.data.bid1_price,
        ask = ?event.data.ask1_price,
        "ticker"
    );
}

fn log_kline(event: StreamEvent<Vec<KlineData>>) {
    for candle in &event.data {
        info!(
            topic = %event.topic,
            start = candle.start,
            open = %candle.open,
            high = %candle.high,
            low = %candle.low,
            close = %candle.close,
            confirm = candle.confirm,
            "kline"
        );
    }
}

fn log_orderbook(event: StreamEvent<OrderBookData>) {
    let book = &event.data;
    debug!(
        topic = %event.topic,
        frame_type = ?event.frame_type,
        update_id = book.update_id,
        best_bid = ?book.bids.first().map(|level| level.price()),
        best_ask = ?book.asks.first().map(|level| level.price()),
        "orderbook"
    );
}

fn log_orders(event: StreamEvent<Vec<OrderUpdate>>) {
    for order in &event.data {
        info!(
            symbol = %order.symbol,
            order_id = %order.order_id,
            side = ?order.side,
            status = %order.order_status,
            qty = %order.qty,
            filled = %order.cum_exec_qty,
            "order update"
        );
    }
}

fn log_executions(event: StreamEvent<Vec<ExecutionUpdate>>) {
    for execution in &event.data {
        info!(
            symbol = %execution.symbol,
            order_id = %execution.order_id,
            price = %execution.exec_price,
            qty = %execution.exec_qty,
            "execution"
        );
    }
}

fn log_positions(event: StreamEvent<Vec<PositionUpdate>>) {
    for position in &event.data {
        info!(
            symbol = %position.symbol,
            side = %position.side,
            size = %position.size,
            unrealised_pnl = ?position.unrealised_pnl,
            "position update"
        );
    }
}

fn log_wallets(event: StreamEvent<Vec<WalletUpdate>>) {
    for wallet in &event.data {
        info!(
            account_type = %wallet.account_type,
            total_equity = ?wallet.total_equity,
            coins = wallet.coin.len(),
            "wallet update"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bybit_stream_adapter::ConnectionState;

    fn config(yaml: &str) -> StreamConfig {
        StreamConfig::from_yaml(yaml).unwrap()
    }

    #[test]
    fn public_only_runner_plans_market_topics() {
        let runner = StreamRunner::new(
            config("symbols: [BTCUSDT]\nkline_interval: \"5\"\norderbook_depth: 30\n"),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(runner.stream().public().is_ok());
        assert!(matches!(
            runner.stream().private(),
            Err(BybitError::ChannelUnavailable(_))
        ));
        assert_eq!(
            runner.planned_topics(),
            vec!["tickers.BTCUSDT", "kline.5.BTCUSDT", "orderbook.50.BTCUSDT"]
        );
    }

    #[test]
    fn credentials_add_account_topics() {
        let runner = StreamRunner::new(
            config("symbols: []\ncredentials:\n  api_key: k\n  api_secret: s\n"),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(runner.stream().public().is_err());
        assert!(runner.stream().private().is_ok());
        assert_eq!(
            runner.planned_topics(),
            vec!["order", "execution", "position", "wallet"]
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_closes_without_dialing() {
        let shutdown = CancellationToken::new();
        let runner = StreamRunner::new(config("symbols: [BTCUSDT]\n"), shutdown.clone()).unwrap();
        let manager = runner.stream().public().unwrap().manager().clone();
        shutdown.cancel();

        tokio_test::assert_ok!(runner.run().await);
        assert_eq!(manager.state(), ConnectionState::Closed);
    }
}
