/*
[INPUT]:  Bybit v5 stream payload schemas and serde requirements
[OUTPUT]: Typed Rust structs decoded from topic `data` fields
[POS]:    Data layer - per-topic payload definitions
[UPDATE]: When stream schemas change or new topics are added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::Side;

/// Ticker snapshot or delta; absent fields stay `None` on deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TickerData {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub last_price: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub high_price_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub low_price_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub prev_price_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub price_24h_pcnt: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub volume_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub turnover_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub mark_price: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub index_price: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub open_interest: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub funding_rate: Option<Decimal>,
    #[serde(rename = "bid1Price", deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub bid1_price: Option<Decimal>,
    #[serde(rename = "bid1Size", deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub bid1_size: Option<Decimal>,
    #[serde(rename = "ask1Price", deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub ask1_price: Option<Decimal>,
    #[serde(rename = "ask1Size", deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub ask1_size: Option<Decimal>,
    pub next_funding_time: Option<String>,
    pub tick_direction: Option<String>,
}

/// One candle; `confirm` flips to true when the interval closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineData {
    pub start: i64,
    pub end: i64,
    pub interval: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub volume: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub turnover: Decimal,
    pub confirm: bool,
    pub timestamp: i64,
}

/// `[price, size]`; a zero size on a delta removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel(
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
);

impl PriceLevel {
    pub fn price(&self) -> Decimal {
        self.0
    }

    pub fn size(&self) -> Decimal {
        self.1
    }

    pub fn is_removal(&self) -> bool {
        self.1.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookData {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b", default)]
    pub bids: Vec<PriceLevel>,
    #[serde(rename = "a", default)]
    pub asks: Vec<PriceLevel>,
    #[serde(rename = "u")]
    pub update_id: u64,
    #[serde(default)]
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    #[serde(rename = "T")]
    pub timestamp: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "v", with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "L", default)]
    pub tick_direction: Option<String>,
    #[serde(rename = "i")]
    pub trade_id: String,
    #[serde(rename = "BT", default)]
    pub block_trade: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationData {
    #[serde(rename = "T")]
    pub updated_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "v", with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Leveraged token ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LtTickerData {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub last_price: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub price_24h_pcnt: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub prev_price_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub high_price_24h: Option<Decimal>,
    #[serde(deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub low_price_24h: Option<Decimal>,
}

/// Leveraged token net asset value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtNavData {
    pub time: i64,
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub nav: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub basket_position: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub leverage: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub basket_loan: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub circulation: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub basket: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(default)]
    pub category: String,
    pub symbol: String,
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub side: Side,
    pub order_type: String,
    pub order_status: String,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub price: Option<Decimal>,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub qty: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub cum_exec_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub updated_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
    #[serde(default)]
    pub category: String,
    pub symbol: String,
    pub exec_id: String,
    pub order_id: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub exec_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub exec_qty: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub exec_fee: Decimal,
    #[serde(default)]
    pub exec_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    #[serde(default)]
    pub category: String,
    pub symbol: String,
    /// `Buy`, `Sell`, or empty when flat
    #[serde(default)]
    pub side: String,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub entry_price: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub mark_price: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub leverage: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub unrealised_pnl: Option<Decimal>,
    #[serde(default)]
    pub updated_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCoin {
    pub coin: String,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub equity: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub wallet_balance: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub unrealised_pnl: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdate {
    pub account_type: String,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub total_equity: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub total_wallet_balance: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::deserialize_optional_decimal")]
    pub total_available_balance: Option<Decimal>,
    #[serde(default)]
    pub coin: Vec<WalletCoin>,
}

mod serde_helpers {
    use super::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    fn parse_value<E: serde::de::Error>(value: Value) -> Result<Option<Decimal>, E> {
        if value.is_null() {
            return Ok(None);
        }

        if let Some(raw) = value.as_str() {
            if raw.trim().is_empty() {
                return Ok(None);
            }
            return Decimal::from_str(raw.trim()).map(Some).map_err(E::custom);
        }

        if value.is_number() {
            return Decimal::from_str(&value.to_string())
                .map(Some)
                .map_err(E::custom);
        }

        Err(E::custom("invalid decimal value"))
    }

    pub fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        parse_value(value)
    }

    pub fn deserialize_decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(parse_value::<D::Error>(value)?.unwrap_or(Decimal::ZERO))
    }

    pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn ticker_delta_leaves_missing_fields_empty() {
        let ticker: TickerData = serde_json::from_value(json!({
            "symbol": "BTCUSDT",
            "lastPrice": "43250.5",
            "bid1Price": "43250.0",
            "nextFundingTime": "",
        }))
        .unwrap();

        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.last_price, Some(dec("43250.5")));
        assert_eq!(ticker.bid1_price, Some(dec("43250.0")));
        assert_eq!(ticker.mark_price, None);
        assert_eq!(ticker.next_funding_time.as_deref(), Some(""));
    }

    #[test]
    fn ticker_empty_price_string_is_none() {
        let ticker: TickerData =
            serde_json::from_value(json!({ "symbol": "ETHUSDT", "markPrice": "" })).unwrap();
        assert_eq!(ticker.mark_price, None);
    }

    #[test]
    fn kline_decodes_string_prices() {
        let kline: Vec<KlineData> = serde_json::from_value(json!([{
            "start": 1672324800000i64,
            "end": 1672325099999i64,
            "interval": "5",
            "open": "16649.5",
            "close": "16677",
            "high": "16677",
            "low": "16608",
            "volume": "2.081",
            "turnover": "34666.4005",
            "confirm": false,
            "timestamp": 1672324988882i64
        }]))
        .unwrap();

        assert_eq!(kline.len(), 1);
        assert_eq!(kline[0].close, dec("16677"));
        assert!(!kline[0].confirm);
    }

    #[test]
    fn orderbook_levels_decode_as_pairs() {
        let book: OrderBookData = serde_json::from_value(json!({
            "s": "BTCUSDT",
            "b": [["16493.50", "0.006"], ["16493.00", "0"]],
            "a": [["16611.00", "0.029"]],
            "u": 18521288,
            "seq": 7961638724u64
        }))
        .unwrap();

        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[0].price(), dec("16493.50"));
        assert!(book.bids[1].is_removal());
        assert_eq!(book.asks[0].size(), dec("0.029"));
    }

    #[test]
    fn trade_decodes_short_keys() {
        let trades: Vec<TradeData> = serde_json::from_value(json!([{
            "T": 1672304486865i64,
            "s": "BTCUSDT",
            "S": "Buy",
            "v": "0.001",
            "p": "16578.50",
            "L": "PlusTick",
            "i": "20f43950-d8dd-5b31-9112-a178eb6023af",
            "BT": false
        }]))
        .unwrap();

        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[0].price, dec("16578.50"));
    }

    #[test]
    fn position_allows_empty_side_and_prices() {
        let position: PositionUpdate = serde_json::from_value(json!({
            "category": "linear",
            "symbol": "BTCUSDT",
            "side": "",
            "size": "0",
            "entryPrice": "",
            "markPrice": "43000"
        }))
        .unwrap();

        assert!(position.size.is_zero());
        assert_eq!(position.entry_price, None);
        assert_eq!(position.mark_price, Some(dec("43000")));
    }
}
