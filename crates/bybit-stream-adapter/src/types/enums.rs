/*
[INPUT]:  Venue categories, channel kinds, environment flags
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - routing inputs and shared payload enums
[UPDATE]: When Bybit adds categories or payload enum values
*/

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Public,
    Private,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Public => f.write_str("public"),
            ChannelKind::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Mainnet,
    Testnet,
}

impl Environment {
    pub fn from_testnet(is_testnet: bool) -> Self {
        if is_testnet {
            Environment::Testnet
        } else {
            Environment::Mainnet
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            Environment::Mainnet => "stream.bybit.com",
            Environment::Testnet => "stream-testnet.bybit.com",
        }
    }
}

/// Market segment; decides the public stream path.
///
/// Labels are matched exactly; anything unlisted falls back to `Linear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Spot,
    #[default]
    Linear,
    Inverse,
    Option,
}

impl Category {
    pub fn from_label(label: &str) -> Self {
        match label {
            "spot" => Category::Spot,
            "inverse_contract" => Category::Inverse,
            "usdc_option" => Category::Option,
            _ => Category::Linear,
        }
    }

    /// Venue label that maps back to this category
    pub fn label(self) -> &'static str {
        match self {
            Category::Spot => "spot",
            Category::Linear => "usdt_contract",
            Category::Inverse => "inverse_contract",
            Category::Option => "usdc_option",
        }
    }

    /// Path segment under `/v5/public/`
    pub fn public_segment(self) -> &'static str {
        match self {
            Category::Spot => "spot",
            Category::Linear => "linear",
            Category::Inverse => "inverse",
            Category::Option => "option",
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::from_label(&label)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Category::from_label(label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Whether a data frame carries a full snapshot or an incremental delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    #[default]
    Snapshot,
    Delta,
}
