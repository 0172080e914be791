/*
[INPUT]:  Environment, channel kind, category, optional URL override
[OUTPUT]: Stream endpoint URL
[POS]:    WebSocket layer - fixed routing table
[UPDATE]: When Bybit adds stream paths or hosts
*/

use url::Url;

use crate::error::Result;
use crate::types::{Category, ChannelKind, Environment};

use super::config::ConnectionConfig;

pub const DEFAULT_SCHEME: &str = "wss";
pub const PRIVATE_PATH: &str = "/v5/private";

/// Route `(environment, kind, category)` to a stream URL.
///
/// Private streams ignore the category.
pub fn stream_url(environment: Environment, kind: ChannelKind, category: Category) -> String {
    let host = environment.host();
    match kind {
        ChannelKind::Public => format!(
            "{DEFAULT_SCHEME}://{host}/v5/public/{}",
            category.public_segment()
        ),
        ChannelKind::Private => format!("{DEFAULT_SCHEME}://{host}{PRIVATE_PATH}"),
    }
}

/// Resolve the endpoint for a connection config, validating the result.
pub fn endpoint_url(config: &ConnectionConfig) -> Result<Url> {
    if let Some(url) = &config.url_override {
        return Ok(Url::parse(url)?);
    }

    let mut url = Url::parse(&stream_url(
        config.environment,
        config.channel,
        config.category,
    ))?;

    if config.channel == ChannelKind::Private
        && let Some(max_active_time) = config.max_active_time.as_deref()
        && !max_active_time.is_empty()
    {
        url.query_pairs_mut()
            .append_pair("max_active_time", max_active_time);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use rstest::rstest;

    #[rstest]
    #[case("spot", "wss://stream.bybit.com/v5/public/spot")]
    #[case("usdt_contract", "wss://stream.bybit.com/v5/public/linear")]
    #[case("usdc_contract", "wss://stream.bybit.com/v5/public/linear")]
    #[case("usdc_futures", "wss://stream.bybit.com/v5/public/linear")]
    #[case("inverse_contract", "wss://stream.bybit.com/v5/public/inverse")]
    #[case("usdc_option", "wss://stream.bybit.com/v5/public/option")]
    #[case("linear", "wss://stream.bybit.com/v5/public/linear")]
    #[case("option", "wss://stream.bybit.com/v5/public/linear")]
    #[case("inverse", "wss://stream.bybit.com/v5/public/linear")]
    #[case("SPOT", "wss://stream.bybit.com/v5/public/linear")]
    #[case("", "wss://stream.bybit.com/v5/public/linear")]
    #[case("margin_thing", "wss://stream.bybit.com/v5/public/linear")]
    fn public_routing_table(#[case] category: &str, #[case] expected: &str) {
        let url = stream_url(
            Environment::Mainnet,
            ChannelKind::Public,
            Category::from_label(category),
        );
        assert_eq!(url, expected);
    }

    #[rstest]
    #[case("spot")]
    #[case("usdt_contract")]
    #[case("usdc_option")]
    #[case("unknown")]
    fn private_routing_ignores_category(#[case] category: &str) {
        let url = stream_url(
            Environment::Testnet,
            ChannelKind::Private,
            Category::from_label(category),
        );
        assert_eq!(url, "wss://stream-testnet.bybit.com/v5/private");
    }

    #[test]
    fn testnet_public_host() {
        let url = stream_url(Environment::Testnet, ChannelKind::Public, Category::Spot);
        assert_eq!(url, "wss://stream-testnet.bybit.com/v5/public/spot");
    }

    #[test]
    fn private_endpoint_carries_max_active_time() {
        let config = ConnectionConfig::private(
            Credentials::new("key", "secret"),
            false,
            Some("10m".into()),
            Category::Linear,
        );
        let url = endpoint_url(&config).unwrap();
        assert_eq!(url.as_str(), "wss://stream.bybit.com/v5/private?max_active_time=10m");
    }

    #[test]
    fn public_endpoint_ignores_max_active_time() {
        let mut config = ConnectionConfig::public(false, Category::Spot);
        config.max_active_time = Some("10m".into());
        let url = endpoint_url(&config).unwrap();
        assert_eq!(url.as_str(), "wss://stream.bybit.com/v5/public/spot");
    }

    #[test]
    fn override_wins() {
        let config = ConnectionConfig::public(true, Category::Spot)
            .with_url_override("ws://127.0.0.1:9000/feed");
        let url = endpoint_url(&config).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/feed");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let config = ConnectionConfig::public(true, Category::Spot).with_url_override("not a url");
        assert!(endpoint_url(&config).is_err());
    }
}
