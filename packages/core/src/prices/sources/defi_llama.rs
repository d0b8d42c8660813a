use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::prices::source::{
    check_price_support, PriceQuery, PriceResult, PriceSource, PricesInChains,
    PricesQueriesSupport, TokensInChains,
};
use crate::types::{chains, is_same_address, ChainId, Timestamp, TokenAddress, NATIVE_TOKEN};

const DEFAULT_BASE_URL: &str = "https://coins.llama.fi";

/// Coins per request. Longer URLs get rejected.
const COINS_PER_REQUEST: usize = 80;

/// Chain key used in coin ids, and the coin id of the chain's gas token.
const NETWORKS: &[(ChainId, &str, &str)] = &[
    (chains::ETHEREUM, "ethereum", "coingecko:ethereum"),
    (chains::OPTIMISM, "optimism", "coingecko:ethereum"),
    (chains::BNB_CHAIN, "bsc", "coingecko:binancecoin"),
    (chains::POLYGON, "polygon", "coingecko:matic-network"),
    (chains::FANTOM, "fantom", "coingecko:fantom"),
    (chains::ASTAR, "astar", "coingecko:astar"),
    (chains::POLYGON_ZKEVM, "polygon_zkevm", "coingecko:ethereum"),
    (chains::ARBITRUM, "arbitrum", "coingecko:ethereum"),
    (chains::AVALANCHE, "avax", "coingecko:avalanche-2"),
];

#[derive(Debug, Deserialize)]
struct CoinsResponse {
    coins: HashMap<String, CoinPrice>,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    price: f64,
    timestamp: Timestamp,
}

/// Prices from the DefiLlama coins API.
pub struct DefiLlamaPriceSource {
    http: Client,
    base_url: String,
}

impl DefiLlamaPriceSource {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(
        &self,
        addresses: &TokensInChains,
        path: &str,
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        let requested: Vec<(String, ChainId, TokenAddress)> = addresses
            .iter()
            .flat_map(|(chain_id, tokens)| {
                tokens.iter().filter_map(move |token| {
                    let id = coin_id(*chain_id, token)?;
                    Some((id, *chain_id, token.clone()))
                })
            })
            .collect();

        let mut ids: Vec<&str> = requested.iter().map(|(id, _, _)| id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();

        let responses = try_join_all(
            ids.chunks(COINS_PER_REQUEST)
                .map(|chunk| self.fetch_chunk(path, chunk, search_width, timeout)),
        )
        .await?;
        let coins: HashMap<String, CoinPrice> = responses
            .into_iter()
            .flatten()
            .map(|(id, price)| (id.to_ascii_lowercase(), price))
            .collect();

        let mut result = PricesInChains::new();
        for (id, chain_id, token) in requested {
            let prices = result.entry(chain_id).or_default();
            if let Some(coin) = coins.get(&id) {
                prices.insert(
                    token,
                    PriceResult {
                        price: coin.price,
                        closest_timestamp: coin.timestamp,
                    },
                );
            }
        }
        Ok(result)
    }

    async fn fetch_chunk(
        &self,
        path: &str,
        ids: &[&str],
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<HashMap<String, CoinPrice>> {
        let url = format!("{}/prices/{}/{}", self.base_url, path, ids.join(","));
        let mut builder = self.http.get(url);
        if let Some(width) = search_width {
            builder = builder.query(&[("searchWidth", format_search_width(width))]);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response: CoinsResponse = builder.send().await?.error_for_status()?.json().await?;
        Ok(response.coins)
    }
}

#[async_trait]
impl PriceSource for DefiLlamaPriceSource {
    fn name(&self) -> &str {
        "defi-llama"
    }

    fn supported_queries(&self) -> HashMap<ChainId, PricesQueriesSupport> {
        let support = PricesQueriesSupport {
            get_current_prices: true,
            get_historical_prices: true,
        };
        NETWORKS
            .iter()
            .map(|(chain_id, _, _)| (*chain_id, support))
            .collect()
    }

    async fn get_current_prices(
        &self,
        addresses: &TokensInChains,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        check_price_support(&self.supported_queries(), addresses.keys(), PriceQuery::Current)?;
        self.fetch(addresses, "current", None, timeout).await
    }

    async fn get_historical_prices(
        &self,
        addresses: &TokensInChains,
        timestamp: Timestamp,
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        check_price_support(
            &self.supported_queries(),
            addresses.keys(),
            PriceQuery::Historical,
        )?;
        if timestamp < 0 {
            return Err(Error::format(format!("invalid timestamp {}", timestamp)));
        }
        let path = format!("historical/{}", timestamp);
        self.fetch(addresses, &path, search_width, timeout).await
    }
}

/// `{chain}:{address}`, or the gas token's coin id for the native token.
fn coin_id(chain_id: ChainId, token: &str) -> Option<String> {
    let (_, key, native) = NETWORKS.iter().find(|(id, _, _)| *id == chain_id)?;
    if is_same_address(token, NATIVE_TOKEN) {
        Some(native.to_string())
    } else {
        Some(format!("{}:{}", key, token.to_ascii_lowercase()))
    }
}

/// The API takes widths such as `4h` or `30m`.
fn format_search_width(width: Duration) -> String {
    let seconds = width.as_secs();
    if seconds > 0 && seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else {
        format!("{}m", seconds.div_ceil(60).max(1))
    }
}
