use std::env;
use std::time::Duration;

use crate::aggregation::AggregationMethod;
use crate::cli::Cli;
use crate::timeouts::parse_duration;
use crate::types::{chains, ChainId};

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 15;
const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);
const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub chains: Vec<ChainId>,
    pub poll_interval_seconds: u64,
    pub aggregation: AggregationMethod,
    pub source_timeout: Duration,
    pub cache_ttl: Duration,
    pub http_port: u16,
    pub etherscan_api_key: Option<String>,
    pub alchemy_api_key: Option<String>,
    /// Extra RPC endpoints as `(chain, url)`.
    pub rpc_urls: Vec<(ChainId, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value lookup. Missing values fall back
    /// to defaults; malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let chains = match read("CHAINS") {
            Some(raw) => parse_chains(&raw).map_err(|err| format!("CHAINS: {}", err))?,
            None => vec![chains::ETHEREUM],
        };

        let poll_interval_seconds = match read("POLL_INTERVAL_SECONDS") {
            Some(raw) => parse_interval(&raw).ok_or("POLL_INTERVAL_SECONDS must be a positive number")?,
            None => DEFAULT_POLL_INTERVAL_SECONDS,
        };

        let aggregation = match read("GAS_AGGREGATION") {
            Some(raw) => raw.parse::<AggregationMethod>()?,
            None => AggregationMethod::default(),
        };

        let source_timeout = read_duration(&read, "SOURCE_TIMEOUT", DEFAULT_SOURCE_TIMEOUT)?;
        let cache_ttl = read_duration(&read, "CACHE_TTL", DEFAULT_CACHE_TTL)?;

        let http_port = match read("HTTP_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| "HTTP_PORT must be a valid port number")?,
            None => DEFAULT_HTTP_PORT,
        };

        let rpc_urls = match read("RPC_URLS") {
            Some(raw) => parse_rpc_urls(&raw).map_err(|err| format!("RPC_URLS: {}", err))?,
            None => Vec::new(),
        };

        Ok(Self {
            chains,
            poll_interval_seconds,
            aggregation,
            source_timeout,
            cache_ttl,
            http_port,
            etherscan_api_key: read("ETHERSCAN_API_KEY"),
            alchemy_api_key: read("ALCHEMY_API_KEY"),
            rpc_urls,
        })
    }

    /// Command line flags take precedence over the environment.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self, String> {
        if let Some(raw) = &cli.chains {
            self.chains = parse_chains(raw).map_err(|err| format!("--chains: {}", err))?;
        }
        if let Some(seconds) = cli.poll_interval {
            if seconds == 0 {
                return Err("--poll-interval must be positive".to_string());
            }
            self.poll_interval_seconds = seconds;
        }
        if let Some(method) = cli.aggregation {
            self.aggregation = method;
        }
        if let Some(raw) = &cli.timeout {
            self.source_timeout =
                parse_duration(raw).map_err(|err| format!("--timeout: {}", err))?;
        }
        if let Some(port) = cli.port {
            self.http_port = port;
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

fn read_duration(
    read: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, String> {
    match read(key) {
        Some(raw) => parse_duration(&raw).map_err(|err| format!("{}: {}", key, err)),
        None => Ok(default),
    }
}

fn parse_interval(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|seconds| *seconds > 0)
}

/// `"1, 137,10"` -> `[1, 137, 10]`, without duplicates.
pub fn parse_chains(raw: &str) -> Result<Vec<ChainId>, String> {
    let mut chains = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let chain_id = part
            .parse::<ChainId>()
            .map_err(|_| format!("'{}' is not a chain id", part))?;
        if !chains.contains(&chain_id) {
            chains.push(chain_id);
        }
    }
    if chains.is_empty() {
        return Err("at least one chain is required".to_string());
    }
    Ok(chains)
}

/// `"1=https://a,137=https://b"` -> `[(1, "https://a"), (137, "https://b")]`.
pub fn parse_rpc_urls(raw: &str) -> Result<Vec<(ChainId, String)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (chain, url) = entry
                .split_once('=')
                .ok_or_else(|| format!("'{}' is not of the form chain=url", entry))?;
            let chain_id = chain
                .trim()
                .parse::<ChainId>()
                .map_err(|_| format!("'{}' is not a chain id", chain.trim()))?;
            Ok((chain_id, url.trim().to_string()))
        })
        .collect()
}
