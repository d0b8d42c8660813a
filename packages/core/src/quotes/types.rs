use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{amount_string, Address, AmountOfToken, ChainId, TokenAddress};

pub type SourceId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSourceSupport {
    pub chains: Vec<ChainId>,
    pub buy_orders: bool,
    pub swap_and_transfer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub name: String,
    pub logo_uri: String,
    pub supports: QuoteSourceSupport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuoteOrder {
    Sell {
        #[serde(rename = "sellAmount", with = "amount_string")]
        sell_amount: AmountOfToken,
    },
    Buy {
        #[serde(rename = "buyAmount", with = "amount_string")]
        buy_amount: AmountOfToken,
    },
}

/// A swap to quote on one chain.
///
/// `source_ids` and `quote_timeout` drive the source list itself and are not
/// part of the serialized body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub chain_id: ChainId,
    pub sell_token: TokenAddress,
    pub buy_token: TokenAddress,
    pub order: QuoteOrder,
    pub slippage_percentage: f64,
    pub taker_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_buy_orders_with_sell_only_sources: Option<bool>,
    #[serde(skip)]
    pub source_ids: Vec<SourceId>,
    #[serde(skip)]
    pub quote_timeout: Option<Duration>,
}

impl QuoteRequest {
    /// The same request, restricted to `source_ids`.
    pub fn for_sources(&self, source_ids: Vec<SourceId>) -> Self {
        Self {
            source_ids,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTx {
    pub to: Address,
    pub calldata: String,
    #[serde(with = "amount_string")]
    pub value: AmountOfToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceQuote {
    #[serde(with = "amount_string")]
    pub sell_amount: AmountOfToken,
    #[serde(with = "amount_string")]
    pub buy_amount: AmountOfToken,
    #[serde(with = "amount_string")]
    pub max_sell_amount: AmountOfToken,
    #[serde(with = "amount_string")]
    pub min_buy_amount: AmountOfToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<u64>,
    pub allowance_target: Address,
    pub tx: QuoteTx,
}

/// What one source answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QuoteResponse {
    Success { source: SourceId, quote: SourceQuote },
    Failure { source: SourceId, reason: String },
}

impl QuoteResponse {
    pub fn failure(source: impl Into<SourceId>, reason: impl ToString) -> Self {
        Self::Failure {
            source: source.into(),
            reason: reason.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Success { source, .. } | Self::Failure { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A set of quote sources reachable as one unit.
#[async_trait]
pub trait QuoteSourceList: Send + Sync {
    fn supported_sources(&self) -> HashMap<SourceId, SourceMetadata>;

    /// One response per requested source id. Failures of individual sources
    /// are reported as [`QuoteResponse::Failure`].
    async fn get_quotes(&self, request: &QuoteRequest) -> Result<Vec<QuoteResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_is_tagged_by_type() {
        let order = QuoteOrder::Buy { buy_amount: 1000 };
        assert_eq!(
            serde_json::to_value(order).unwrap(),
            json!({ "type": "buy", "buyAmount": "1000" })
        );
    }

    #[test]
    fn failure_response_reads_from_json() {
        let response: QuoteResponse = serde_json::from_value(json!({
            "status": "failure",
            "source": "paraswap",
            "reason": "no route"
        }))
        .unwrap();
        assert_eq!(response, QuoteResponse::failure("paraswap", "no route"));
        assert!(!response.is_success());
        assert_eq!(response.source(), "paraswap");
    }
}
