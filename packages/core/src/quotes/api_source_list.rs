//! Quote sources served by a remote quote API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;

use crate::error::Result;
use crate::quotes::types::{QuoteRequest, QuoteResponse, QuoteSourceList, SourceId, SourceMetadata};
use crate::timeouts::reduce_timeout;

/// Margin kept for ourselves when forwarding the quote timeout, so the remote
/// answers before we give up on it.
const FORWARDED_TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

/// Builds the endpoint to POST a request to.
pub type UriGenerator = Arc<dyn Fn(&QuoteRequest) -> String + Send + Sync>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiQuoteRequest<'a> {
    #[serde(flatten)]
    request: &'a QuoteRequest,
    source_ids: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    quote_timeout: Option<u128>,
}

pub struct ApiSourceList {
    http: Client,
    base_uri: UriGenerator,
    sources: HashMap<SourceId, SourceMetadata>,
}

impl ApiSourceList {
    pub fn new(
        http: Client,
        base_uri: UriGenerator,
        sources: HashMap<SourceId, SourceMetadata>,
    ) -> Self {
        Self {
            http,
            base_uri,
            sources,
        }
    }

    async fn quote(&self, request: &QuoteRequest, source_id: &str) -> QuoteResponse {
        if !self.sources.contains_key(source_id) {
            return QuoteResponse::failure(source_id, "Source not supported by this list");
        }
        match self.post(request, source_id).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("Quote from '{}' failed: {}", source_id, err);
                QuoteResponse::failure(source_id, err)
            }
        }
    }

    async fn post(&self, request: &QuoteRequest, source_id: &str) -> Result<QuoteResponse> {
        let body = ApiQuoteRequest {
            request,
            source_ids: [source_id],
            quote_timeout: reduce_timeout(request.quote_timeout, FORWARDED_TIMEOUT_MARGIN)
                .map(|timeout| timeout.as_millis()),
        };
        let mut builder = self.http.post((self.base_uri)(request)).json(&body);
        if let Some(timeout) = request.quote_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await?.error_for_status()?.json().await?;
        Ok(response)
    }
}

#[async_trait]
impl QuoteSourceList for ApiSourceList {
    fn supported_sources(&self) -> HashMap<SourceId, SourceMetadata> {
        self.sources.clone()
    }

    async fn get_quotes(&self, request: &QuoteRequest) -> Result<Vec<QuoteResponse>> {
        Ok(join_all(
            request
                .source_ids
                .iter()
                .map(|source_id| self.quote(request, source_id)),
        )
        .await)
    }
}
