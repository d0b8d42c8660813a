//! Routes individual sources to a dedicated list, everything else to a default.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::Result;
use crate::quotes::types::{QuoteRequest, QuoteResponse, QuoteSourceList, SourceId, SourceMetadata};

pub struct OverridableSourceList {
    default: Arc<dyn QuoteSourceList>,
    overrides: HashMap<SourceId, Arc<dyn QuoteSourceList>>,
}

impl OverridableSourceList {
    pub fn new(
        default: Arc<dyn QuoteSourceList>,
        overrides: HashMap<SourceId, Arc<dyn QuoteSourceList>>,
    ) -> Self {
        Self { default, overrides }
    }

    fn list_for(&self, source_id: &str) -> &Arc<dyn QuoteSourceList> {
        self.overrides.get(source_id).unwrap_or(&self.default)
    }
}

#[async_trait]
impl QuoteSourceList for OverridableSourceList {
    fn supported_sources(&self) -> HashMap<SourceId, SourceMetadata> {
        let mut sources = self.default.supported_sources();
        for (source_id, list) in &self.overrides {
            match list.supported_sources().remove(source_id) {
                Some(metadata) => {
                    sources.insert(source_id.clone(), metadata);
                }
                None => {
                    sources.remove(source_id);
                }
            }
        }
        sources
    }

    async fn get_quotes(&self, request: &QuoteRequest) -> Result<Vec<QuoteResponse>> {
        // Group by list, keeping the first position of each source.
        let mut groups: Vec<(&Arc<dyn QuoteSourceList>, Vec<SourceId>)> = Vec::new();
        for source_id in &request.source_ids {
            let list = self.list_for(source_id);
            match groups.iter().position(|(grouped, _)| Arc::ptr_eq(*grouped, list)) {
                Some(index) => groups[index].1.push(source_id.clone()),
                None => groups.push((list, vec![source_id.clone()])),
            }
        }

        let batches = try_join_all(groups.into_iter().map(|(list, source_ids)| {
            let request = request.for_sources(source_ids);
            async move { list.get_quotes(&request).await }
        }))
        .await?;

        let mut responses: Vec<QuoteResponse> = batches.into_iter().flatten().collect();
        let position = |source: &str| {
            request
                .source_ids
                .iter()
                .position(|id| id == source)
                .unwrap_or(usize::MAX)
        };
        responses.sort_by_key(|response| position(response.source()));
        Ok(responses)
    }
}
