//! In-memory gas price store.
//!
//! `GasPriceStore` keeps, per chain, a bounded window of `GasSnapshot`
//! values collected across polling cycles. When a chain's window is full
//! the oldest snapshot is evicted before the new one is inserted.
//!
//! Callers share it as `Arc<RwLock<GasPriceStore>>` between the polling
//! task and the Axum handlers.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gas::GasPriceResult;
use crate::types::ChainId;

/// Default number of snapshots retained per chain.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Gas prices of one chain at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSnapshot {
    pub chain_id: ChainId,
    pub fetched_at: DateTime<Utc>,
    pub prices: GasPriceResult,
}

#[derive(Debug)]
pub struct GasPriceStore {
    chains: HashMap<ChainId, VecDeque<GasSnapshot>>,
    capacity: usize,
}

impl GasPriceStore {
    /// Create a store keeping at most `capacity` snapshots per chain.
    pub fn new(capacity: usize) -> Self {
        Self {
            chains: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot, evicting the chain's oldest if its window is full.
    pub fn push(&mut self, snapshot: GasSnapshot) {
        let history = self.chains.entry(snapshot.chain_id).or_default();
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    pub fn latest(&self, chain_id: ChainId) -> Option<&GasSnapshot> {
        self.chains.get(&chain_id)?.back()
    }

    /// Snapshots taken at or after `since`, oldest first.
    pub fn get_since(&self, chain_id: ChainId, since: DateTime<Utc>) -> Vec<GasSnapshot> {
        self.chains
            .get(&chain_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|snapshot| snapshot.fetched_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `n` most recent snapshots of a chain, oldest first.
    pub fn get_last_n(&self, chain_id: ChainId, n: usize) -> Vec<GasSnapshot> {
        let Some(history) = self.chains.get(&chain_id) else {
            return Vec::new();
        };
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }

    /// Chains with at least one snapshot, sorted.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self
            .chains
            .iter()
            .filter(|(_, history)| !history.is_empty())
            .map(|(chain_id, _)| *chain_id)
            .collect();
        chains.sort_unstable();
        chains
    }

    /// Total number of snapshots across chains.
    pub fn len(&self) -> usize {
        self.chains.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.chains.clear();
    }
}
