//! Merge policies and concurrent dispatch shared by the aggregating sources.

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SourceFailure};
use crate::timeouts::with_timeout;

/// How the values reported by several sources are merged into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Min,
    Max,
    Median,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        Self::Median
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AggregationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "median" => Ok(Self::Median),
            other => Err(format!(
                "unknown aggregation method '{}', expected min, max or median",
                other
            )),
        }
    }
}

/// Numeric values that can be aggregated.
pub trait Aggregatable: Copy + PartialOrd {
    /// Mean of two values, rounded down for integers.
    fn midpoint(a: Self, b: Self) -> Self;
}

impl Aggregatable for u128 {
    fn midpoint(a: Self, b: Self) -> Self {
        a / 2 + b / 2 + (a % 2 + b % 2) / 2
    }
}

impl Aggregatable for f64 {
    fn midpoint(a: Self, b: Self) -> Self {
        (a + b) / 2.0
    }
}

impl AggregationMethod {
    /// Merge `values`. Returns `None` only for an empty input.
    ///
    /// The median of an even number of values is the midpoint of the two
    /// middle values, rounded down for integers.
    pub fn apply<T: Aggregatable>(&self, mut values: Vec<T>) -> Option<T> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let last = values.len() - 1;
        match self {
            Self::Min => Some(values[0]),
            Self::Max => Some(values[last]),
            Self::Median => {
                let middle = values.len() / 2;
                if values.len() % 2 == 1 {
                    Some(values[middle])
                } else {
                    Some(T::midpoint(values[middle - 1], values[middle]))
                }
            }
        }
    }
}

/// Outcome of querying several sources: who answered and who failed.
#[derive(Debug)]
pub struct Settled<T> {
    pub responses: Vec<(String, T)>,
    pub failures: Vec<SourceFailure>,
}

impl<T> Settled<T> {
    /// Move responses rejected by `accept` into the failure list.
    pub fn retain_responses(&mut self, mut accept: impl FnMut(&T) -> bool, rejection: Error) {
        let (kept, rejected): (Vec<_>, Vec<_>) = std::mem::take(&mut self.responses)
            .into_iter()
            .partition(|(_, response)| accept(response));
        self.responses = kept;
        self.failures.extend(
            rejected
                .into_iter()
                .map(|(source, _)| SourceFailure::new(source, rejection.clone())),
        );
    }

    /// Fail with [`Error::AllSourcesFailed`] when nobody answered.
    pub fn require_any(self, operation: &'static str) -> Result<Vec<(String, T)>> {
        if self.responses.is_empty() {
            return Err(Error::all_sources_failed(operation, self.failures));
        }
        Ok(self.responses)
    }
}

/// Run every call concurrently, each under its own copy of `timeout`, and
/// wait for all of them. Individual failures are logged and collected.
pub async fn settle_all<T, Fut>(calls: Vec<(String, Fut)>, timeout: Option<Duration>) -> Settled<T>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (names, futures): (Vec<String>, Vec<Fut>) = calls.into_iter().unzip();
    let outcomes = join_all(futures.into_iter().map(|call| with_timeout(call, timeout))).await;

    let mut settled = Settled {
        responses: Vec::with_capacity(outcomes.len()),
        failures: Vec::new(),
    };
    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            Ok(response) => settled.responses.push((name, response)),
            Err(err) => {
                tracing::warn!("Source '{}' failed: {}", name, err);
                settled.failures.push(SourceFailure::new(name, err));
            }
        }
    }
    settled
}
