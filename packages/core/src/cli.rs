use clap::Parser;

use crate::aggregation::AggregationMethod;

/// Source aggregator CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "source-aggregator",
    version,
    about = "Aggregates gas prices from many independent sources"
)]
pub struct Cli {
    /// Comma separated chain ids to poll
    #[arg(long)]
    pub chains: Option<String>,

    /// Gas polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// How source answers are merged
    #[arg(long, value_enum, ignore_case = true)]
    pub aggregation: Option<AggregationMethod>,

    /// Deadline of each source query, e.g. "5s" or "750ms"
    #[arg(long)]
    pub timeout: Option<String>,

    /// Port of the HTTP API
    #[arg(long)]
    pub port: Option<u16>,
}
