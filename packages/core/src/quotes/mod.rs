//! Swap quotes gathered from lists of quote sources.

pub mod api_source_list;
pub mod overridable_source_list;
pub mod types;

pub use api_source_list::{ApiSourceList, UriGenerator};
pub use overridable_source_list::OverridableSourceList;
pub use types::{
    QuoteOrder, QuoteRequest, QuoteResponse, QuoteSourceList, QuoteSourceSupport, QuoteTx,
    SourceId, SourceMetadata, SourceQuote,
};
