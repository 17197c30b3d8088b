//! Log Store Trait
//!
//! This module defines the `LogStore` trait, the read-only interface the
//! retrieval components use to reach the backing log index.
//!
//! Implementors answer three query shapes:
//! - a composite aggregation page grouped by source IP
//! - a sorted term query page resumed with sort values
//! - a scroll lifecycle (`open`, `next`, `clear`) over the whole corpus
//!
//! Every method is a single request. Pagination loops live in `retrieval`.

use super::types::*;
use crate::error_handling::types::StoreError;

pub trait LogStore: Send + Sync {
    /// Fetches one page of per-source aggregate rows.
    fn aggregate_sources(&self, request: &AggregationRequest) -> Result<AggregationPage, StoreError>;

    /// Fetches one page of records whose source IP equals `request.source_ip`.
    fn search_source(&self, request: &SourceSearch) -> Result<SearchPage, StoreError>;

    /// Opens a scroll context and returns its first page.
    fn open_scroll(&self, request: &ScrollRequest) -> Result<ScrollPage, StoreError>;

    /// Fetches the next page of an open scroll context, renewing its keep-alive.
    fn next_scroll(&self, scroll_id: &ScrollId, keep_alive: &str) -> Result<ScrollPage, StoreError>;

    /// Releases a scroll context.
    fn clear_scroll(&self, scroll_id: &ScrollId) -> Result<(), StoreError>;

    /// Short human-readable description used in log lines.
    fn describe(&self) -> String;
}
