use serde_json::Value;
use std::fmt;

use crate::filtering::TimeRange;
use crate::records::{IpAggregateRow, LogRecord};

/// Opaque `after_key` of a composite aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeCursor(pub Value);

/// Sort values of the last hit of a sorted page.
#[derive(Debug, Clone, PartialEq)]
pub struct SortCursor(pub Vec<Value>);

/// Server-held scroll context id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScrollId(pub String);

impl fmt::Display for ScrollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.0.chars().take(16).collect();
        if shown.len() < self.0.len() {
            write!(f, "{}...", shown)
        } else {
            write!(f, "{}", shown)
        }
    }
}

/// One page of the per-source composite aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub time_range: Option<TimeRange>,
    pub batch_size: usize,
    pub after: Option<CompositeCursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPage {
    pub rows: Vec<IpAggregateRow>,
    pub after_key: Option<CompositeCursor>,
}

/// One page of the records of a single source, ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSearch {
    pub source_ip: String,
    pub page_size: usize,
    pub after: Option<SortCursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub records: Vec<LogRecord>,
    /// Hits on the page, including any that failed to decode.
    pub hit_count: usize,
    pub last_sort: Option<SortCursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest {
    pub batch_size: usize,
    pub keep_alive: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollPage {
    pub scroll_id: Option<ScrollId>,
    pub records: Vec<LogRecord>,
    /// Hits on the page, including any that failed to decode.
    pub hit_count: usize,
}
