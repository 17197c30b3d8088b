use std::sync::Arc;

use log::{debug, info, warn};

use super::outcome::QueryOutcome;
use crate::error_handling::types::QueryError;
use crate::filtering::TimeRange;
use crate::records::IpAggregateRow;
use crate::store::types::AggregationRequest;
use crate::store::LogStore;

/// Walks the per-source composite aggregation to exhaustion.
pub struct Aggregator {
    store: Arc<dyn LogStore>,
    batch_size: usize,
}

impl Aggregator {
    pub fn new(store: Arc<dyn LogStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// One row per distinct source IP, optionally limited to a time window.
    pub fn try_aggregate(&self, range: Option<&TimeRange>) -> Result<Vec<IpAggregateRow>, QueryError> {
        let mut rows = Vec::new();
        let mut cursor = None;
        let mut pages = 0usize;
        loop {
            let request = AggregationRequest {
                time_range: range.copied(),
                batch_size: self.batch_size,
                after: cursor.clone(),
            };
            let page = self.store.aggregate_sources(&request)?;
            pages += 1;
            if page.rows.is_empty() {
                break;
            }
            for row in page.rows.iter().filter(|r| !r.is_consistent()) {
                warn!("Inconsistent counts for source {}: {:?}", row.source_ip, row);
            }
            debug!("Aggregation page {}: {} row(s)", pages, page.rows.len());
            rows.extend(page.rows);

            match page.after_key {
                None => break,
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(QueryError::StalledCursor("source aggregation"));
                }
                Some(next) => cursor = Some(next),
            }
        }
        info!(
            "Aggregated {} source(s) in {} page(s) from {}",
            rows.len(),
            pages,
            self.store.describe()
        );
        Ok(rows)
    }

    pub fn aggregate(&self, range: Option<&TimeRange>) -> QueryOutcome<IpAggregateRow> {
        QueryOutcome::from_result(self.try_aggregate(range), "Source aggregation")
    }
}
