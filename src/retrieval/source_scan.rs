use std::sync::Arc;

use log::{debug, info};

use super::outcome::QueryOutcome;
use crate::error_handling::types::QueryError;
use crate::records::LogRecord;
use crate::store::types::SourceSearch;
use crate::store::LogStore;

/// Retrieves every record of one source address, oldest first.
pub struct SourceScan {
    store: Arc<dyn LogStore>,
    page_size: usize,
}

impl SourceScan {
    pub fn new(store: Arc<dyn LogStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// The match on `source_ip` is exact and case-sensitive.
    pub fn try_scan(&self, source_ip: &str) -> Result<Vec<LogRecord>, QueryError> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let request = SourceSearch {
                source_ip: source_ip.to_string(),
                page_size: self.page_size,
                after: cursor.clone(),
            };
            let page = self.store.search_source(&request)?;
            if page.hit_count == 0 {
                break;
            }
            debug!("Source {} page: {} hit(s)", source_ip, page.hit_count);
            records.extend(page.records);

            match page.last_sort {
                None => return Err(QueryError::MissingCursor("source scan")),
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(QueryError::StalledCursor("source scan"));
                }
                Some(next) => cursor = Some(next),
            }
        }
        info!("Retrieved {} record(s) for source {}", records.len(), source_ip);
        Ok(records)
    }

    pub fn scan(&self, source_ip: &str) -> QueryOutcome<LogRecord> {
        QueryOutcome::from_result(self.try_scan(source_ip), "Source scan")
    }
}
