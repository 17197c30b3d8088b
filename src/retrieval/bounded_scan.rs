use std::sync::Arc;

use log::{debug, info, warn};

use super::outcome::QueryOutcome;
use crate::error_handling::types::QueryError;
use crate::records::LogRecord;
use crate::store::types::{ScrollId, ScrollRequest};
use crate::store::LogStore;

/// Releases a scroll context when dropped.
///
/// Tracks the most recent id handed back by the store; a failed release is
/// only logged.
pub struct ScrollGuard<'a> {
    store: &'a dyn LogStore,
    current: Option<ScrollId>,
}

impl<'a> ScrollGuard<'a> {
    pub fn new(store: &'a dyn LogStore, scroll_id: Option<ScrollId>) -> Self {
        Self {
            store,
            current: scroll_id,
        }
    }

    pub fn current(&self) -> Option<&ScrollId> {
        self.current.as_ref()
    }

    pub fn track(&mut self, scroll_id: ScrollId) {
        if self.current.as_ref() != Some(&scroll_id) {
            debug!("Scroll id rotated to {}", scroll_id);
            self.current = Some(scroll_id);
        }
    }
}

impl Drop for ScrollGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.current.take() {
            match self.store.clear_scroll(&id) {
                Ok(()) => debug!("Released scroll {}", id),
                Err(e) => warn!("Failed to release scroll {}: {}", id, e),
            }
        }
    }
}

/// Reads the first `max` records of the corpus through a scroll context.
pub struct BoundedScan {
    store: Arc<dyn LogStore>,
    batch_size: usize,
    keep_alive: String,
    ceiling: usize,
}

impl BoundedScan {
    pub fn new(store: Arc<dyn LogStore>, batch_size: usize, keep_alive: &str, ceiling: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            keep_alive: keep_alive.to_string(),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Clamps a requested size to the configured ceiling.
    pub fn clamp(&self, max: usize) -> usize {
        if max > self.ceiling {
            warn!("Requested {} records, clamped to {}", max, self.ceiling);
            self.ceiling
        } else {
            max
        }
    }

    pub fn try_scan(&self, max: usize) -> Result<Vec<LogRecord>, QueryError> {
        let max = self.clamp(max);
        if max == 0 {
            return Ok(Vec::new());
        }

        let request = ScrollRequest {
            batch_size: self.batch_size.min(max),
            keep_alive: self.keep_alive.clone(),
        };
        let first = self.store.open_scroll(&request)?;
        let mut guard = ScrollGuard::new(self.store.as_ref(), first.scroll_id);
        let mut records = first.records;
        let mut last_hits = first.hit_count;

        while last_hits > 0 && records.len() < max {
            let id = guard
                .current()
                .cloned()
                .ok_or(QueryError::MissingCursor("bounded scan"))?;
            let page = self.store.next_scroll(&id, &self.keep_alive)?;
            if let Some(next) = page.scroll_id {
                guard.track(next);
            }
            last_hits = page.hit_count;
            records.extend(page.records);
            debug!("Bounded scan at {} of {} record(s)", records.len(), max);
        }

        records.truncate(max);
        info!("Bounded scan returned {} record(s)", records.len());
        Ok(records)
    }

    pub fn scan(&self, max: usize) -> QueryOutcome<LogRecord> {
        QueryOutcome::from_result(self.try_scan(max), "Bounded scan")
    }
}
