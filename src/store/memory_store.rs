use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;

use log::{debug, info, warn};
use serde_json::{json, Value};
use uuid::Uuid;

use super::query_builder::GROUP_KEY;
use super::store_trait::LogStore;
use super::types::*;
use crate::error_handling::types::StoreError;
use crate::records::{IpAggregateRow, LogRecord};

struct ScrollContext {
    offset: usize,
    batch_size: usize,
}

/// `LogStore` over records held in memory.
///
/// Document order is insertion order. The three query shapes behave like
/// their Elasticsearch counterparts: composite groups come back in ascending
/// key order, source searches sort by `(timestamp, doc)`, and scroll contexts
/// live until cleared.
pub struct MemoryStore {
    records: Vec<LogRecord>,
    scrolls: Mutex<HashMap<String, ScrollContext>>,
    label: String,
}

impl MemoryStore {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self {
            label: format!("memory ({} records)", records.len()),
            records,
            scrolls: Mutex::new(HashMap::new()),
        }
    }

    /// Loads newline-delimited JSON documents. Lines that do not decode are skipped.
    pub fn from_ndjson_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| StoreError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping {}:{}: {}", path.display(), number + 1, e);
                }
            }
        }
        info!(
            "Loaded {} record(s) from {} ({} skipped)",
            records.len(),
            path.display(),
            skipped
        );
        let mut store = Self::new(records);
        store.label = format!("file {}", path.display());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of scroll contexts opened and not yet cleared.
    pub fn active_scrolls(&self) -> usize {
        self.scrolls.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn scroll_batch(&self, offset: usize, batch_size: usize) -> Vec<LogRecord> {
        self.records.iter().skip(offset).take(batch_size).cloned().collect()
    }
}

fn poisoned() -> StoreError {
    StoreError::ConnectionFailed("scroll registry lock poisoned".into())
}

fn bad_request(message: String) -> StoreError {
    StoreError::RequestFailed {
        status: 400,
        body: message,
    }
}

fn sort_key(cursor: &SortCursor) -> Result<(i64, usize), StoreError> {
    match cursor.0.as_slice() {
        [Value::Number(ts), Value::Number(doc)] => match (ts.as_i64(), doc.as_u64()) {
            (Some(ts), Some(doc)) => Ok((ts, doc as usize)),
            _ => Err(bad_request(format!("unusable search_after {:?}", cursor.0))),
        },
        _ => Err(bad_request(format!("unusable search_after {:?}", cursor.0))),
    }
}

impl LogStore for MemoryStore {
    fn aggregate_sources(&self, request: &AggregationRequest) -> Result<AggregationPage, StoreError> {
        let after = match &request.after {
            None => None,
            Some(cursor) => match cursor.0.get(GROUP_KEY) {
                Some(Value::String(ip)) => Some(ip.clone()),
                _ => return Err(bad_request(format!("unusable after_key {}", cursor.0))),
            },
        };

        let mut groups: BTreeMap<&str, Vec<&LogRecord>> = BTreeMap::new();
        for record in &self.records {
            if let Some(range) = &request.time_range {
                if !range.contains(&record.timestamp) {
                    continue;
                }
            }
            if after.as_deref().is_some_and(|after| record.source_ip.as_str() <= after) {
                continue;
            }
            groups.entry(record.source_ip.as_str()).or_default().push(record);
        }

        let rows: Vec<IpAggregateRow> = groups
            .into_iter()
            .take(request.batch_size)
            .map(|(ip, records)| IpAggregateRow::from_records(ip, records))
            .collect();
        let after_key = rows
            .last()
            .map(|row| CompositeCursor(json!({ GROUP_KEY: row.source_ip })));
        debug!("Memory composite page with {} group(s)", rows.len());
        Ok(AggregationPage { rows, after_key })
    }

    fn search_source(&self, request: &SourceSearch) -> Result<SearchPage, StoreError> {
        let after = request.after.as_ref().map(sort_key).transpose()?;
        let mut matching: Vec<((i64, usize), &LogRecord)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.source_ip == request.source_ip)
            .map(|(doc, r)| ((r.timestamp.timestamp_micros(), doc), r))
            .filter(|(key, _)| after.map_or(true, |after| *key > after))
            .collect();
        matching.sort_by_key(|(key, _)| *key);
        matching.truncate(request.page_size);

        let last_sort = matching
            .last()
            .map(|((ts, doc), _)| SortCursor(vec![json!(ts), json!(doc)]));
        Ok(SearchPage {
            hit_count: matching.len(),
            records: matching.into_iter().map(|(_, r)| r.clone()).collect(),
            last_sort,
        })
    }

    fn open_scroll(&self, request: &ScrollRequest) -> Result<ScrollPage, StoreError> {
        let id = Uuid::new_v4().to_string();
        let records = self.scroll_batch(0, request.batch_size);
        self.scrolls.lock().map_err(|_| poisoned())?.insert(
            id.clone(),
            ScrollContext {
                offset: records.len(),
                batch_size: request.batch_size,
            },
        );
        debug!("Opened memory scroll {}", id);
        Ok(ScrollPage {
            scroll_id: Some(ScrollId(id)),
            hit_count: records.len(),
            records,
        })
    }

    fn next_scroll(&self, scroll_id: &ScrollId, _keep_alive: &str) -> Result<ScrollPage, StoreError> {
        let mut scrolls = self.scrolls.lock().map_err(|_| poisoned())?;
        let context = scrolls.get_mut(&scroll_id.0).ok_or_else(|| StoreError::RequestFailed {
            status: 404,
            body: format!("search_context_missing_exception: {}", scroll_id),
        })?;
        let records = self.scroll_batch(context.offset, context.batch_size);
        context.offset += records.len();
        Ok(ScrollPage {
            scroll_id: Some(scroll_id.clone()),
            hit_count: records.len(),
            records,
        })
    }

    fn clear_scroll(&self, scroll_id: &ScrollId) -> Result<(), StoreError> {
        match self.scrolls.lock().map_err(|_| poisoned())?.remove(&scroll_id.0) {
            Some(_) => Ok(()),
            None => Err(StoreError::RequestFailed {
                status: 404,
                body: format!("no scroll context {}", scroll_id),
            }),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
