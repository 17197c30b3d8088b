//! Entry point shared by the HTTP surface and the command line.
//!
//! A `FlowExplorer` owns one store handle, the three retrieval components
//! built on it, and a result cache per component. Cached values are shared
//! through `Arc` so repeated requests do not copy large tables.

use std::sync::Arc;

use log::info;

use crate::cache::TtlCache;
use crate::configuration::types::IpRange;
use crate::configuration::Config;
use crate::error_handling::types::{ConfigError, QueryError};
use crate::filtering::TimeRange;
use crate::records::{IpAggregateRow, LogRecord};
use crate::retrieval::{Aggregator, BoundedScan, QueryOutcome, SourceScan};
use crate::store::LogStore;

pub struct FlowExplorer {
    store: Arc<dyn LogStore>,
    aggregator: Aggregator,
    source_scan: SourceScan,
    bounded_scan: BoundedScan,
    aggregate_cache: TtlCache<Option<TimeRange>, Arc<Vec<IpAggregateRow>>>,
    source_cache: TtlCache<String, Arc<Vec<LogRecord>>>,
    scan_cache: TtlCache<usize, Arc<Vec<LogRecord>>>,
    local_networks: Vec<IpRange>,
    admin_ports: Vec<u16>,
    default_scan_records: usize,
    page_size: usize,
}

impl FlowExplorer {
    pub fn new(store: Arc<dyn LogStore>, config: &Config) -> Result<Self, ConfigError> {
        let retrieval = &config.retrieval;
        let ttl = config.cache.ttl();
        let max_entries = config.cache.max_entries;
        info!(
            "Explorer over {} (cache ttl {:?}, {} entries)",
            store.describe(),
            ttl,
            max_entries
        );
        Ok(Self {
            aggregator: Aggregator::new(store.clone(), retrieval.aggregation_batch_size),
            source_scan: SourceScan::new(store.clone(), retrieval.source_page_size),
            bounded_scan: BoundedScan::new(
                store.clone(),
                retrieval.scroll_batch_size,
                &retrieval.scroll_keep_alive,
                retrieval.max_scan_records,
            ),
            store,
            aggregate_cache: TtlCache::new(ttl, max_entries),
            source_cache: TtlCache::new(ttl, max_entries),
            scan_cache: TtlCache::new(ttl, max_entries),
            local_networks: config.local_networks()?,
            admin_ports: config.analysis.admin_ports.clone(),
            default_scan_records: retrieval.default_scan_records,
            page_size: config.web.page_size,
        })
    }

    pub fn try_aggregates(&self, range: Option<&TimeRange>) -> Result<Arc<Vec<IpAggregateRow>>, QueryError> {
        self.aggregate_cache
            .get_or_try_insert_with(range.copied(), || self.aggregator.try_aggregate(range).map(Arc::new))
    }

    pub fn aggregates(&self, range: Option<&TimeRange>) -> QueryOutcome<IpAggregateRow> {
        let result = self.try_aggregates(range).map(|rows| rows.as_ref().clone());
        QueryOutcome::from_result(result, "Source aggregation")
    }

    pub fn try_source_logs(&self, source_ip: &str) -> Result<Arc<Vec<LogRecord>>, QueryError> {
        self.source_cache
            .get_or_try_insert_with(source_ip.to_string(), || self.source_scan.try_scan(source_ip).map(Arc::new))
    }

    pub fn source_logs(&self, source_ip: &str) -> QueryOutcome<LogRecord> {
        let result = self.try_source_logs(source_ip).map(|records| records.as_ref().clone());
        QueryOutcome::from_result(result, "Source scan")
    }

    /// Bounded scan; `None` uses the configured default size.
    pub fn try_scan(&self, max: Option<usize>) -> Result<Arc<Vec<LogRecord>>, QueryError> {
        let max = self.bounded_scan.clamp(max.unwrap_or(self.default_scan_records));
        self.scan_cache
            .get_or_try_insert_with(max, || self.bounded_scan.try_scan(max).map(Arc::new))
    }

    pub fn scan(&self, max: Option<usize>) -> QueryOutcome<LogRecord> {
        let result = self.try_scan(max).map(|records| records.as_ref().clone());
        QueryOutcome::from_result(result, "Bounded scan")
    }

    pub fn local_networks(&self) -> &[IpRange] {
        &self.local_networks
    }

    pub fn admin_ports(&self) -> &[u16] {
        &self.admin_ports
    }

    pub fn default_scan_records(&self) -> usize {
        self.default_scan_records
    }

    pub fn scan_ceiling(&self) -> usize {
        self.bounded_scan.ceiling()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }
}
