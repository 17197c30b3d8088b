use serde::{Deserialize, Serialize};

use crate::error_handling::types::FilterError;
use crate::export::ExportFormat;
use crate::filtering::TimeRange;
use crate::records::{AggregateMetric, IpAggregateRow, LogRecord};
use crate::stats::{DailyActivity, PortCount, SourceSummary, Totals, ValueCount};
use crate::table::Page;

// Query strings. Every field stays textual so a bad value turns into a
// 400 with a readable message instead of a bare rejection.

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct TimeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TimeParams {
    pub fn range(&self) -> Result<Option<TimeRange>, FilterError> {
        TimeRange::from_bounds(self.start.as_deref(), self.end.as_deref())
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PageParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScanParams {
    pub max: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MetricParams {
    pub metric: Option<String>,
}

impl MetricParams {
    pub fn metric(&self) -> Result<AggregateMetric, FilterError> {
        match self.metric.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(AggregateMetric::Count),
            Some(raw) => raw.parse(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LimitParams {
    pub n: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ExportParams {
    pub format: Option<String>,
    pub columns: Option<String>,
}

impl ExportParams {
    pub fn format(&self) -> Result<ExportFormat, FilterError> {
        match self.format.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(ExportFormat::default()),
            Some(raw) => raw.parse(),
        }
    }
}

/// Parses an optional positive count, `default` when absent.
pub fn parse_number(name: &str, raw: Option<&str>, default: usize) -> Result<usize, FilterError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(FilterError::BadValue(format!(
                "{} must be a positive integer, got {:?}",
                name, raw
            ))),
        },
    }
}

// Response bodies

#[derive(Serialize)]
pub struct AggregatesResponse {
    pub totals: Totals,
    pub rows: Vec<IpAggregateRow>,
}

#[derive(Serialize)]
pub struct SourceLogsResponse {
    pub summary: SourceSummary,
    pub daily: Vec<DailyActivity>,
    pub top_destination_ports: Vec<PortCount>,
    pub top_source_ports: Vec<PortCount>,
    pub protocols: Vec<ValueCount>,
    pub records: Vec<LogRecord>,
}

#[derive(Serialize)]
pub struct LogsResponse {
    /// Records returned by the bounded scan before filtering
    pub scanned: usize,
    #[serde(flatten)]
    pub page: Page<LogRecord>,
}
