//! Typed columns and paging over in-memory tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error_handling::types::FilterError;
use crate::records::{AggregateMetric, IpAggregateRow, LogRecord};

/// One cell of a table row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(u64),
    Time(DateTime<Utc>),
}

impl Cell {
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Number(n) => Value::from(*n),
            Cell::Time(_) => Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Time(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

pub trait Column: Copy + FromStr<Err = FilterError> {
    fn name(self) -> &'static str;
}

/// Rows with typed access to their cells.
pub trait Tabular {
    type Column: Column;

    fn cell(&self, column: Self::Column) -> Cell;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColumn {
    SourceIp,
    DestinationIp,
    SourcePort,
    DestinationPort,
    Protocol,
    Action,
    Timestamp,
    RuleId,
    Interface,
}

impl LogColumn {
    pub const ALL: [LogColumn; 9] = [
        LogColumn::SourceIp,
        LogColumn::DestinationIp,
        LogColumn::SourcePort,
        LogColumn::DestinationPort,
        LogColumn::Protocol,
        LogColumn::Action,
        LogColumn::Timestamp,
        LogColumn::RuleId,
        LogColumn::Interface,
    ];

    /// Columns shown when the caller does not choose.
    pub const DEFAULT: [LogColumn; 8] = [
        LogColumn::SourceIp,
        LogColumn::DestinationIp,
        LogColumn::SourcePort,
        LogColumn::DestinationPort,
        LogColumn::Protocol,
        LogColumn::Action,
        LogColumn::Timestamp,
        LogColumn::RuleId,
    ];
}

impl Column for LogColumn {
    fn name(self) -> &'static str {
        match self {
            LogColumn::SourceIp => "ipsrc",
            LogColumn::DestinationIp => "ipdst",
            LogColumn::SourcePort => "portsrc",
            LogColumn::DestinationPort => "portdst",
            LogColumn::Protocol => "proto",
            LogColumn::Action => "action",
            LogColumn::Timestamp => "timestamp",
            LogColumn::RuleId => "idregle",
            LogColumn::Interface => "interfaceint",
        }
    }
}

impl FromStr for LogColumn {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LogColumn::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| FilterError::BadValue(format!("unknown log column {:?}", s)))
    }
}

impl Tabular for LogRecord {
    type Column = LogColumn;

    fn cell(&self, column: LogColumn) -> Cell {
        match column {
            LogColumn::SourceIp => Cell::Text(self.source_ip.clone()),
            LogColumn::DestinationIp => Cell::Text(self.destination_ip.clone()),
            LogColumn::SourcePort => Cell::Number(self.source_port.into()),
            LogColumn::DestinationPort => Cell::Number(self.destination_port.into()),
            LogColumn::Protocol => Cell::Text(self.protocol.to_string()),
            LogColumn::Action => Cell::Text(self.action.to_string()),
            LogColumn::Timestamp => Cell::Time(self.timestamp),
            LogColumn::RuleId => Cell::Text(self.rule_id.clone()),
            LogColumn::Interface => Cell::Text(self.interface.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateColumn {
    SourceIp,
    Metric(AggregateMetric),
}

impl AggregateColumn {
    pub fn all() -> Vec<AggregateColumn> {
        std::iter::once(AggregateColumn::SourceIp)
            .chain(AggregateMetric::ALL.into_iter().map(AggregateColumn::Metric))
            .collect()
    }
}

impl Column for AggregateColumn {
    fn name(self) -> &'static str {
        match self {
            AggregateColumn::SourceIp => "source_ip",
            AggregateColumn::Metric(metric) => metric.as_str(),
        }
    }
}

impl FromStr for AggregateColumn {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("source_ip") {
            return Ok(AggregateColumn::SourceIp);
        }
        s.parse::<AggregateMetric>()
            .map(AggregateColumn::Metric)
            .map_err(|_| FilterError::BadValue(format!("unknown aggregate column {:?}", s)))
    }
}

impl Tabular for IpAggregateRow {
    type Column = AggregateColumn;

    fn cell(&self, column: AggregateColumn) -> Cell {
        match column {
            AggregateColumn::SourceIp => Cell::Text(self.source_ip.clone()),
            AggregateColumn::Metric(metric) => Cell::Number(self.metric(metric)),
        }
    }
}

/// Parses a comma-separated column list, falling back to `default` when absent or empty.
pub fn parse_columns<C: Column>(raw: Option<&str>, default: &[C]) -> Result<Vec<C>, FilterError> {
    let columns = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<C>())
        .collect::<Result<Vec<C>, _>>()?;
    if columns.is_empty() {
        Ok(default.to_vec())
    } else {
        Ok(columns)
    }
}

/// One page of a table plus the numbers needed to navigate it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slices `rows` into a page. The page number is clamped into `1..=total_pages`.
pub fn paginate<T>(rows: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = rows.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let items = rows
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}
