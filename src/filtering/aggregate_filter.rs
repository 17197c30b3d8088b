use clap::Args;
use serde::Deserialize;

use super::selection::{parse_text, Selection};
use super::Predicate;
use crate::error_handling::types::FilterError;
use crate::records::{IpAggregateRow, PortClass, Protocol};

/// Filter over per-source aggregate rows.
///
/// A row passes the protocol dimension when it has at least one permitted
/// event for any selected protocol, and the port-class dimension when it has
/// at least one destination event in any selected class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateFilter {
    /// Inclusive permit-count bounds; `None` leaves that side open.
    pub min_permit: Option<u64>,
    pub max_permit: Option<u64>,
    pub protocols: Selection<Protocol>,
    pub port_classes: Selection<PortClass>,
    pub source_ips: Selection<String>,
}

impl AggregateFilter {
    pub fn is_unconstrained(&self) -> bool {
        self.min_permit.is_none()
            && self.max_permit.is_none()
            && self.protocols.is_all()
            && self.port_classes.is_all()
            && self.source_ips.is_all()
    }
}

impl Predicate<IpAggregateRow> for AggregateFilter {
    fn matches(&self, row: &IpAggregateRow) -> bool {
        if self.min_permit.is_some_and(|min| row.permit < min) {
            return false;
        }
        if self.max_permit.is_some_and(|max| row.permit > max) {
            return false;
        }
        self.protocols.allows_any(|p| row.permits_for(p) > 0)
            && self.port_classes.allows_any(|c| row.dst_events_in(*c) > 0)
            && self.source_ips.allows(&row.source_ip)
    }

    fn is_unconstrained(&self) -> bool {
        AggregateFilter::is_unconstrained(self)
    }
}

/// Textual aggregate filters from the command line or a query string.
#[derive(Args, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AggregateFilterParams {
    /// Smallest permit count to keep
    #[arg(long)]
    pub min_permit: Option<String>,
    /// Largest permit count to keep
    #[arg(long)]
    pub max_permit: Option<String>,
    /// Keep sources with permitted traffic on any of these protocols
    #[arg(long = "permit-protocols")]
    pub protocols: Option<String>,
    /// Keep sources with destination traffic in any of these port classes
    #[arg(long = "dst-port-classes")]
    pub port_classes: Option<String>,
    /// Keep only these sources
    #[arg(long)]
    pub source_ips: Option<String>,
}

impl AggregateFilterParams {
    pub fn to_filter(&self) -> Result<AggregateFilter, FilterError> {
        let min_permit = parse_count("min_permit", self.min_permit.as_deref())?;
        let max_permit = parse_count("max_permit", self.max_permit.as_deref())?;
        if let (Some(min), Some(max)) = (min_permit, max_permit) {
            if min > max {
                return Err(FilterError::EmptyRange(format!(
                    "min_permit {} exceeds max_permit {}",
                    min, max
                )));
            }
        }
        Ok(AggregateFilter {
            min_permit,
            max_permit,
            protocols: Selection::parse_opt(self.protocols.as_deref(), |s| Ok(Protocol::from(s)))?,
            port_classes: Selection::parse_opt(self.port_classes.as_deref(), |s| s.parse())?,
            source_ips: Selection::parse_opt(self.source_ips.as_deref(), parse_text)?,
        })
    }
}

fn parse_count(name: &str, raw: Option<&str>) -> Result<Option<u64>, FilterError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| FilterError::BadValue(format!("{} must be a non-negative integer, got {:?}", name, raw))),
    }
}
