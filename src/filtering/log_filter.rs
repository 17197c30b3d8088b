use clap::Args;
use serde::Deserialize;

use super::selection::{parse_port, parse_text, Selection};
use super::time_range::TimeRange;
use super::Predicate;
use crate::error_handling::types::FilterError;
use crate::records::{Action, LogRecord, PortClass, Protocol};

/// User-chosen constraints over raw flow records.
///
/// Dimensions combine with AND, the values of one dimension with OR. The port
/// class dimension looks at the destination port and is independent of the
/// explicit port lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub time_range: Option<TimeRange>,
    pub protocols: Selection<Protocol>,
    pub actions: Selection<Action>,
    pub interfaces: Selection<String>,
    pub source_ports: Selection<u16>,
    pub destination_ports: Selection<u16>,
    pub port_classes: Selection<PortClass>,
    pub source_ips: Selection<String>,
    pub destination_ips: Selection<String>,
}

impl FilterSpec {
    pub fn is_unconstrained(&self) -> bool {
        self.time_range.is_none()
            && self.protocols.is_all()
            && self.actions.is_all()
            && self.interfaces.is_all()
            && self.source_ports.is_all()
            && self.destination_ports.is_all()
            && self.port_classes.is_all()
            && self.source_ips.is_all()
            && self.destination_ips.is_all()
    }
}

impl Predicate<LogRecord> for FilterSpec {
    fn matches(&self, record: &LogRecord) -> bool {
        if let Some(range) = &self.time_range {
            if !range.contains(&record.timestamp) {
                return false;
            }
        }
        self.protocols.allows(&record.protocol)
            && self.actions.allows(&record.action)
            && self.interfaces.allows(&record.interface)
            && self.source_ports.allows(&record.source_port)
            && self.destination_ports.allows(&record.destination_port)
            && self.port_classes.allows(&PortClass::of(record.destination_port))
            && self.source_ips.allows(&record.source_ip)
            && self.destination_ips.allows(&record.destination_ip)
    }

    fn is_unconstrained(&self) -> bool {
        FilterSpec::is_unconstrained(self)
    }
}

/// Textual record filters as they arrive from the command line or a query string.
///
/// Lists are comma-separated; `*` or `all` selects everything.
#[derive(Args, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LogFilterParams {
    /// Protocols to keep, e.g. tcp,udp
    #[arg(long)]
    pub protocols: Option<String>,
    /// Actions to keep, e.g. permit,deny
    #[arg(long)]
    pub actions: Option<String>,
    /// Ingress interfaces to keep
    #[arg(long)]
    pub interfaces: Option<String>,
    /// Source ports to keep
    #[arg(long)]
    pub src_ports: Option<String>,
    /// Destination ports to keep
    #[arg(long)]
    pub dst_ports: Option<String>,
    /// Destination port classes: well_known, registered, dynamic_private
    #[arg(long)]
    pub port_classes: Option<String>,
    /// Source addresses to keep
    #[arg(long)]
    pub src_ips: Option<String>,
    /// Destination addresses to keep
    #[arg(long)]
    pub dst_ips: Option<String>,
    /// Window start (RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Window end, inclusive
    #[arg(long)]
    pub end: Option<String>,
}

impl LogFilterParams {
    pub fn to_spec(&self) -> Result<FilterSpec, FilterError> {
        Ok(FilterSpec {
            time_range: TimeRange::from_bounds(self.start.as_deref(), self.end.as_deref())?,
            protocols: Selection::parse_opt(self.protocols.as_deref(), |s| Ok(Protocol::from(s)))?,
            actions: Selection::parse_opt(self.actions.as_deref(), |s| Ok(Action::from(s)))?,
            interfaces: Selection::parse_opt(self.interfaces.as_deref(), parse_text)?,
            source_ports: Selection::parse_opt(self.src_ports.as_deref(), parse_port)?,
            destination_ports: Selection::parse_opt(self.dst_ports.as_deref(), parse_port)?,
            port_classes: Selection::parse_opt(self.port_classes.as_deref(), |s| s.parse())?,
            source_ips: Selection::parse_opt(self.src_ips.as_deref(), parse_text)?,
            destination_ips: Selection::parse_opt(self.dst_ips.as_deref(), parse_text)?,
        })
    }
}
