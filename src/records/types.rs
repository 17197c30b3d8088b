use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::field_serde;
use crate::error_handling::types::FilterError;

/// Transport protocol as recorded by the firewall.
///
/// Known names are matched without regard to case. The Elasticsearch
/// aggregation folds case the same way, so both backends count `tcp` as TCP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    TCP,
    UDP,
    ICMP,
    Other(String),
}

impl From<&str> for Protocol {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TCP" => Protocol::TCP,
            "UDP" => Protocol::UDP,
            "ICMP" => Protocol::ICMP,
            _ => Protocol::Other(raw.trim().to_string()),
        }
    }
}

impl From<String> for Protocol {
    fn from(raw: String) -> Self {
        Protocol::from(raw.as_str())
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::TCP => write!(f, "TCP"),
            Protocol::UDP => write!(f, "UDP"),
            Protocol::ICMP => write!(f, "ICMP"),
            Protocol::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Firewall decision attached to a flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Permit,
    Deny,
    Other(String),
}

impl From<&str> for Action {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PERMIT" => Action::Permit,
            "DENY" => Action::Deny,
            _ => Action::Other(raw.trim().to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        Action::from(raw.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Permit => write!(f, "PERMIT"),
            Action::Deny => write!(f, "DENY"),
            Action::Other(name) => write!(f, "{}", name),
        }
    }
}

/// IANA port-number ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortClass {
    /// 0-1023
    WellKnown,
    /// 1024-49151
    Registered,
    /// 49152-65535
    DynamicPrivate,
}

impl PortClass {
    pub const ALL: [PortClass; 3] = [
        PortClass::WellKnown,
        PortClass::Registered,
        PortClass::DynamicPrivate,
    ];

    pub fn of(port: u16) -> Self {
        match port {
            0..=1023 => PortClass::WellKnown,
            1024..=49151 => PortClass::Registered,
            _ => PortClass::DynamicPrivate,
        }
    }

    /// Inclusive bounds of the class.
    pub fn bounds(self) -> (u16, u16) {
        match self {
            PortClass::WellKnown => (0, 1023),
            PortClass::Registered => (1024, 49151),
            PortClass::DynamicPrivate => (49152, 65535),
        }
    }

    pub fn contains(self, port: u16) -> bool {
        PortClass::of(port) == self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortClass::WellKnown => "well_known",
            PortClass::Registered => "registered",
            PortClass::DynamicPrivate => "dynamic_private",
        }
    }
}

impl FromStr for PortClass {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "well_known" | "wellknown" => Ok(PortClass::WellKnown),
            "registered" => Ok(PortClass::Registered),
            "dynamic_private" | "dynamic" | "private" => Ok(PortClass::DynamicPrivate),
            other => Err(FilterError::BadValue(format!("unknown port class {:?}", other))),
        }
    }
}

impl fmt::Display for PortClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = self.bounds();
        write!(f, "{} ({}-{})", self.as_str(), low, high)
    }
}

/// One firewall/network-flow event as materialized from the log index.
///
/// Field names on the wire follow the index mapping (`ipsrc`, `portdst`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "ipsrc")]
    pub source_ip: String,
    #[serde(rename = "ipdst")]
    pub destination_ip: String,
    #[serde(rename = "portsrc", with = "field_serde::port")]
    pub source_port: u16,
    #[serde(rename = "portdst", with = "field_serde::port")]
    pub destination_port: u16,
    #[serde(rename = "proto")]
    pub protocol: Protocol,
    pub action: Action,
    #[serde(with = "field_serde::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "idregle", with = "field_serde::text", default)]
    pub rule_id: String,
    #[serde(rename = "interfaceint", default)]
    pub interface: String,
}

/// Store field names requested for every record.
pub const RECORD_FIELDS: [&str; 9] = [
    "interfaceint",
    "idregle",
    "ipsrc",
    "ipdst",
    "timestamp",
    "action",
    "proto",
    "portdst",
    "portsrc",
];

/// Numeric columns of an [`IpAggregateRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateMetric {
    Count,
    Permit,
    Deny,
    PermitTcp,
    PermitUdp,
    DistinctDstPorts,
    DistinctSrcPorts,
    DstWellKnown,
    DstRegistered,
    DstDynamicPrivate,
}

impl AggregateMetric {
    pub const ALL: [AggregateMetric; 10] = [
        AggregateMetric::Count,
        AggregateMetric::Permit,
        AggregateMetric::Deny,
        AggregateMetric::PermitTcp,
        AggregateMetric::PermitUdp,
        AggregateMetric::DistinctDstPorts,
        AggregateMetric::DistinctSrcPorts,
        AggregateMetric::DstWellKnown,
        AggregateMetric::DstRegistered,
        AggregateMetric::DstDynamicPrivate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AggregateMetric::Count => "count",
            AggregateMetric::Permit => "permit",
            AggregateMetric::Deny => "deny",
            AggregateMetric::PermitTcp => "permit_tcp",
            AggregateMetric::PermitUdp => "permit_udp",
            AggregateMetric::DistinctDstPorts => "distinct_dst_ports",
            AggregateMetric::DistinctSrcPorts => "distinct_src_ports",
            AggregateMetric::DstWellKnown => "dst_well_known",
            AggregateMetric::DstRegistered => "dst_registered",
            AggregateMetric::DstDynamicPrivate => "dst_dynamic_private",
        }
    }
}

impl FromStr for AggregateMetric {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AggregateMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| FilterError::BadValue(format!("unknown metric {:?}", s)))
    }
}

/// Per-source-IP summary derived from the flow log.
///
/// Never persisted: recomputed from the store on each request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAggregateRow {
    pub source_ip: String,
    pub count: u64,
    pub permit: u64,
    pub deny: u64,
    pub permit_tcp: u64,
    pub permit_udp: u64,
    pub distinct_dst_ports: u64,
    pub distinct_src_ports: u64,
    pub dst_well_known: u64,
    pub dst_registered: u64,
    pub dst_dynamic_private: u64,
}

impl IpAggregateRow {
    pub fn new<S: Into<String>>(source_ip: S) -> Self {
        Self {
            source_ip: source_ip.into(),
            ..Default::default()
        }
    }

    /// Folds the records of a single source into its summary row.
    ///
    /// Records whose source IP differs from `source_ip` are ignored.
    pub fn from_records<'a, I>(source_ip: &str, records: I) -> Self
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut row = IpAggregateRow::new(source_ip);
        let mut dst_ports = std::collections::HashSet::new();
        let mut src_ports = std::collections::HashSet::new();
        for record in records.into_iter().filter(|r| r.source_ip == source_ip) {
            row.count += 1;
            match record.action {
                Action::Permit => {
                    row.permit += 1;
                    match record.protocol {
                        Protocol::TCP => row.permit_tcp += 1,
                        Protocol::UDP => row.permit_udp += 1,
                        _ => {}
                    }
                }
                Action::Deny => row.deny += 1,
                Action::Other(_) => {}
            }
            match PortClass::of(record.destination_port) {
                PortClass::WellKnown => row.dst_well_known += 1,
                PortClass::Registered => row.dst_registered += 1,
                PortClass::DynamicPrivate => row.dst_dynamic_private += 1,
            }
            dst_ports.insert(record.destination_port);
            src_ports.insert(record.source_port);
        }
        row.distinct_dst_ports = dst_ports.len() as u64;
        row.distinct_src_ports = src_ports.len() as u64;
        row
    }

    /// Checks the counting invariants every well-formed row satisfies.
    pub fn is_consistent(&self) -> bool {
        self.permit <= self.count
            && self.deny <= self.count
            && self.permit_tcp + self.permit_udp <= self.permit
    }

    pub fn metric(&self, metric: AggregateMetric) -> u64 {
        match metric {
            AggregateMetric::Count => self.count,
            AggregateMetric::Permit => self.permit,
            AggregateMetric::Deny => self.deny,
            AggregateMetric::PermitTcp => self.permit_tcp,
            AggregateMetric::PermitUdp => self.permit_udp,
            AggregateMetric::DistinctDstPorts => self.distinct_dst_ports,
            AggregateMetric::DistinctSrcPorts => self.distinct_src_ports,
            AggregateMetric::DstWellKnown => self.dst_well_known,
            AggregateMetric::DstRegistered => self.dst_registered,
            AggregateMetric::DstDynamicPrivate => self.dst_dynamic_private,
        }
    }

    /// Permitted events for one protocol. Anything outside TCP/UDP shares the remainder.
    pub fn permits_for(&self, protocol: &Protocol) -> u64 {
        match protocol {
            Protocol::TCP => self.permit_tcp,
            Protocol::UDP => self.permit_udp,
            _ => self.permit.saturating_sub(self.permit_tcp + self.permit_udp),
        }
    }

    pub fn dst_events_in(&self, class: PortClass) -> u64 {
        match class {
            PortClass::WellKnown => self.dst_well_known,
            PortClass::Registered => self.dst_registered,
            PortClass::DynamicPrivate => self.dst_dynamic_private,
        }
    }
}
