//! Derived views over already filtered tables.
//!
//! Everything here is computed in memory and never touches the store.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::configuration::types::IpRange;
use crate::records::{Action, AggregateMetric, IpAggregateRow, LogRecord, PortClass};

/// Sums over a set of aggregate rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub sources: usize,
    pub flows: u64,
    pub permits: u64,
    pub denies: u64,
}

impl Totals {
    pub fn of(rows: &[IpAggregateRow]) -> Self {
        rows.iter().fold(
            Totals {
                sources: rows.len(),
                ..Default::default()
            },
            |acc, row| Totals {
                flows: acc.flows + row.count,
                permits: acc.permits + row.permit,
                denies: acc.denies + row.deny,
                ..acc
            },
        )
    }
}

/// The `n` largest rows by `metric`. Ties keep their input order.
pub fn top_sources(rows: &[IpAggregateRow], metric: AggregateMetric, n: usize) -> Vec<IpAggregateRow> {
    let mut ranked: Vec<&IpAggregateRow> = rows.iter().collect();
    ranked.sort_by_key(|row| Reverse(row.metric(metric)));
    ranked.into_iter().take(n).cloned().collect()
}

/// Rows whose source lies in any of `networks`, most permits first.
pub fn rows_in_networks(rows: &[IpAggregateRow], networks: &[IpRange]) -> Vec<IpAggregateRow> {
    let mut local: Vec<IpAggregateRow> = rows
        .iter()
        .filter(|row| {
            row.source_ip
                .parse::<IpAddr>()
                .map(|ip| networks.iter().any(|net| net.contains(&ip)))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    local.sort_by_key(|row| Reverse(row.permit));
    local
}

/// Headline numbers for the records of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source_ip: String,
    pub total: usize,
    pub permits: usize,
    pub denies: usize,
    pub distinct_rules: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl SourceSummary {
    pub fn of(source_ip: &str, records: &[LogRecord]) -> Self {
        let rules: HashSet<&str> = records.iter().map(|r| r.rule_id.as_str()).collect();
        Self {
            source_ip: source_ip.to_string(),
            total: records.len(),
            permits: records.iter().filter(|r| r.action == Action::Permit).count(),
            denies: records.iter().filter(|r| r.action == Action::Deny).count(),
            distinct_rules: rules.len(),
            first_seen: records.iter().map(|r| r.timestamp).min(),
            last_seen: records.iter().map(|r| r.timestamp).max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub day: NaiveDate,
    pub permits: u64,
    pub denies: u64,
}

/// Permit and deny counts per UTC calendar day, oldest first.
pub fn daily_activity(records: &[LogRecord]) -> Vec<DailyActivity> {
    let mut days: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for record in records {
        let counts = days.entry(record.timestamp.date_naive()).or_default();
        match record.action {
            Action::Permit => counts.0 += 1,
            Action::Deny => counts.1 += 1,
            Action::Other(_) => {}
        }
    }
    days.into_iter()
        .map(|(day, (permits, denies))| DailyActivity { day, permits, denies })
        .collect()
}

/// Which end of a flow a view looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCount {
    pub port: u16,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

fn ranked<K: Eq + Hash + Ord + Clone>(counts: HashMap<K, u64>, n: usize) -> Vec<(K, u64)> {
    let mut ranked: Vec<(K, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

fn count_by<'a, K, I, F>(records: I, key: F) -> HashMap<K, u64>
where
    K: Eq + Hash,
    I: IntoIterator<Item = &'a LogRecord>,
    F: Fn(&'a LogRecord) -> K,
{
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(key(record)).or_insert(0) += 1;
    }
    counts
}

/// Most frequent ports on one side. Ties go to the lower port.
pub fn top_ports<'a, I>(records: I, side: Side, n: usize) -> Vec<PortCount>
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let counts = count_by(records, |r| match side {
        Side::Source => r.source_port,
        Side::Destination => r.destination_port,
    });
    ranked(counts, n)
        .into_iter()
        .map(|(port, count)| PortCount { port, count })
        .collect()
}

/// Most frequent addresses on one side. Ties go to the lower address text.
pub fn top_addresses<'a, I>(records: I, side: Side, n: usize) -> Vec<ValueCount>
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let counts = count_by(records, |r| match side {
        Side::Source => r.source_ip.as_str(),
        Side::Destination => r.destination_ip.as_str(),
    });
    ranked(counts, n)
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect()
}

/// Event count per protocol, most frequent first.
pub fn protocol_breakdown<'a, I>(records: I) -> Vec<ValueCount>
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let counts = count_by(records, |r| r.protocol.to_string());
    ranked(counts, usize::MAX)
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect()
}

/// Overview of a scanned table, as shown on the exploration page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogOverview {
    pub records: usize,
    pub permits: usize,
    pub denies: usize,
    pub protocols: Vec<ValueCount>,
    pub permitted_protocols: Vec<ValueCount>,
    pub denied_protocols: Vec<ValueCount>,
    pub top_destination_ips: Vec<ValueCount>,
    pub top_source_ips: Vec<ValueCount>,
    pub top_permitted_dst_ports: Vec<PortCount>,
    pub top_denied_dst_ports: Vec<PortCount>,
    pub admin_permitted_sources: Vec<ValueCount>,
    pub admin_destinations: Vec<ValueCount>,
}

impl LogOverview {
    pub fn build(records: &[LogRecord], admin_ports: &[u16], n: usize) -> Self {
        let permitted: Vec<&LogRecord> = records.iter().filter(|r| r.action == Action::Permit).collect();
        let denied: Vec<&LogRecord> = records.iter().filter(|r| r.action == Action::Deny).collect();
        let admin: Vec<&LogRecord> = records
            .iter()
            .filter(|r| admin_ports.contains(&r.destination_port))
            .collect();

        Self {
            records: records.len(),
            permits: permitted.len(),
            denies: denied.len(),
            protocols: protocol_breakdown(records),
            permitted_protocols: protocol_breakdown(permitted.iter().copied()),
            denied_protocols: protocol_breakdown(denied.iter().copied()),
            top_destination_ips: top_addresses(records, Side::Destination, n),
            top_source_ips: top_addresses(records, Side::Source, n),
            top_permitted_dst_ports: top_ports(permitted.iter().copied(), Side::Destination, n),
            top_denied_dst_ports: top_ports(denied.iter().copied(), Side::Destination, n),
            admin_permitted_sources: top_addresses(
                admin.iter().copied().filter(|r| r.action == Action::Permit),
                Side::Source,
                n,
            ),
            admin_destinations: top_addresses(admin.iter().copied(), Side::Destination, n),
        }
    }
}

/// Orders addresses numerically; text that is not an address goes last, lexically.
pub fn sort_ips<I: IntoIterator<Item = String>>(ips: I) -> Vec<String> {
    let mut parsed: Vec<(IpAddr, String)> = Vec::new();
    let mut other: Vec<String> = Vec::new();
    for ip in ips {
        match ip.parse::<IpAddr>() {
            Ok(addr) => parsed.push((addr, ip)),
            Err(_) => other.push(ip),
        }
    }
    parsed.sort();
    other.sort();
    parsed.into_iter().map(|(_, ip)| ip).chain(other).collect()
}

/// Distinct values offered per filter dimension for a scanned table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub protocols: Vec<String>,
    pub actions: Vec<String>,
    pub interfaces: Vec<String>,
    pub source_ports: Vec<u16>,
    pub destination_ports: Vec<u16>,
    pub port_classes: Vec<PortClass>,
    pub source_ips: Vec<String>,
    pub destination_ips: Vec<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl FilterOptions {
    pub fn from_records(records: &[LogRecord]) -> Self {
        let protocols: BTreeSet<String> = records.iter().map(|r| r.protocol.to_string()).collect();
        let actions: BTreeSet<String> = records.iter().map(|r| r.action.to_string()).collect();
        let interfaces: BTreeSet<String> = records
            .iter()
            .map(|r| r.interface.clone())
            .filter(|i| !i.is_empty())
            .collect();
        let source_ports: BTreeSet<u16> = records.iter().map(|r| r.source_port).collect();
        let destination_ports: BTreeSet<u16> = records.iter().map(|r| r.destination_port).collect();
        let port_classes: BTreeSet<PortClass> =
            records.iter().map(|r| PortClass::of(r.destination_port)).collect();
        let source_ips: HashSet<String> = records.iter().map(|r| r.source_ip.clone()).collect();
        let destination_ips: HashSet<String> = records.iter().map(|r| r.destination_ip.clone()).collect();

        Self {
            protocols: protocols.into_iter().collect(),
            actions: actions.into_iter().collect(),
            interfaces: interfaces.into_iter().collect(),
            source_ports: source_ports.into_iter().collect(),
            destination_ports: destination_ports.into_iter().collect(),
            port_classes: port_classes.into_iter().collect(),
            source_ips: sort_ips(source_ips),
            destination_ips: sort_ips(destination_ips),
            first_seen: records.iter().map(|r| r.timestamp).min(),
            last_seen: records.iter().map(|r| r.timestamp).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_time, record_at, sample_records, sample_rows};
    use chrono::Duration;

    #[test]
    fn test_totals() {
        let totals = Totals::of(&sample_rows());
        assert_eq!(totals.sources, 5);
        assert_eq!(totals.flows, 12);
        assert_eq!(totals.permits, 7);
        assert_eq!(totals.denies, 5);
        assert_eq!(Totals::of(&[]), Totals::default());
    }

    #[test]
    fn test_top_sources_keeps_tie_order() {
        let rows = sample_rows();
        let top = top_sources(&rows, AggregateMetric::Count, 3);
        let ips: Vec<_> = top.iter().map(|r| r.source_ip.as_str()).collect();
        assert_eq!(ips, vec!["10.70.1.1", "8.8.8.8", "192.168.1.20"]);
        assert_eq!(top_sources(&rows, AggregateMetric::Deny, 1)[0].source_ip, "192.168.1.20");
        assert_eq!(top_sources(&rows, AggregateMetric::Count, 50).len(), 5);
    }

    #[test]
    fn test_rows_in_networks() {
        let networks: Vec<IpRange> = ["103.0.0.0/8", "10.70.0.0/16", "192.168.0.0/16"]
            .iter()
            .map(|c| IpRange::from_cidr(c).unwrap())
            .collect();
        let local = rows_in_networks(&sample_rows(), &networks);
        let ips: Vec<_> = local.iter().map(|r| r.source_ip.as_str()).collect();
        assert_eq!(ips, vec!["10.70.1.1", "192.168.1.20", "103.4.5.6"]);
    }

    #[test]
    fn test_source_summary() {
        let records: Vec<_> = sample_records()
            .into_iter()
            .filter(|r| r.source_ip == "8.8.8.8")
            .collect();
        let summary = SourceSummary::of("8.8.8.8", &records);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.permits, 2);
        assert_eq!(summary.denies, 1);
        assert_eq!(summary.distinct_rules, 3);
        assert_eq!(summary.first_seen, Some(base_time() + Duration::minutes(3)));
        assert_eq!(summary.last_seen, Some(base_time() + Duration::minutes(5)));
        assert_eq!(SourceSummary::of("x", &[]).first_seen, None);
    }

    #[test]
    fn test_daily_activity_is_ascending() {
        let mut records = sample_records();
        records.insert(0, record_at("1.1.1.1", "TCP", "PERMIT", 80, 60 * 24 + 5));
        let days = daily_activity(&records);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, base_time().date_naive());
        assert_eq!((days[0].permits, days[0].denies), (7, 5));
        assert_eq!((days[1].permits, days[1].denies), (1, 0));
    }

    #[test]
    fn test_top_ports_tie_goes_to_lower_port() {
        let top = top_ports(&sample_records(), Side::Destination, 3);
        assert_eq!(top[0], PortCount { port: 22, count: 2 });
        assert_eq!(top[1], PortCount { port: 53, count: 2 });
        assert_eq!(top[2], PortCount { port: 0, count: 1 });
    }

    #[test]
    fn test_protocol_breakdown() {
        let protocols = protocol_breakdown(&sample_records());
        assert_eq!(protocols[0], ValueCount { value: "TCP".into(), count: 7 });
        assert_eq!(protocols[1], ValueCount { value: "UDP".into(), count: 4 });
        assert_eq!(protocols[2], ValueCount { value: "ICMP".into(), count: 1 });
    }

    #[test]
    fn test_overview_admin_ports() {
        let overview = LogOverview::build(&sample_records(), &[22, 23, 3389], 5);
        assert_eq!(overview.records, 12);
        assert_eq!(overview.permits, 7);
        let admin_sources: Vec<_> = overview.admin_permitted_sources.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(admin_sources, vec!["10.70.1.1"]);
        assert_eq!(overview.admin_destinations, vec![ValueCount { value: "10.0.0.1".into(), count: 4 }]);
        assert_eq!(overview.top_denied_dst_ports.len(), 5);
    }

    #[test]
    fn test_sort_ips_puts_garbage_last() {
        let sorted = sort_ips(vec![
            "10.0.0.2".to_string(),
            "unknown".to_string(),
            "9.255.0.1".to_string(),
            "::1".to_string(),
            "10.0.0.10".to_string(),
            "-".to_string(),
        ]);
        assert_eq!(sorted, vec!["9.255.0.1", "10.0.0.2", "10.0.0.10", "::1", "-", "unknown"]);
    }

    #[test]
    fn test_filter_options() {
        let options = FilterOptions::from_records(&sample_records());
        assert_eq!(options.protocols, vec!["ICMP", "TCP", "UDP"]);
        assert_eq!(options.actions, vec!["DENY", "PERMIT"]);
        assert_eq!(options.interfaces, vec!["inside", "outside"]);
        assert_eq!(options.port_classes, PortClass::ALL.to_vec());
        assert_eq!(options.source_ips.first().map(String::as_str), Some("1.1.1.1"));
        assert_eq!(options.source_ips.last().map(String::as_str), Some("192.168.1.20"));
        assert_eq!(options.destination_ips, vec!["10.0.0.1"]);
    }
}
