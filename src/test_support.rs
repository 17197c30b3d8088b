//! Shared fixtures for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::records::{Action, IpAggregateRow, LogRecord, Protocol};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// One record, `minute` minutes after [`base_time`].
pub fn record_at(ip: &str, proto: &str, action: &str, dport: u16, minute: i64) -> LogRecord {
    LogRecord {
        source_ip: ip.into(),
        destination_ip: "10.0.0.1".into(),
        source_port: 40000 + (minute as u16 % 100),
        destination_port: dport,
        protocol: Protocol::from(proto),
        action: Action::from(action),
        timestamp: base_time() + Duration::minutes(minute),
        rule_id: format!("{}", 100 + minute % 3),
        interface: if minute % 2 == 0 { "outside".into() } else { "inside".into() },
    }
}

pub fn sample_records() -> Vec<LogRecord> {
    vec![
        record_at("10.70.1.1", "TCP", "PERMIT", 22, 0),
        record_at("10.70.1.1", "TCP", "PERMIT", 443, 1),
        record_at("10.70.1.1", "UDP", "PERMIT", 53, 2),
        record_at("8.8.8.8", "UDP", "PERMIT", 53, 3),
        record_at("8.8.8.8", "UDP", "PERMIT", 123, 4),
        record_at("8.8.8.8", "TCP", "DENY", 8080, 5),
        record_at("192.168.1.20", "TCP", "DENY", 50000, 6),
        record_at("192.168.1.20", "UDP", "DENY", 3389, 7),
        record_at("192.168.1.20", "ICMP", "PERMIT", 0, 8),
        record_at("103.4.5.6", "TCP", "PERMIT", 49152, 9),
        record_at("103.4.5.6", "TCP", "DENY", 22, 10),
        record_at("1.1.1.1", "TCP", "DENY", 23, 11),
    ]
}

/// Aggregate rows of [`sample_records`], in first-seen order.
pub fn sample_rows() -> Vec<IpAggregateRow> {
    let records = sample_records();
    let mut ips: Vec<&str> = Vec::new();
    for record in &records {
        if !ips.contains(&record.source_ip.as_str()) {
            ips.push(&record.source_ip);
        }
    }
    ips.iter()
        .map(|ip| IpAggregateRow::from_records(ip, &records))
        .collect()
}

/// `n` records spread over `sources` distinct source addresses with shuffled timestamps.
pub fn corpus(n: usize, sources: usize) -> Vec<LogRecord> {
    (0..n)
        .map(|i| {
            let s = i % sources.max(1);
            let ip = format!("10.{}.{}.{}", s / 65536 % 256, s / 256 % 256, s % 256);
            let proto = if i % 3 == 0 { "UDP" } else { "TCP" };
            let action = if i % 4 == 0 { "DENY" } else { "PERMIT" };
            let dport = [22u16, 443, 8080, 50000][i % 4];
            let mut record = record_at(&ip, proto, action, dport, 0);
            record.timestamp = base_time() + Duration::seconds(((i * 7919) % n.max(1)) as i64);
            record.source_port = 1024 + (i % 5000) as u16;
            record
        })
        .collect()
}
