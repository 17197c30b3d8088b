use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error_handling::types::ConfigError;

/// Inclusive range of addresses, usually built from CIDR notation.
#[derive(Debug, PartialEq, Clone)]
pub struct IpRange {
    pub start: IpAddr,
    pub end: IpAddr,
}

impl IpRange {
    /// Parses `addr/prefix`. A bare address is a single-host range.
    pub fn from_cidr(cidr: &str) -> Result<Self, ConfigError> {
        let cidr = cidr.trim();
        let (addr, prefix) = match cidr.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|e| ConfigError::BadIPFormatting(format!("{}: {}", cidr, e)))?;
        let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(p) => p
                .parse::<u32>()
                .ok()
                .filter(|p| *p <= max_prefix)
                .ok_or_else(|| ConfigError::BadIPFormatting(format!("{}: bad prefix length", cidr)))?,
            None => max_prefix,
        };

        Ok(match addr {
            IpAddr::V4(v4) => {
                let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
                let start = u32::from(v4) & mask;
                IpRange {
                    start: IpAddr::V4(start.into()),
                    end: IpAddr::V4((start | !mask).into()),
                }
            }
            IpAddr::V6(v6) => {
                let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
                let start = u128::from(v6) & mask;
                IpRange {
                    start: IpAddr::V6(start.into()),
                    end: IpAddr::V6((start | !mask).into()),
                }
            }
        })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.start, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                self.start <= *ip && *ip <= self.end
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Elasticsearch-compatible HTTP endpoint
    Elasticsearch,
    /// Newline-delimited JSON file loaded in memory
    File,
}

/// Index field names used when building store queries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub source_ip: String,
    pub action: String,
    pub protocol: String,
    pub destination_port: String,
    pub source_port: String,
    pub timestamp: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            source_ip: "ipsrc.keyword".into(),
            action: "action.keyword".into(),
            protocol: "proto.keyword".into(),
            destination_port: "portdst".into(),
            source_port: "portsrc".into(),
            timestamp: "@timestamp".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub index: String,
    pub request_timeout_secs: u64,
    /// Source file for the `file` backend
    pub file_path: Option<PathBuf>,
    pub fields: FieldMapping,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Elasticsearch,
            url: "http://localhost:9200".into(),
            index: "application-logs".into(),
            request_timeout_secs: 30,
            file_path: None,
            fields: FieldMapping::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Source-IP groups requested per composite aggregation page
    pub aggregation_batch_size: usize,
    /// Hits requested per page when scanning a single source
    pub source_page_size: usize,
    /// Hits requested per scroll page during a bounded scan
    pub scroll_batch_size: usize,
    /// Scroll context lifetime between two fetches, in store time units
    pub scroll_keep_alive: String,
    /// Hard ceiling for a bounded scan
    pub max_scan_records: usize,
    pub default_scan_records: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            aggregation_batch_size: 1000,
            source_page_size: 10_000,
            scroll_batch_size: 5000,
            scroll_keep_alive: "2m".into(),
            max_scan_records: 700_000,
            default_scan_records: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime; 0 keeps entries for the whole process lifetime
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        match self.ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub port: u16,
    pub page_size: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8501,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// CIDR blocks considered local when ranking internal talkers
    pub local_networks: Vec<String>,
    /// Remote administration ports highlighted in the scan overview
    pub admin_ports: Vec<u16>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            local_networks: vec![
                "103.0.0.0/8".into(),
                "10.70.0.0/16".into(),
                "159.84.0.0/16".into(),
                "192.168.0.0/16".into(),
            ],
            admin_ports: vec![21, 22, 23, 3306, 3389],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_cidr_v4_bounds() {
        let range = IpRange::from_cidr("10.70.0.0/16").unwrap();
        assert_eq!(range.start, IpAddr::V4(Ipv4Addr::new(10, 70, 0, 0)));
        assert_eq!(range.end, IpAddr::V4(Ipv4Addr::new(10, 70, 255, 255)));
        assert!(range.contains(&"10.70.3.4".parse().unwrap()));
        assert!(!range.contains(&"10.71.0.0".parse().unwrap()));
    }

    #[test]
    fn test_cidr_normalizes_host_bits() {
        let range = IpRange::from_cidr("192.168.7.9/16").unwrap();
        assert_eq!(range.start, IpAddr::V4(Ipv4Addr::new(192, 168, 0, 0)));
    }

    #[test]
    fn test_cidr_single_host_and_zero_prefix() {
        let host = IpRange::from_cidr("8.8.8.8").unwrap();
        assert_eq!(host.start, host.end);
        let all = IpRange::from_cidr("0.0.0.0/0").unwrap();
        assert!(all.contains(&"255.255.255.255".parse().unwrap()));
        assert!(!all.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_v6() {
        let range = IpRange::from_cidr("2001:db8::/32").unwrap();
        assert!(range.contains(&IpAddr::V6("2001:db8:ffff::1".parse::<Ipv6Addr>().unwrap())));
        assert!(!range.contains(&"2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_rejects_garbage() {
        assert!(IpRange::from_cidr("10.0.0.0/33").is_err());
        assert!(IpRange::from_cidr("not-an-ip/8").is_err());
        assert!(IpRange::from_cidr("10.0.0.0/x").is_err());
    }

    #[test]
    fn test_cache_ttl_zero_means_unbounded() {
        let cache = CacheConfig { ttl_secs: 0, max_entries: 1 };
        assert_eq!(cache.ttl(), None);
        assert_eq!(CacheConfig::default().ttl(), Some(Duration::from_secs(300)));
    }
}
