use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Args;
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "FLOWLENS_CONFIG";

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file whose sections map onto the
/// fields below. Every section, and every key inside a section, is optional:
/// missing values fall back to the defaults of the section type.
///
/// # Examples
///
/// ```
/// use flowlens::configuration::config::Config;
///
/// let config = Config::from_toml_str("[store]\nindex = \"firewall\"\n").unwrap();
/// assert_eq!(config.store.index, "firewall");
/// assert_eq!(config.retrieval.aggregation_batch_size, 1000);
/// ```
///
/// # Fields Overview
///
/// - `store`: which backend to query and how its fields are named
/// - `retrieval`: page sizes, scroll keep-alive and the bounded scan ceiling
/// - `cache`: lifetime and size of the memoized query results
/// - `web`: bind address, port and default page size of the HTTP surface
/// - `analysis`: networks considered local when ranking internal talkers
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub web: WebConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Parses and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configuration source.
    ///
    /// An explicit path wins, then the file named by `FLOWLENS_CONFIG`, then
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(from_env) = std::env::var(CONFIG_ENV_VAR) {
            debug!("Using configuration file from {}", CONFIG_ENV_VAR);
            return Self::from_file(&PathBuf::from(from_env));
        }
        info!("No configuration file given, using defaults");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and formats that serde alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;
        for (name, value) in [
            ("retrieval.aggregation_batch_size", retrieval.aggregation_batch_size),
            ("retrieval.source_page_size", retrieval.source_page_size),
            ("retrieval.scroll_batch_size", retrieval.scroll_batch_size),
            ("retrieval.max_scan_records", retrieval.max_scan_records),
            ("cache.max_entries", self.cache.max_entries),
            ("web.page_size", self.web.page_size),
        ] {
            if value == 0 {
                return Err(ConfigError::NotInRange(format!("{} must be greater than 0", name)));
            }
        }
        if retrieval.default_scan_records > retrieval.max_scan_records {
            return Err(ConfigError::NotInRange(format!(
                "retrieval.default_scan_records ({}) exceeds retrieval.max_scan_records ({})",
                retrieval.default_scan_records, retrieval.max_scan_records
            )));
        }

        let keep_alive = Regex::new(r"^\d+(ms|s|m|h|d)$").map_err(|e| ConfigError::BadDuration(e.to_string()))?;
        if !keep_alive.is_match(&retrieval.scroll_keep_alive) {
            return Err(ConfigError::BadDuration(format!(
                "retrieval.scroll_keep_alive {:?} is not a store time unit such as \"2m\"",
                retrieval.scroll_keep_alive
            )));
        }

        if self.web.port == 0 {
            return Err(ConfigError::NotInRange("web.port must not be 0".into()));
        }
        self.bind_addr()?;
        self.local_networks()?;

        if self.store.backend == StoreBackend::File && self.store.file_path.is_none() {
            return Err(ConfigError::NotInRange(
                "store.file_path is required with the file backend".into(),
            ));
        }
        Ok(())
    }

    pub fn local_networks(&self) -> Result<Vec<IpRange>, ConfigError> {
        self.analysis
            .local_networks
            .iter()
            .map(|cidr| IpRange::from_cidr(cidr))
            .collect()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .web
            .bind_address
            .parse()
            .map_err(|e| ConfigError::BadIPFormatting(format!("web.bind_address: {}", e)))?;
        Ok(SocketAddr::new(ip, self.web.port))
    }
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Base URL of the log store
    #[arg(long, env = "FLOWLENS_STORE_URL")]
    pub store_url: Option<String>,

    /// Index holding the flow records
    #[arg(long, env = "FLOWLENS_INDEX")]
    pub index: Option<String>,
}

impl ConfigOverrides {
    /// Loads the configuration and applies the overrides on top of it.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(url) = &self.store_url {
            config.store.url = url.clone();
        }
        if let Some(index) = &self.index {
            config.store.index = index.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[store]
backend = "elasticsearch"
url = "http://search:9200"
index = "fw-logs"

[store.fields]
destination_port = "portdst.keyword"

[retrieval]
aggregation_batch_size = 250
scroll_keep_alive = "90s"

[cache]
ttl_secs = 0

[web]
port = 9000

[analysis]
local_networks = ["172.16.0.0/12"]
"#;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.index, "application-logs");
        assert_eq!(config.retrieval.source_page_size, 10_000);
        assert_eq!(config.retrieval.scroll_keep_alive, "2m");
        assert_eq!(config.local_networks().unwrap().len(), 4);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.store.url, "http://search:9200");
        assert_eq!(config.store.fields.destination_port, "portdst.keyword");
        assert_eq!(config.store.fields.source_ip, "ipsrc.keyword");
        assert_eq!(config.retrieval.aggregation_batch_size, 250);
        assert_eq!(config.retrieval.scroll_batch_size, 5000);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.bind_addr().unwrap().port(), 9000);
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = Config::from_toml_str("[retrieval]\nsource_page_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));
    }

    #[test]
    fn test_rejects_default_above_ceiling() {
        let raw = "[retrieval]\nmax_scan_records = 100\ndefault_scan_records = 500\n";
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn test_rejects_bad_keep_alive() {
        let raw = "[retrieval]\nscroll_keep_alive = \"two minutes\"\n";
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::BadDuration(_))));
    }

    #[test]
    fn test_rejects_bad_network() {
        let raw = "[analysis]\nlocal_networks = [\"10.0.0.0/40\"]\n";
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::BadIPFormatting(_))));
    }

    #[test]
    fn test_file_backend_requires_path() {
        let raw = "[store]\nbackend = \"file\"\n";
        assert!(Config::from_toml_str(raw).is_err());
        let raw = "[store]\nbackend = \"file\"\nfile_path = \"/tmp/logs.ndjson\"\n";
        assert!(Config::from_toml_str(raw).is_ok());
    }

    #[test]
    fn test_toml_syntax_error() {
        assert!(matches!(Config::from_toml_str("[store"), Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.index, "fw-logs");
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/flowlens.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_env_var() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = Config::load(None);
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(config.unwrap().store.index, "fw-logs");
    }

    #[test]
    #[serial]
    fn test_overrides_win_over_file() {
        std::env::remove_var(CONFIG_ENV_VAR);
        let overrides = ConfigOverrides {
            config: None,
            store_url: Some("http://other:9200".into()),
            index: Some("fw-2024".into()),
        };
        let config = overrides.resolve().unwrap();
        assert_eq!(config.store.url, "http://other:9200");
        assert_eq!(config.store.index, "fw-2024");
    }
}
