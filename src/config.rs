use anyhow::{Context, Result};
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

// Matches the historical 1s dashboard poll cadence
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_BURST_THRESHOLD: usize = 120;
const DEFAULT_ALERT_CAPACITY: usize = 200;
const DEFAULT_OUI_LOOKUP_URL: &str = "https://api.macvendors.com/";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to capture on. `scan <iface>` overrides this.
    pub interface: Option<String>,
    pub db_path: String,
    pub oui_lookup_url: String,
    pub traffic_burst_threshold: usize,
    /// MAC addresses allowed to answer DHCP DISCOVER with an OFFER.
    pub trusted_dhcp_servers: Vec<String>,
    pub web: WebConfig,
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            db_path: "lanwatch.db".to_string(),
            oui_lookup_url: DEFAULT_OUI_LOOKUP_URL.to_string(),
            traffic_burst_threshold: DEFAULT_BURST_THRESHOLD,
            trusted_dhcp_servers: Vec::new(),
            web: WebConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    /// Oldest alert entries are evicted beyond this many.
    pub alert_capacity: usize,
    /// Skip a poll tick while the previous anomaly fetch is still in flight.
    pub skip_if_inflight: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            skip_if_inflight: true,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.web.host, self.web.port)
    }
}
