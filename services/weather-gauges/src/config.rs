//! Configuration types for the gauge synchronization client

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::GaugeError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Where the weather station is reachable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl DeviceConfig {
    pub fn readings_url(&self) -> String {
        format!("{}/readings", self.base())
    }

    pub fn events_url(&self) -> String {
        format!("{}/events", self.base())
    }

    pub fn settime_url(&self, epoch: i64) -> String {
        format!("{}/settime?epoch={}", self.base(), epoch)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Live update channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Treat the stream as dead after this long without any bytes, keep-alive
    /// comments included. Zero disables the check.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout_seconds: default_idle_timeout(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl LiveConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }
}

/// Reconnection policy for the live update channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect automatically when the stream drops
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before the first reconnection attempt, unless the server sent `retry:`
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound for the delay between attempts
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Growth factor applied to the delay after each failed attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Maximum number of consecutive failed attempts (None for unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_retries: None,
        }
    }
}

/// Clock announcer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_clock_interval")]
    pub interval_seconds: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_clock_interval(),
        }
    }
}

/// Terminal status panel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_panel_interval")]
    pub interval_seconds: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_panel_interval(),
        }
    }
}

/// How snapshot and live updates are merged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Do not let a late snapshot response overwrite a field the live
    /// channel has already written
    #[serde(default)]
    pub snapshot_yields_to_live: bool,
}

fn default_base_url() -> String {
    "http://192.168.4.1".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_idle_timeout() -> u64 {
    120
}

fn default_initial_delay() -> u64 {
    3000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_clock_interval() -> u64 {
    60
}

fn default_panel_interval() -> u64 {
    5
}

impl Config {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let url = self.device.base_url.trim();
        if url.is_empty() {
            return Err(GaugeError::Config("device.base_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(GaugeError::Config(format!(
                "device.base_url must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.clock.enabled && self.clock.interval_seconds == 0 {
            return Err(GaugeError::Config(
                "clock.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.panel.enabled && self.panel.interval_seconds == 0 {
            return Err(GaugeError::Config(
                "panel.interval_seconds must be greater than zero".to_string(),
            ));
        }
        let reconnect = &self.live.reconnect;
        if reconnect.enabled && reconnect.initial_delay_ms == 0 {
            return Err(GaugeError::Config(
                "live.reconnect.initial_delay_ms must be greater than zero".to_string(),
            ));
        }
        if reconnect.enabled && reconnect.max_delay_ms < reconnect.initial_delay_ms {
            return Err(GaugeError::Config(format!(
                "live.reconnect.max_delay_ms ({}) is below initial_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.initial_delay_ms
            )));
        }
        let multiplier = self.live.reconnect.multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(GaugeError::Config(format!(
                "live.reconnect.multiplier must be at least 1.0, got {}",
                self.live.reconnect.multiplier
            )));
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GaugeError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
