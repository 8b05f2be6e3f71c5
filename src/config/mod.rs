//! Configuration management for helm-hud

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::retry::ReconnectPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Signaling / peer session configuration
    #[serde(default)]
    pub signaling: SignalingConfig,

    /// Reconnect policy applied after a disconnect
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Vehicle computer HTTP API
    #[serde(default)]
    pub device: DeviceConfig,

    /// Solar irradiance lookups
    #[serde(default)]
    pub solar: SolarConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// WebSocket URL of the rendezvous server
    #[serde(default = "default_signaling_url")]
    pub url: String,

    /// Per-step negotiation deadline in milliseconds
    #[serde(default = "default_negotiation_timeout_ms")]
    pub negotiation_timeout_ms: u64,

    /// STUN/TURN server URLs
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the vehicle computer's HTTP API
    #[serde(default = "default_device_url")]
    pub base_url: String,

    /// Telemetry poll period in milliseconds (~2 Hz)
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,

    /// Detection poll period in milliseconds (~5 fps)
    #[serde(default = "default_detection_interval_ms")]
    pub detection_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarConfig {
    #[serde(default = "default_solar_enabled")]
    pub enabled: bool,

    /// Poll period in seconds
    #[serde(default = "default_solar_interval_secs")]
    pub interval_secs: u64,

    /// Forecast API endpoint
    #[serde(default = "default_solar_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: default_signaling_url(),
            negotiation_timeout_ms: default_negotiation_timeout_ms(),
            ice_servers: default_ice_servers(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: default_device_url(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
            detection_interval_ms: default_detection_interval_ms(),
        }
    }
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            enabled: default_solar_enabled(),
            interval_secs: default_solar_interval_secs(),
            endpoint: default_solar_endpoint(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        let signaling = url::Url::parse(&self.signaling.url)?;
        if signaling.scheme() != "ws" && signaling.scheme() != "wss" {
            return Err("Signaling URL must use ws:// or wss://".into());
        }

        if self.signaling.negotiation_timeout_ms == 0 {
            return Err("Negotiation timeout must be non-zero".into());
        }

        for server in &self.signaling.ice_servers {
            let lowered = server.to_ascii_lowercase();
            if !lowered.starts_with("stun:")
                && !lowered.starts_with("turn:")
                && !lowered.starts_with("turns:")
            {
                return Err("ICE servers must be stun:, turn: or turns: URLs".into());
            }
        }

        let device = url::Url::parse(&self.device.base_url)?;
        if device.scheme() != "http" && device.scheme() != "https" {
            return Err("Device base URL must use http:// or https://".into());
        }
        if self.device.base_url.ends_with('/') {
            return Err("Device base URL must not end with a slash".into());
        }

        if self.device.telemetry_interval_ms == 0 || self.device.detection_interval_ms == 0 {
            return Err("Poll intervals must be non-zero".into());
        }

        if self.solar.enabled {
            if self.solar.interval_secs == 0 {
                return Err("Solar interval must be non-zero".into());
            }
            url::Url::parse(&self.solar.endpoint)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_ws_signaling_url() {
        let mut cfg = Config::default();
        cfg.signaling.url = "http://rendezvous.local".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_ice_server() {
        let mut cfg = Config::default();
        cfg.signaling.ice_servers = vec!["udp:stun.example.org".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_trailing_slash_device_url() {
        let mut cfg = Config::default();
        cfg.device.base_url = "http://10.0.0.2:8080/".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            "[signaling]\nurl = \"wss://relay.example.org/hud\"\n\n[reconnect]\nstrategy = \"fixed\"\ndelay_ms = 2000\n",
        )
        .unwrap();
        assert_eq!(cfg.signaling.url, "wss://relay.example.org/hud");
        assert_eq!(cfg.signaling.negotiation_timeout_ms, 10_000);
        assert_eq!(cfg.device.telemetry_interval_ms, 500);
        assert!(cfg.validate().is_ok());
    }
}

fn default_signaling_url() -> String {
    "ws://192.168.92.121:8081/ws".to_string()
}

fn default_negotiation_timeout_ms() -> u64 {
    10_000
}

fn default_ice_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

fn default_device_url() -> String {
    "http://192.168.92.121:8080".to_string()
}

fn default_telemetry_interval_ms() -> u64 {
    500
}

fn default_detection_interval_ms() -> u64 {
    200
}

fn default_solar_enabled() -> bool {
    true
}

fn default_solar_interval_secs() -> u64 {
    60
}

fn default_solar_endpoint() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
