use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Cadence;
use crate::error::ConfigError;
use crate::transport::SnmpTarget;

pub const DEFAULT_PORT: u16 = 161;
pub const DEFAULT_COMMUNITY: &str = "public";
pub const DEFAULT_DEVICE_NAME: &str = "UPS";
pub const DEFAULT_FAST_INTERVAL_S: u64 = 10;
pub const DEFAULT_SLOW_INTERVAL_S: u64 = 300;

const MIN_FAST_INTERVAL_S: u64 = 1;
const MIN_SLOW_INTERVAL_S: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_fast_interval")]
    pub fast_interval_s: u64,
    #[serde(default = "default_slow_interval")]
    pub slow_interval_s: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_fast_interval() -> u64 {
    DEFAULT_FAST_INTERVAL_S
}

fn default_slow_interval() -> u64 {
    DEFAULT_SLOW_INTERVAL_S
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            community: default_community(),
            device_name: default_device_name(),
            fast_interval_s: DEFAULT_FAST_INTERVAL_S,
            slow_interval_s: DEFAULT_SLOW_INTERVAL_S,
        }
    }

    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.host = self.host.trim().to_string();
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.community.is_empty() {
            return Err(ConfigError::EmptyCommunity);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        self.fast_interval_s = self.fast_interval_s.max(MIN_FAST_INTERVAL_S);
        self.slow_interval_s = self.slow_interval_s.max(MIN_SLOW_INTERVAL_S);
        Ok(self)
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_secs(self.fast_interval_s)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_secs(self.slow_interval_s)
    }

    pub fn interval(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Fast => self.fast_interval(),
            Cadence::Slow => self.slow_interval(),
        }
    }

    pub fn target(&self) -> SnmpTarget {
        SnmpTarget {
            host: self.host.clone(),
            port: self.port,
            community: self.community.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub entry_id: String,
    #[serde(flatten)]
    pub device: DeviceConfig,
}

pub fn parse_entries(json: &str) -> Result<Vec<DeviceEntry>, ConfigError> {
    serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub request_timeout: Duration,
    pub backoff_cap_exponent: u32,
    pub unavailable_after: u32,
    pub dialect_miss_threshold: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            backoff_cap_exponent: 3,
            unavailable_after: 3,
            dialect_miss_threshold: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_fill_in_defaults() {
        // Arrange
        let json = r#"[
            {"entry_id": "rack-a", "host": "10.0.0.5"},
            {"entry_id": "rack-b", "host": "10.0.0.6", "community": "private", "fast_interval_s": 5}
        ]"#;

        // Act
        let entries = parse_entries(json).expect("parse entries");

        // Assert
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].device, DeviceConfig::new("10.0.0.5"));
        assert_eq!(entries[1].device.community, "private");
        assert_eq!(entries[1].device.fast_interval_s, 5);
        assert_eq!(entries[1].device.slow_interval_s, DEFAULT_SLOW_INTERVAL_S);
    }

    #[test]
    fn validate_clamps_intervals() {
        let mut config = DeviceConfig::new("ups.local");
        config.fast_interval_s = 0;
        config.slow_interval_s = 3;

        let config = config.validate().expect("valid config");

        assert_eq!(config.fast_interval(), Duration::from_secs(1));
        assert_eq!(config.slow_interval(), Duration::from_secs(10));
    }

    #[test]
    fn validate_rejects_blank_host() {
        let err = DeviceConfig::new("   ").validate().expect_err("blank host");
        assert_eq!(err, ConfigError::EmptyHost);
    }

    #[test]
    fn malformed_entries_are_reported() {
        let err = parse_entries(r#"[{"entry_id": "x"}]"#).expect_err("missing host");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
