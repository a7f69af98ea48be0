use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Cadence, Metric, Mib};
use crate::dialect::DialectState;
use crate::state::{MetricReading, NormalizedState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    Pending,
    Available(Snapshot),
    Unavailable {
        reason: String,
        since: DateTime<Utc>,
    },
}

impl DeviceStatus {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            DeviceStatus::Available(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, DeviceStatus::Available(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub ts: DateTime<Utc>,
    pub entry_id: String,
    pub device: SnapshotDevice,
    pub dialect: DialectState,
    pub metrics: BTreeMap<Metric, MetricReading>,
    pub quality: SnapshotQuality,
}

impl Snapshot {
    pub fn metric(&self, metric: Metric) -> Option<&MetricReading> {
        self.metrics.get(&metric)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDevice {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub metadata: DeviceMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware: Option<String>,
}

impl DeviceMetadata {
    pub fn update(&mut self, state: &NormalizedState, mib: Mib) {
        let text = |metric: Metric| {
            state
                .value(metric)
                .and_then(|value| value.as_text())
                .map(str::to_string)
        };

        let manufacturer = text(Metric::Manufacturer)
            .or_else(|| (mib == Mib::Apc).then(|| "APC".to_string()));
        if manufacturer.is_some() {
            self.manufacturer = manufacturer;
        }
        if let Some(model) = text(Metric::Model) {
            self.model = Some(model);
        }
        if let Some(serial) = text(Metric::SerialNumber) {
            self.serial_number = Some(serial);
        }
        if let Some(firmware) = text(Metric::Firmware) {
            self.firmware = Some(firmware);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotQuality {
    pub cadence: Cadence,
    pub poll_ms: u128,
    pub lock_wait_ms: u128,
    pub polls_ok: u64,
    pub polls_err: u64,
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::state::MetricValue;

    fn text(value: &str) -> MetricValue {
        MetricValue::Text {
            value: value.to_string(),
        }
    }

    #[test]
    fn apc_manufacturer_defaults_to_apc() {
        // Arrange
        let mut state = NormalizedState::new();
        state.merge(Cadence::Slow, vec![(Metric::Model, text("Smart-UPS 750"))], Utc::now());
        let mut metadata = DeviceMetadata::default();

        // Act
        metadata.update(&state, Mib::Apc);

        // Assert
        assert_eq!(metadata.manufacturer.as_deref(), Some("APC"));
        assert_eq!(metadata.model.as_deref(), Some("Smart-UPS 750"));
    }

    #[test]
    fn metadata_survives_polls_without_it() {
        let mut state = NormalizedState::new();
        state.merge(Cadence::Slow, vec![(Metric::Firmware, text("2.1"))], Utc::now());
        let mut metadata = DeviceMetadata::default();
        metadata.update(&state, Mib::UpsMib);

        metadata.update(&NormalizedState::new(), Mib::UpsMib);

        assert_eq!(metadata.firmware.as_deref(), Some("2.1"));
        assert_eq!(metadata.manufacturer, None);
    }
}
