pub mod backoff;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dialect;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use backoff::BackoffState;
pub use catalog::{Cadence, Metric, Mib, Unit};
pub use config::{parse_entries, DeviceConfig, DeviceEntry, PollPolicy};
pub use coordinator::Coordinator;
pub use dialect::{Dialect, DialectDetector, DialectState};
pub use error::{ConfigError, PollError, RegistryError};
pub use registry::Registry;
pub use snapshot::{DeviceMetadata, DeviceStatus, Snapshot, SnapshotDevice, SnapshotQuality};
pub use state::{MetricReading, MetricValue, NormalizedState, Provenance};
pub use transport::{
    OidError, OidResult, OidValue, RawValue, Snmp2Transport, SnmpTarget, SnmpTransport,
    SnmpVersion, TransportError,
};
