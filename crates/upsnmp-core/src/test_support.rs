use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::catalog::{Metric, Mib};
use crate::config::{DeviceConfig, PollPolicy};
use crate::transport::{
    OidError, OidResult, RawValue, SnmpTarget, SnmpTransport, SnmpVersion, TransportError,
};

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub version: SnmpVersion,
    pub oids: Vec<String>,
    pub at: Instant,
}

// Versions the agent does not speak time out; unknown OIDs are NoSuchObject.
pub(crate) struct ScriptedAgent {
    versions: Mutex<Vec<SnmpVersion>>,
    values: Mutex<HashMap<String, RawValue>>,
    reachable: AtomicBool,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(versions: &[SnmpVersion]) -> Self {
        Self {
            versions: Mutex::new(versions.to_vec()),
            values: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let agent = Self::new(&[]);
        agent.set_reachable(false);
        agent
    }

    pub fn ups_mib(versions: &[SnmpVersion]) -> Self {
        let agent = Self::new(versions);
        agent.load_ups_mib();
        agent
    }

    pub fn apc(versions: &[SnmpVersion]) -> Self {
        let agent = Self::new(versions);
        agent.load_apc();
        agent
    }

    pub fn load_ups_mib(&self) {
        let text = |s: &str| RawValue::Text(s.to_string());
        for (metric, raw) in [
            (Metric::Manufacturer, text("Eaton")),
            (Metric::Model, text("5P 1500")),
            (Metric::Firmware, text("02.08.0010")),
            (Metric::BatteryStatus, RawValue::Integer(2)),
            (Metric::SecondsOnBattery, RawValue::Integer(0)),
            (Metric::RuntimeRemaining, RawValue::Integer(42)),
            (Metric::BatteryCharge, RawValue::Integer(100)),
            (Metric::BatteryVoltage, RawValue::Integer(545)),
            (Metric::InputFrequency, RawValue::Integer(500)),
            (Metric::InputVoltage, RawValue::Integer(230)),
            (Metric::OutputSource, RawValue::Integer(3)),
            (Metric::OutputFrequency, RawValue::Integer(500)),
            (Metric::AlarmsPresent, RawValue::Unsigned(0)),
        ] {
            self.set(Mib::UpsMib, metric, raw);
        }
    }

    pub fn load_apc(&self) {
        let text = |s: &str| RawValue::Text(s.to_string());
        for (metric, raw) in [
            (Metric::Model, text("Smart-UPS 1500")),
            (Metric::SerialNumber, text("AS1234567890")),
            (Metric::Firmware, text("UPS 09.3")),
            (Metric::BatteryStatus, RawValue::Integer(2)),
            (Metric::BatteryCharge, RawValue::Unsigned(98)),
            (Metric::RuntimeRemaining, RawValue::Timeticks(252_000)),
            (Metric::OutputSource, RawValue::Integer(2)),
            (Metric::InputVoltage, RawValue::Unsigned(231)),
            (Metric::OutputLoad, RawValue::Unsigned(27)),
        ] {
            self.set(Mib::Apc, metric, raw);
        }
    }

    pub fn set(&self, mib: Mib, metric: Metric, raw: RawValue) {
        let oid = mib.entry(metric).expect("metric in catalog").oid.to_string();
        self.values.lock().expect("values lock").insert(oid, raw);
    }

    pub fn remove(&self, mib: Mib, metric: Metric) {
        let oid = mib.entry(metric).expect("metric in catalog").oid;
        self.values.lock().expect("values lock").remove(oid);
    }

    pub fn clear(&self) {
        self.values.lock().expect("values lock").clear();
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock") = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnmpTransport for ScriptedAgent {
    async fn get(
        &self,
        _target: &SnmpTarget,
        version: SnmpVersion,
        oids: &[String],
    ) -> Result<Vec<OidResult>, TransportError> {
        self.calls.lock().expect("calls lock").push(Call {
            version,
            oids: oids.to_vec(),
            at: Instant::now(),
        });
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let latency = *self.latency.lock().expect("latency lock");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let speaks_version = self
            .versions
            .lock()
            .expect("versions lock")
            .contains(&version);
        if !self.reachable.load(Ordering::SeqCst) || !speaks_version {
            return Err(TransportError::Timeout);
        }

        let values = self.values.lock().expect("values lock");
        Ok(oids
            .iter()
            .map(|oid| match values.get(oid) {
                Some(raw) => OidResult::present(oid.clone(), raw.clone()),
                None => OidResult::absent(oid.clone(), Some(OidError::NoSuchObject)),
            })
            .collect())
    }
}

pub(crate) fn device(fast_interval_s: u64, slow_interval_s: u64) -> DeviceConfig {
    DeviceConfig {
        fast_interval_s,
        slow_interval_s,
        device_name: "Rack UPS".to_string(),
        ..DeviceConfig::new("10.0.0.5")
    }
}

pub(crate) fn policy(backoff_cap_exponent: u32) -> PollPolicy {
    PollPolicy {
        backoff_cap_exponent,
        ..PollPolicy::default()
    }
}
