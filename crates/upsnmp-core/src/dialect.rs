use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::Mib;
use crate::error::PollError;
use crate::transport::{SnmpTarget, SnmpTransport, SnmpVersion};

pub const PROBE_ORDER: [Dialect; 4] = [
    Dialect::new(SnmpVersion::V2c, Mib::UpsMib),
    Dialect::new(SnmpVersion::V2c, Mib::Apc),
    Dialect::new(SnmpVersion::V1, Mib::UpsMib),
    Dialect::new(SnmpVersion::V1, Mib::Apc),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dialect {
    pub version: SnmpVersion,
    pub mib: Mib,
}

impl Dialect {
    pub const fn new(version: SnmpVersion, mib: Mib) -> Self {
        Self { version, mib }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.version, self.mib)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialectState {
    Unknown,
    Probing,
    Confirmed {
        #[serde(flatten)]
        dialect: Dialect,
        confirmed_at: DateTime<Utc>,
    },
}

/// Finds the SNMP version and MIB a device answers, and keeps using it until
/// it stops answering for `miss_threshold` polls in a row.
#[derive(Debug)]
pub struct DialectDetector {
    state: DialectState,
    misses: u32,
    miss_threshold: u32,
}

impl DialectDetector {
    pub fn new(miss_threshold: u32) -> Self {
        Self {
            state: DialectState::Unknown,
            misses: 0,
            miss_threshold: miss_threshold.max(1),
        }
    }

    pub fn state(&self) -> &DialectState {
        &self.state
    }

    pub fn current(&self) -> Option<Dialect> {
        match self.state {
            DialectState::Confirmed { dialect, .. } => Some(dialect),
            _ => None,
        }
    }

    pub async fn resolve<T>(
        &mut self,
        transport: &T,
        target: &SnmpTarget,
    ) -> Result<Dialect, PollError>
    where
        T: SnmpTransport + ?Sized,
    {
        if let Some(dialect) = self.current() {
            return Ok(dialect);
        }

        self.state = DialectState::Probing;
        for candidate in PROBE_ORDER {
            if Self::probe(transport, target, candidate).await {
                info!(host = %target.host, dialect = %candidate, "snmp dialect confirmed");
                self.state = DialectState::Confirmed {
                    dialect: candidate,
                    confirmed_at: Utc::now(),
                };
                self.misses = 0;
                return Ok(candidate);
            }
        }

        warn!(host = %target.host, "no snmp dialect answered");
        self.state = DialectState::Unknown;
        Err(PollError::DialectExhausted)
    }

    async fn probe<T>(transport: &T, target: &SnmpTarget, candidate: Dialect) -> bool
    where
        T: SnmpTransport + ?Sized,
    {
        let oids = [candidate.mib.probe_oid().to_string()];
        match transport.get(target, candidate.version, &oids).await {
            Ok(results) => results.iter().any(|r| r.raw().is_some()),
            Err(err) => {
                debug!(host = %target.host, dialect = %candidate, %err, "probe failed");
                false
            }
        }
    }

    pub fn record_answer(&mut self) {
        self.misses = 0;
    }

    /// The confirmed dialect did not answer. Returns true when this miss
    /// dropped the confirmation.
    pub fn record_miss(&mut self) -> bool {
        let Some(dialect) = self.current() else {
            return false;
        };
        self.misses += 1;
        if self.misses < self.miss_threshold {
            debug!(dialect = %dialect, misses = self.misses, "confirmed dialect missed a poll");
            return false;
        }

        warn!(dialect = %dialect, misses = self.misses, "confirmed dialect stopped answering, will re-probe");
        self.state = DialectState::Unknown;
        self.misses = 0;
        true
    }
}
