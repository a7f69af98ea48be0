use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PollError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("no SNMP version/MIB combination answered")]
    DialectExhausted,
    #[error("no usable SNMP data returned")]
    NoUsableMetrics,
    #[error("backoff active for {:.1}s", .remaining.as_secs_f64())]
    BackoffActive { remaining: Duration },
    #[error("poll lock still held after {:.1}s", .waited.as_secs_f64())]
    LockTimeout { waited: Duration },
}

impl PollError {
    /// Skipped ticks are not device failures and leave the backoff untouched.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PollError::BackoffActive { .. } | PollError::LockTimeout { .. }
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("community must not be empty")]
    EmptyCommunity,
    #[error("port must not be zero")]
    ZeroPort,
    #[error("invalid device list: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("entry {0} is already registered")]
    DuplicateEntry(String),
    #[error("entry {0} is not registered")]
    UnknownEntry(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("device not ready: {0}")]
    NotReady(#[from] PollError),
}
