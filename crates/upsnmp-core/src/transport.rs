use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snmp2::{AsyncSession, Oid, Value};
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

// v1 agents answer a GET for an unknown OID with noSuchName instead of a
// NoSuchObject varbind.
const ERROR_STATUS_NO_SUCH_NAME: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnmpVersion {
    V2c,
    V1,
}

impl SnmpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SnmpVersion::V2c => "v2c",
            SnmpVersion::V1 => "v1",
        }
    }
}

impl std::fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpTarget {
    pub host: String,
    pub port: u16,
    pub community: String,
}

impl SnmpTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Unsigned(u64),
    Timeticks(u32),
    Text(String),
    ObjectId(String),
    IpAddress([u8; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidError {
    Timeout,
    NoSuchObject,
    Agent(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OidValue {
    Present(RawValue),
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OidResult {
    pub oid: String,
    pub value: OidValue,
    pub error: Option<OidError>,
}

impl OidResult {
    pub fn present(oid: impl Into<String>, raw: RawValue) -> Self {
        Self {
            oid: oid.into(),
            value: OidValue::Present(raw),
            error: None,
        }
    }

    pub fn absent(oid: impl Into<String>, error: Option<OidError>) -> Self {
        Self {
            oid: oid.into(),
            value: OidValue::Absent,
            error,
        }
    }

    pub fn raw(&self) -> Option<&RawValue> {
        match &self.value {
            OidValue::Present(raw) => Some(raw),
            OidValue::Absent => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("snmp error: {0}")]
    Snmp(String),
    #[error("invalid oid: {0}")]
    InvalidOid(String),
}

/// One GET exchange against an agent. Implementations return a result for
/// every requested OID, in request order; only whole-exchange failures are
/// reported as `Err`.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    async fn get(
        &self,
        target: &SnmpTarget,
        version: SnmpVersion,
        oids: &[String],
    ) -> Result<Vec<OidResult>, TransportError>;
}

pub struct Snmp2Transport {
    request_timeout: Duration,
}

impl Snmp2Transport {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    async fn exchange(
        target: &SnmpTarget,
        version: SnmpVersion,
        oids: &[String],
        request_timeout: Duration,
    ) -> Result<Vec<OidResult>, TransportError> {
        let address = target.address();
        let community = target.community.as_bytes();
        let session = match version {
            SnmpVersion::V2c => AsyncSession::new_v2c(address.as_str(), community, 0).await,
            SnmpVersion::V1 => AsyncSession::new_v1(address.as_str(), community, 0).await,
        };
        let mut session =
            session.map_err(|err| TransportError::Unreachable(format!("{address}: {err}")))?;

        let mut results = Vec::with_capacity(oids.len());
        let mut answered = false;

        for (idx, oid_str) in oids.iter().enumerate() {
            let oid = parse_oid(oid_str)?;
            debug!(host = %target.host, %version, oid = %oid_str, "snmp get");

            let response = match timeout(request_timeout, session.get(&oid)).await {
                Ok(Ok(pdu)) => pdu,
                Ok(Err(err)) => return Err(TransportError::Snmp(err.to_string())),
                Err(_) if !answered => return Err(TransportError::Timeout),
                Err(_) => {
                    // The agent answered earlier in this exchange; mark the rest
                    // as timed out rather than waiting on each of them.
                    debug!(host = %target.host, oid = %oid_str, "snmp get timed out mid-exchange");
                    for rest in &oids[idx..] {
                        results.push(OidResult::absent(rest.clone(), Some(OidError::Timeout)));
                    }
                    return Ok(results);
                }
            };
            answered = true;

            if response.error_status == ERROR_STATUS_NO_SUCH_NAME {
                results.push(OidResult::absent(oid_str.clone(), Some(OidError::NoSuchObject)));
                continue;
            }
            if response.error_status != 0 {
                results.push(OidResult::absent(
                    oid_str.clone(),
                    Some(OidError::Agent(response.error_status)),
                ));
                continue;
            }

            let result = response
                .varbinds
                .into_iter()
                .next()
                .map(|(_, value)| convert_value(oid_str, value))
                .unwrap_or_else(|| OidResult::absent(oid_str.clone(), None));
            results.push(result);
        }

        Ok(results)
    }
}

#[async_trait]
impl SnmpTransport for Snmp2Transport {
    async fn get(
        &self,
        target: &SnmpTarget,
        version: SnmpVersion,
        oids: &[String],
    ) -> Result<Vec<OidResult>, TransportError> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        // Runs on the caller's task: dropping the poll stops the exchange.
        Self::exchange(target, version, oids, self.request_timeout).await
    }
}

pub fn parse_oid(s: &str) -> Result<Oid<'static>, TransportError> {
    let parts: Result<Vec<u64>, _> = s
        .trim()
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>())
        .collect();

    let parts = parts.map_err(|err| TransportError::InvalidOid(format!("{s}: {err}")))?;
    Oid::from(&parts).map_err(|err| TransportError::InvalidOid(format!("{s}: {err:?}")))
}

fn convert_value(oid: &str, value: Value<'_>) -> OidResult {
    let raw = match value {
        Value::Integer(v) => RawValue::Integer(v),
        Value::Counter32(v) | Value::Unsigned32(v) => RawValue::Unsigned(u64::from(v)),
        Value::Counter64(v) => RawValue::Unsigned(v),
        Value::Timeticks(v) => RawValue::Timeticks(v),
        Value::OctetString(bytes) => RawValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        Value::ObjectIdentifier(id) => RawValue::ObjectId(id.to_string()),
        Value::IpAddress(addr) => RawValue::IpAddress(addr),
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            return OidResult::absent(oid, Some(OidError::NoSuchObject));
        }
        _ => return OidResult::absent(oid, None),
    };
    OidResult::present(oid, raw)
}
