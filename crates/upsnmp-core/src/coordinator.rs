use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::backoff::BackoffState;
use crate::catalog::Cadence;
use crate::config::{DeviceConfig, PollPolicy};
use crate::dialect::DialectDetector;
use crate::error::PollError;
use crate::normalize::normalize;
use crate::snapshot::{DeviceMetadata, DeviceStatus, Snapshot, SnapshotDevice, SnapshotQuality};
use crate::state::NormalizedState;
use crate::transport::SnmpTransport;

const LOCK_WAIT_LOG_THRESHOLD: Duration = Duration::from_millis(1);

struct PollState {
    detector: DialectDetector,
    backoff: BackoffState,
    state: NormalizedState,
    metadata: DeviceMetadata,
    polls_ok: u64,
    polls_err: u64,
}

/// Polls one UPS on two cadences. Every poll holds `poll_lock`, which is
/// shared by all coordinators of the same agent, so SNMP exchanges against
/// one host never overlap.
pub struct Coordinator {
    entry_id: String,
    config: DeviceConfig,
    policy: PollPolicy,
    transport: Arc<dyn SnmpTransport>,
    poll_lock: Arc<Mutex<()>>,
    poll_state: Mutex<PollState>,
    updates: watch::Sender<DeviceStatus>,
}

impl Coordinator {
    pub fn new(
        entry_id: impl Into<String>,
        config: DeviceConfig,
        policy: PollPolicy,
        transport: Arc<dyn SnmpTransport>,
    ) -> Self {
        Self::with_poll_lock(entry_id, config, policy, transport, Arc::default())
    }

    pub fn with_poll_lock(
        entry_id: impl Into<String>,
        config: DeviceConfig,
        policy: PollPolicy,
        transport: Arc<dyn SnmpTransport>,
        poll_lock: Arc<Mutex<()>>,
    ) -> Self {
        let (updates, _) = watch::channel(DeviceStatus::Pending);
        Self {
            entry_id: entry_id.into(),
            poll_lock,
            poll_state: Mutex::new(PollState {
                detector: DialectDetector::new(policy.dialect_miss_threshold),
                backoff: BackoffState::new(),
                state: NormalizedState::new(),
                metadata: DeviceMetadata::default(),
                polls_ok: 0,
                polls_err: 0,
            }),
            config,
            policy,
            transport,
            updates,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.updates.subscribe()
    }

    pub fn status(&self) -> DeviceStatus {
        self.updates.borrow().clone()
    }

    pub async fn normalized_state(&self) -> NormalizedState {
        self.poll_state.lock().await.state.clone()
    }

    pub async fn refresh_all(&self) -> Result<Snapshot, PollError> {
        let snapshot = self.poll(Cadence::Fast).await?;
        match self.poll(Cadence::Slow).await {
            Ok(full) => Ok(full),
            Err(_) => Ok(snapshot),
        }
    }

    pub async fn run_cadence(self: Arc<Self>, cadence: Cadence, start: Instant) {
        let period = self.config.interval(cadence);
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.poll(cadence).await {
                if err.is_skip() {
                    debug!(entry_id = %self.entry_id, %cadence, %err, "poll skipped");
                }
            }
        }
    }

    pub async fn poll(&self, cadence: Cadence) -> Result<Snapshot, PollError> {
        let device = self.config.device_name.as_str();
        let host = self.config.host.as_str();
        debug!(device, host, entry_id = %self.entry_id, %cadence, "starting SNMP poll");

        let lock_started = Instant::now();
        let acquire = async {
            let held = self.poll_lock.lock().await;
            (held, self.poll_state.lock().await)
        };
        let (_held, mut guard) = match timeout(self.config.interval(cadence), acquire).await {
            Ok(guards) => guards,
            Err(_) => {
                let waited = lock_started.elapsed();
                warn!(device, host, entry_id = %self.entry_id, %cadence, waited_ms = waited.as_millis() as u64, "poll lock still held, skipping tick");
                return Err(PollError::LockTimeout { waited });
            }
        };
        let lock_wait = lock_started.elapsed();
        if lock_wait > LOCK_WAIT_LOG_THRESHOLD {
            debug!(host, entry_id = %self.entry_id, %cadence, waited_ms = lock_wait.as_millis() as u64, "waited for SNMP poll lock");
        }

        if let Some(remaining) = guard.backoff.remaining(Instant::now()) {
            return Err(PollError::BackoffActive { remaining });
        }

        let started = Instant::now();
        let outcome = self.poll_locked(&mut guard, cadence).await;
        let poll_ms = started.elapsed().as_millis();

        match outcome {
            Ok(()) => {
                guard.backoff.record_success();
                guard.polls_ok += 1;
                let snapshot = self.build_snapshot(&guard, cadence, poll_ms, lock_wait.as_millis());
                self.updates
                    .send_replace(DeviceStatus::Available(snapshot.clone()));
                Ok(snapshot)
            }
            Err(err) => {
                guard.polls_err += 1;
                let delay = guard.backoff.record_failure(
                    Instant::now(),
                    self.config.fast_interval(),
                    self.policy.backoff_cap_exponent,
                );
                let failures = guard.backoff.consecutive_failures();
                warn!(
                    device,
                    host,
                    entry_id = %self.entry_id,
                    %cadence,
                    %err,
                    failures,
                    backoff_ms = delay.as_millis() as u64,
                    "SNMP update failed; backing off"
                );

                if failures >= self.policy.unavailable_after {
                    let since = self.unavailable_since();
                    self.updates.send_replace(DeviceStatus::Unavailable {
                        reason: format!("{device} {host}: {err}"),
                        since,
                    });
                }
                Err(err)
            }
        }
    }

    async fn poll_locked(&self, poll: &mut PollState, cadence: Cadence) -> Result<(), PollError> {
        let target = self.config.target();
        let dialect = poll
            .detector
            .resolve(self.transport.as_ref(), &target)
            .await?;

        let oids: Vec<String> = dialect
            .mib
            .cadence_subset(cadence)
            .iter()
            .map(|spec| spec.oid.to_string())
            .collect();

        let results = match self.transport.get(&target, dialect.version, &oids).await {
            Ok(results) => results,
            Err(err) => {
                poll.detector.record_miss();
                return Err(err.into());
            }
        };

        let values = normalize(dialect.mib, &results);
        if values.is_empty() {
            poll.detector.record_miss();
            return Err(PollError::NoUsableMetrics);
        }
        poll.detector.record_answer();

        debug!(entry_id = %self.entry_id, %cadence, %dialect, metrics = values.len(), "merging poll results");
        poll.state.merge(cadence, values, Utc::now());
        poll.metadata.update(&poll.state, dialect.mib);
        Ok(())
    }

    fn unavailable_since(&self) -> DateTime<Utc> {
        match &*self.updates.borrow() {
            DeviceStatus::Unavailable { since, .. } => *since,
            _ => Utc::now(),
        }
    }

    fn build_snapshot(
        &self,
        poll: &PollState,
        cadence: Cadence,
        poll_ms: u128,
        lock_wait_ms: u128,
    ) -> Snapshot {
        Snapshot {
            ts: poll.state.generated_at.unwrap_or_else(Utc::now),
            entry_id: self.entry_id.clone(),
            device: SnapshotDevice {
                name: self.config.device_name.clone(),
                host: self.config.host.clone(),
                port: self.config.port,
                metadata: poll.metadata.clone(),
            },
            dialect: poll.detector.state().clone(),
            metrics: poll.state.metrics.clone(),
            quality: SnapshotQuality {
                cadence,
                poll_ms,
                lock_wait_ms,
                polls_ok: poll.polls_ok,
                polls_err: poll.polls_err,
                consecutive_failures: poll.backoff.consecutive_failures(),
            },
        }
    }
}
