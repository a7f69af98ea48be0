use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use crate::catalog::Cadence;
use crate::config::{DeviceConfig, PollPolicy};
use crate::coordinator::Coordinator;
use crate::error::RegistryError;
use crate::snapshot::DeviceStatus;
use crate::transport::SnmpTransport;

struct RegisteredEntry {
    coordinator: Arc<Coordinator>,
    tasks: Vec<JoinHandle<()>>,
}

impl RegisteredEntry {
    fn stop(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

type HostKey = (String, u16);

pub struct Registry {
    transport: Arc<dyn SnmpTransport>,
    policy: PollPolicy,
    entries: HashMap<String, RegisteredEntry>,
    host_locks: HashMap<HostKey, Arc<Mutex<()>>>,
}

impl Registry {
    pub fn new(transport: Arc<dyn SnmpTransport>, policy: PollPolicy) -> Self {
        Self {
            transport,
            policy,
            entries: HashMap::new(),
            host_locks: HashMap::new(),
        }
    }

    pub async fn add(
        &mut self,
        entry_id: &str,
        config: DeviceConfig,
    ) -> Result<watch::Receiver<DeviceStatus>, RegistryError> {
        if self.entries.contains_key(entry_id) {
            return Err(RegistryError::DuplicateEntry(entry_id.to_string()));
        }
        let config = config.validate()?;

        let entry = self.start(entry_id, config).await?;
        let receiver = entry.coordinator.subscribe();
        self.entries.insert(entry_id.to_string(), entry);
        Ok(receiver)
    }

    async fn start(
        &mut self,
        entry_id: &str,
        config: DeviceConfig,
    ) -> Result<RegisteredEntry, RegistryError> {
        info!(entry_id, device = %config.device_name, host = %config.host, "setting up UPS entry");
        let poll_lock = Arc::clone(
            self.host_locks
                .entry((config.host.clone(), config.port))
                .or_default(),
        );
        let coordinator = Arc::new(Coordinator::with_poll_lock(
            entry_id,
            config,
            self.policy.clone(),
            Arc::clone(&self.transport),
            poll_lock,
        ));

        if let Err(err) = coordinator.refresh_all().await {
            error!(entry_id, host = %coordinator.config().host, %err, "failed to fetch initial SNMP data");
            drop(coordinator);
            self.release_unused_locks();
            return Err(RegistryError::NotReady(err));
        }

        let tasks = [Cadence::Fast, Cadence::Slow]
            .into_iter()
            .map(|cadence| {
                let start = Instant::now() + coordinator.config().interval(cadence);
                tokio::spawn(Arc::clone(&coordinator).run_cadence(cadence, start))
            })
            .collect();

        Ok(RegisteredEntry { coordinator, tasks })
    }

    fn release_unused_locks(&mut self) {
        self.host_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn remove(&mut self, entry_id: &str) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| RegistryError::UnknownEntry(entry_id.to_string()))?;
        entry.stop();
        self.release_unused_locks();
        info!(entry_id, "UPS entry removed");
        Ok(())
    }

    /// Applies a new configuration to an entry. An unchanged configuration
    /// keeps the running coordinator and its state. The new configuration
    /// replaces the old one only once its first refresh succeeds.
    pub async fn reload(
        &mut self,
        entry_id: &str,
        config: DeviceConfig,
    ) -> Result<watch::Receiver<DeviceStatus>, RegistryError> {
        let config = config.validate()?;
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| RegistryError::UnknownEntry(entry_id.to_string()))?;
        if entry.coordinator.config() == &config {
            return Ok(entry.coordinator.subscribe());
        }

        let replacement = self.start(entry_id, config).await?;
        let receiver = replacement.coordinator.subscribe();
        if let Some(previous) = self.entries.insert(entry_id.to_string(), replacement) {
            previous.stop();
        }
        self.release_unused_locks();
        info!(entry_id, "UPS entry reloaded");
        Ok(receiver)
    }

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<Coordinator>> {
        self.entries
            .get(entry_id)
            .map(|entry| Arc::clone(&entry.coordinator))
    }

    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn shutdown(&mut self) {
        for (entry_id, entry) in self.entries.drain() {
            entry.stop();
            info!(entry_id = %entry_id, "UPS entry stopped");
        }
        self.host_locks.clear();
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::test_support::{device, policy, ScriptedAgent};
    use crate::transport::SnmpVersion;

    #[tokio::test(start_paused = true)]
    async fn add_publishes_first_snapshot_and_starts_polling() {
        // Arrange
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let mut registry = Registry::new(agent.clone(), policy(3));

        // Act
        let updates = registry.add("rack-a", device(10, 300)).await.expect("add");
        let after_setup = agent.call_count();
        sleep(Duration::from_secs(35)).await;

        // Assert
        assert!(updates.borrow().is_available());
        assert_eq!(agent.call_count(), after_setup + 3, "fast ticks at 10s, 20s, 30s");
        assert_eq!(registry.entry_ids(), vec!["rack-a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_device_is_not_registered() {
        let agent = Arc::new(ScriptedAgent::unreachable());
        let mut registry = Registry::new(agent, policy(3));

        let err = registry.add("rack-a", device(10, 300)).await.expect_err("not ready");

        assert!(matches!(err, RegistryError::NotReady(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_entry_is_rejected() {
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let mut registry = Registry::new(agent, policy(3));
        registry.add("rack-a", device(10, 300)).await.expect("add");

        let err = registry.add("rack-a", device(10, 300)).await.expect_err("duplicate");

        assert!(matches!(err, RegistryError::DuplicateEntry(id) if id == "rack-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_cancels_timers() {
        // Arrange
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let mut registry = Registry::new(agent.clone(), policy(3));
        registry.add("rack-a", device(10, 300)).await.expect("add");

        // Act
        registry.remove("rack-a").expect("remove");
        let calls = agent.call_count();
        sleep(Duration::from_secs(600)).await;

        // Assert
        assert_eq!(agent.call_count(), calls);
        assert!(matches!(
            registry.remove("rack-a"),
            Err(RegistryError::UnknownEntry(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn devices_fail_independently() {
        // Arrange
        let healthy = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let flaky = Arc::new(ScriptedAgent::apc(&[SnmpVersion::V2c]));
        let mut healthy_registry = Registry::new(healthy.clone(), policy(3));
        let mut flaky_registry = Registry::new(flaky.clone(), policy(3));
        let healthy_updates = healthy_registry.add("a", device(10, 300)).await.expect("add a");
        let flaky_updates = flaky_registry.add("b", device(10, 300)).await.expect("add b");

        // Act
        flaky.set_reachable(false);
        sleep(Duration::from_secs(200)).await;

        // Assert
        assert!(healthy_updates.borrow().is_available());
        assert!(!flaky_updates.borrow().is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn reload_with_same_config_keeps_coordinator() {
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let mut registry = Registry::new(agent, policy(3));
        registry.add("rack-a", device(10, 300)).await.expect("add");
        let before = registry.coordinator("rack-a").expect("coordinator");

        registry.reload("rack-a", device(10, 300)).await.expect("reload same");
        let same = registry.coordinator("rack-a").expect("coordinator");
        registry.reload("rack-a", device(20, 300)).await.expect("reload changed");
        let changed = registry.coordinator("rack-a").expect("coordinator");

        assert!(Arc::ptr_eq(&before, &same));
        assert!(!Arc::ptr_eq(&before, &changed));
        assert_eq!(changed.config().fast_interval_s, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reload_keeps_running_entry() {
        // Arrange
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        let mut registry = Registry::new(agent.clone(), policy(3));
        let updates = registry.add("rack-a", device(10, 300)).await.expect("add");
        let before = registry.coordinator("rack-a").expect("coordinator");
        agent.set_reachable(false);

        // Act
        let err = registry
            .reload("rack-a", device(20, 300))
            .await
            .expect_err("new config not ready");

        // Assert
        assert!(matches!(err, RegistryError::NotReady(_)));
        let kept = registry.coordinator("rack-a").expect("entry kept");
        assert!(Arc::ptr_eq(&before, &kept));
        assert_eq!(kept.config().fast_interval_s, 10);
        assert!(updates.borrow().is_available());

        agent.set_reachable(true);
        let calls = agent.call_count();
        sleep(Duration::from_secs(60)).await;
        assert!(agent.call_count() > calls, "old loops still polling");
    }

    #[tokio::test(start_paused = true)]
    async fn entries_for_same_host_share_the_poll_lock() {
        // Arrange
        let agent = Arc::new(ScriptedAgent::ups_mib(&[SnmpVersion::V2c]));
        agent.set_latency(Duration::from_secs(3));
        let mut registry = Registry::new(agent.clone(), policy(3));
        registry.add("rack-a", device(10, 300)).await.expect("add a");
        registry.add("rack-b", device(10, 300)).await.expect("add b");

        // Act
        sleep(Duration::from_secs(120)).await;

        // Assert
        assert!(agent.call_count() > 20);
        assert_eq!(agent.max_in_flight(), 1);
    }
}
