// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rotation Manager and Scheduler (C6)
//!
//! [`RotationManager`] orchestrates due-time computation, provider
//! invocation, vault update, and history recording. [`RotationScheduler`]
//! wraps it in a cooperative periodic task.

use crate::rotation_providers::ProviderRegistry;
use crate::vault::Vault;
use chrono::Utc;
use secret_keeper_domain::{Result, RotationConfig, RotationHistoryEntry, SecretKeeperError};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

/// Orchestrates rotation configuration, the hot rotate-now path, and
/// due-rotation queries. Owns no state beyond references to the vault and
/// provider registry — every durable fact lives in the vault.
pub struct RotationManager {
    vault: Arc<Vault>,
    providers: Arc<ProviderRegistry>,
}

impl RotationManager {
    pub fn new(vault: Arc<Vault>, providers: Arc<ProviderRegistry>) -> Self {
        Self { vault, providers }
    }

    /// Validate `provider_config` against the named provider, compute
    /// `next_rotation = now + days`, and persist the row.
    pub async fn configure(&self, secret_name: &str, provider_tag: &str, schedule_days: u32, provider_config: String) -> Result<RotationConfig> {
        let mut config = RotationConfig::new(secret_name, provider_tag, schedule_days, provider_config);
        let provider = self.providers.get(provider_tag)?;
        if !provider.validate_config(&config) {
            return Err(SecretKeeperError::RotationError(format!("invalid configuration for provider '{provider_tag}'")));
        }
        config.next_rotation = Some(Utc::now() + chrono::Duration::days(schedule_days as i64));
        self.vault.upsert_rotation_config(&config).await?;
        Ok(config)
    }

    pub async fn enable(&self, secret_name: &str) -> Result<()> {
        self.set_enabled(secret_name, true).await
    }

    pub async fn disable(&self, secret_name: &str) -> Result<()> {
        self.set_enabled(secret_name, false).await
    }

    async fn set_enabled(&self, secret_name: &str, enabled: bool) -> Result<()> {
        let mut config = self.get(secret_name).await?;
        config.enabled = enabled;
        self.vault.upsert_rotation_config(&config).await
    }

    pub async fn delete(&self, secret_name: &str) -> Result<()> {
        self.vault.delete_rotation_config(secret_name).await
    }

    pub async fn get(&self, secret_name: &str) -> Result<RotationConfig> {
        self.vault
            .get_rotation_config(secret_name)
            .await?
            .ok_or_else(|| SecretKeeperError::RotationError(format!("no rotation configured for '{secret_name}'")))
    }

    pub async fn list(&self) -> Result<Vec<RotationConfig>> {
        self.vault.list_rotation_configs().await
    }

    /// Read the current value through the vault, invoke the provider, and
    /// on success write the new value back and append a `success` history
    /// row. Any provider error is recorded as a `failed` row and returned;
    /// the old value is left intact.
    pub async fn rotate_now(&self, secret_name: &str) -> Result<String> {
        let config = self.get(secret_name).await?;
        let provider = self.providers.get(&config.provider_tag)?;
        let current_value = self.vault.get_secret(secret_name).await?;

        match provider.rotate(&config, &current_value).await {
            Ok(new_value) => {
                self.vault.add_secret(secret_name, &new_value, None, vec![], secret_keeper_domain::Sensitivity::Sensitive).await?;
                let mut updated = config;
                updated.mark_rotated(Utc::now());
                self.vault.upsert_rotation_config(&updated).await?;
                self.vault
                    .insert_rotation_history(&RotationHistoryEntry::success(secret_name, Utc::now(), &updated.provider_tag))
                    .await?;
                Ok(new_value)
            }
            Err(err) => {
                self.vault
                    .insert_rotation_history(&RotationHistoryEntry::failed(secret_name, Utc::now(), &config.provider_tag, err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    /// Dry-run variant: never mutates the stored secret or the schedule.
    pub async fn test(&self, secret_name: &str) -> Result<bool> {
        let config = self.get(secret_name).await?;
        let provider = self.providers.get(&config.provider_tag)?;
        let current_value = self.vault.get_secret(secret_name).await?;
        provider.test_rotate(&config, &current_value).await
    }

    /// Configs due now, ordered by ascending `next_rotation` (§8 invariant 9).
    pub async fn due_now(&self) -> Result<Vec<RotationConfig>> {
        self.vault.due_rotation_configs(Utc::now()).await
    }

    /// Rotate every due config sequentially — never in parallel, since
    /// provider-side rotations (notably AWS) are not safely idempotent.
    /// Returns one outcome per attempted secret.
    pub async fn run_due(&self) -> Vec<(String, Result<String>)> {
        let due = match self.due_now().await {
            Ok(configs) => configs,
            Err(err) => return vec![(String::new(), Err(err))],
        };

        let mut outcomes = Vec::with_capacity(due.len());
        for config in due {
            let outcome = self.rotate_now(&config.secret_name).await;
            outcomes.push((config.secret_name, outcome));
        }
        outcomes
    }
}

/// Observable lifecycle state of [`RotationScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Rotating,
}

/// Callback invoked after every scheduler tick with the outcomes of that
/// tick's `run_due`. Used by the daemon to reload its secret map and
/// scrubber, and to append to the rotation log.
pub type RotationCallback = Arc<dyn Fn(&[(String, Result<String>)]) + Send + Sync>;

/// A cooperative periodic task driving [`RotationManager::run_due`].
pub struct RotationScheduler {
    manager: Arc<RotationManager>,
    interval: std::time::Duration,
    callback: Option<RotationCallback>,
    state: Arc<RwLock<SchedulerState>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    stop_signal: Arc<Notify>,
}

impl RotationScheduler {
    pub fn new(manager: Arc<RotationManager>, interval: std::time::Duration, callback: Option<RotationCallback>) -> Self {
        Self {
            manager,
            interval,
            callback,
            state: Arc::new(RwLock::new(SchedulerState::Stopped)),
            handle: Mutex::new(None),
            stop_signal: Arc::new(Notify::new()),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Start the periodic tick loop. Idempotent: calling `start` while
    /// already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if *state != SchedulerState::Stopped {
                return;
            }
            *state = SchedulerState::Running;
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(scheduler.interval) => {}
                    _ = scheduler.stop_signal.notified() => break,
                }

                *scheduler.state.write().await = SchedulerState::Rotating;
                let outcomes = scheduler.manager.run_due().await;
                if let Some(callback) = &scheduler.callback {
                    callback(&outcomes);
                }
                *scheduler.state.write().await = SchedulerState::Running;
            }
            *scheduler.state.write().await = SchedulerState::Stopped;
        });

        *self.handle.lock().await = Some(handle);
    }

    /// Cancel any scheduled future tick and wait for an in-flight rotation
    /// to complete before returning.
    pub async fn stop(&self) {
        if self.state().await == SchedulerState::Stopped {
            return;
        }
        self.stop_signal.notify_one();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Aes256GcmCrypto;
    use crate::rotation_providers::CustomProviderConfig;
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn manager_with_secret(secret_name: &str, value: &str) -> RotationManager {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let vault = Arc::new(Vault::from_pool(pool, Arc::new(Aes256GcmCrypto::new())).await.unwrap());
        vault.initialize(b"key").await.unwrap();
        vault.add_secret(secret_name, value, None, vec![], secret_keeper_domain::Sensitivity::Sensitive).await.unwrap();
        RotationManager::new(vault, Arc::new(ProviderRegistry::with_defaults()))
    }

    fn custom_blob(rotate_command: &str) -> String {
        serde_json::to_string(&CustomProviderConfig { rotate_command: rotate_command.to_string(), validate_command: None }).unwrap()
    }

    #[tokio::test]
    async fn configure_computes_next_rotation() {
        let manager = manager_with_secret("API_KEY", "old").await;
        let config = manager.configure("API_KEY", "custom", 7, custom_blob("echo new")).await.unwrap();
        assert!(config.next_rotation.is_some());
    }

    #[tokio::test]
    async fn configure_rejects_invalid_provider_config() {
        let manager = manager_with_secret("API_KEY", "old").await;
        let result = manager.configure("API_KEY", "custom", 7, custom_blob("")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn configure_rejects_unknown_provider() {
        let manager = manager_with_secret("API_KEY", "old").await;
        let result = manager.configure("API_KEY", "no-such-provider", 7, "{}".to_string()).await;
        assert!(matches!(result, Err(SecretKeeperError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn rotate_now_updates_secret_and_history() {
        let manager = manager_with_secret("API_KEY", "old-value").await;
        manager.configure("API_KEY", "custom", 7, custom_blob("echo rotated-value")).await.unwrap();

        let new_value = manager.rotate_now("API_KEY").await.unwrap();
        assert_eq!(new_value, "rotated-value");
        assert_eq!(manager.vault.get_secret("API_KEY").await.unwrap(), "rotated-value");

        let history = manager.vault.list_rotation_history("API_KEY").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, secret_keeper_domain::RotationStatus::Success);
    }

    #[tokio::test]
    async fn rotate_now_failure_leaves_old_value_and_records_failure() {
        let manager = manager_with_secret("API_KEY", "old-value").await;
        manager.configure("API_KEY", "custom", 7, custom_blob("true")).await.unwrap(); // empty stdout -> aborts

        let result = manager.rotate_now("API_KEY").await;
        assert!(result.is_err());
        assert_eq!(manager.vault.get_secret("API_KEY").await.unwrap(), "old-value");

        let history = manager.vault.list_rotation_history("API_KEY").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, secret_keeper_domain::RotationStatus::Failed);
    }

    #[tokio::test]
    async fn due_now_reflects_enabled_flag() {
        let manager = manager_with_secret("API_KEY", "old").await;
        manager.configure("API_KEY", "custom", 7, custom_blob("echo x")).await.unwrap();
        assert_eq!(manager.due_now().await.unwrap().len(), 1);

        manager.disable("API_KEY").await.unwrap();
        assert!(manager.due_now().await.unwrap().is_empty());

        manager.enable("API_KEY").await.unwrap();
        assert_eq!(manager.due_now().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scheduler_runs_due_rotations_and_invokes_callback() {
        let manager = Arc::new(manager_with_secret("API_KEY", "old-value").await);
        manager.configure("API_KEY", "custom", 7, custom_blob("echo ticked-value")).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let callback: RotationCallback = Arc::new(move |_outcomes| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let scheduler = Arc::new(RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_millis(10), Some(callback)));
        scheduler.start().await;
        assert_eq!(scheduler.state().await, SchedulerState::Running);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        scheduler.stop().await;

        assert_eq!(scheduler.state().await, SchedulerState::Stopped);
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(manager.vault.get_secret("API_KEY").await.unwrap(), "ticked-value");
    }

    #[tokio::test]
    async fn scheduler_start_is_idempotent() {
        let manager = Arc::new(manager_with_secret("API_KEY", "old").await);
        let scheduler = Arc::new(RotationScheduler::new(Arc::clone(&manager), std::time::Duration::from_secs(3600), None));
        scheduler.start().await;
        scheduler.start().await; // no-op, does not spawn a second loop
        assert_eq!(scheduler.state().await, SchedulerState::Running);
        scheduler.stop().await;
    }
}
