//! Rotation configuration and history entities (§3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one rotation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStatus {
    Success,
    Failed,
}

/// Per-secret rotation schedule and provider wiring.
///
/// Invariant: `next_rotation = last_rotated + schedule_days` whenever
/// `last_rotated` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    pub secret_name: String,
    pub provider_tag: String,
    pub schedule_days: u32,
    pub last_rotated: Option<DateTime<Utc>>,
    pub next_rotation: Option<DateTime<Utc>>,
    pub enabled: bool,
    /// Serialized (JSON) provider-specific configuration blob.
    pub provider_config: String,
}

impl RotationConfig {
    /// Construct a freshly configured rotation with no history yet.
    ///
    /// # Panics
    ///
    /// Panics if `schedule_days` is zero; the caller is expected to have
    /// validated this already (the manager rejects it before construction).
    pub fn new(secret_name: impl Into<String>, provider_tag: impl Into<String>, schedule_days: u32, provider_config: impl Into<String>) -> Self {
        assert!(schedule_days >= 1, "schedule_days must be >= 1");
        Self {
            secret_name: secret_name.into(),
            provider_tag: provider_tag.into(),
            schedule_days,
            last_rotated: None,
            next_rotation: None,
            enabled: true,
            provider_config: provider_config.into(),
        }
    }

    /// Record a completed rotation, advancing `last_rotated`/`next_rotation`
    /// together so the invariant in §3 always holds.
    pub fn mark_rotated(&mut self, at: DateTime<Utc>) {
        self.last_rotated = Some(at);
        self.next_rotation = Some(at + chrono::Duration::days(self.schedule_days as i64));
    }

    /// Whether this config is due for rotation at `now`.
    ///
    /// Matches §8 invariant 9: `enabled = true ∧ (next_rotation = null ∨
    /// next_rotation ≤ now)`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_rotation.map(|t| t <= now).unwrap_or(true)
    }
}

/// One append-only rotation attempt record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationHistoryEntry {
    pub id: i64,
    pub secret_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: RotationStatus,
    pub provider_tag: String,
    /// Populated iff `status == Failed`.
    pub error_message: Option<String>,
}

impl RotationHistoryEntry {
    pub fn success(secret_name: impl Into<String>, timestamp: DateTime<Utc>, provider_tag: impl Into<String>) -> Self {
        Self {
            id: 0,
            secret_name: secret_name.into(),
            timestamp,
            status: RotationStatus::Success,
            provider_tag: provider_tag.into(),
            error_message: None,
        }
    }

    pub fn failed(secret_name: impl Into<String>, timestamp: DateTime<Utc>, provider_tag: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            id: 0,
            secret_name: secret_name.into(),
            timestamp,
            status: RotationStatus::Failed,
            provider_tag: provider_tag.into(),
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_when_never_rotated_and_enabled() {
        let config = RotationConfig::new("API_KEY", "custom", 30, "{}");
        assert!(config.is_due(Utc::now()));
    }

    #[test]
    fn not_due_when_next_rotation_in_future() {
        let mut config = RotationConfig::new("API_KEY", "custom", 30, "{}");
        config.mark_rotated(Utc::now());
        assert!(!config.is_due(Utc::now()));
    }

    #[test]
    fn never_due_when_disabled() {
        let mut config = RotationConfig::new("API_KEY", "custom", 30, "{}");
        config.enabled = false;
        assert!(!config.is_due(Utc::now()));
    }

    #[test]
    fn mark_rotated_keeps_invariant() {
        let mut config = RotationConfig::new("API_KEY", "custom", 7, "{}");
        let at = Utc::now();
        config.mark_rotated(at);
        assert_eq!(config.next_rotation, Some(at + chrono::Duration::days(7)));
    }

    #[test]
    fn due_now_boundary_is_inclusive() {
        let mut config = RotationConfig::new("API_KEY", "custom", 30, "{}");
        let past = Utc::now() - chrono::Duration::days(31);
        config.mark_rotated(past);
        assert!(config.is_due(Utc::now()));
    }

    #[test]
    fn failed_entry_carries_error_message() {
        let entry = RotationHistoryEntry::failed("API_KEY", Utc::now(), "custom", "timed out");
        assert_eq!(entry.status, RotationStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("timed out"));
    }

    #[test]
    #[should_panic(expected = "schedule_days must be >= 1")]
    fn new_rejects_zero_schedule() {
        RotationConfig::new("API_KEY", "custom", 0, "{}");
    }
}
