// libs/queue-cell/src/services/policy.rs
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::QueueError;
use crate::models::{
    QueuePolicy, DEFAULT_AUTO_CANCEL_GRACE_MINUTES, DEFAULT_CHECK_IN_EARLY_MINUTES,
    DEFAULT_CHECK_IN_LATE_MINUTES, MAX_POLICY_MINUTES,
};
use crate::store::QueueStore;

/// Builds a complete policy out of whatever the settings row holds.
///
/// Never fails: booleans must be real booleans, minutes must coerce to a finite
/// number, and anything else falls back to the default. Minutes are rounded and
/// clamped into [0, 1440]. Keys are accepted in snake_case or camelCase, and a
/// non-object input yields the default policy.
pub fn normalize_policy(raw: &Value) -> QueuePolicy {
    let defaults = QueuePolicy::default();

    QueuePolicy {
        enable_strict_check_in: normalize_flag(
            lookup(raw, "enable_strict_check_in", "enableStrictCheckIn"),
            defaults.enable_strict_check_in,
        ),
        check_in_early_minutes: normalize_minutes(
            lookup(raw, "check_in_early_minutes", "checkInEarlyMinutes"),
            DEFAULT_CHECK_IN_EARLY_MINUTES,
        ),
        check_in_late_minutes: normalize_minutes(
            lookup(raw, "check_in_late_minutes", "checkInLateMinutes"),
            DEFAULT_CHECK_IN_LATE_MINUTES,
        ),
        enable_auto_cancel: normalize_flag(
            lookup(raw, "enable_auto_cancel", "enableAutoCancel"),
            defaults.enable_auto_cancel,
        ),
        auto_cancel_grace_minutes: normalize_minutes(
            lookup(raw, "auto_cancel_grace_minutes", "autoCancelGraceMinutes"),
            DEFAULT_AUTO_CANCEL_GRACE_MINUTES,
        ),
    }
}

fn lookup<'a>(raw: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    raw.get(snake).or_else(|| raw.get(camel))
}

fn normalize_flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        _ => default,
    }
}

fn normalize_minutes(value: Option<&Value>, default: u32) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match number.filter(|n| n.is_finite()) {
        Some(n) => n.round().clamp(0.0, f64::from(MAX_POLICY_MINUTES)) as u32,
        None => default,
    }
}

/// Reads and writes the clinic-wide policy. The policy is loaded once per
/// operation and handed to whatever needs it.
pub struct PolicyService {
    store: Arc<dyn QueueStore>,
}

impl PolicyService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    pub async fn load_policy(&self) -> Result<QueuePolicy, QueueError> {
        let raw = self.store.load_policy().await?;
        let policy = normalize_policy(&raw);
        debug!("Loaded queue policy: {:?}", policy);
        Ok(policy)
    }

    #[instrument(skip(self, raw))]
    pub async fn update_policy(&self, raw: &Value) -> Result<QueuePolicy, QueueError> {
        let policy = normalize_policy(raw);
        self.store.save_policy(&policy).await?;
        info!("Queue policy updated: {:?}", policy);
        Ok(policy)
    }
}
