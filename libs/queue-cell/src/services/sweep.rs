// libs/queue-cell/src/services/sweep.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::error::QueueError;
use crate::models::{
    DailyKey, QueuePolicy, SlotRelease, SweepCandidate, SweepOutcome, SweepPlan, SweepReport,
    SweepSkipped, NO_SHOW_REASON,
};
use crate::services::deadline::no_show_deadline;
use crate::services::policy::PolicyService;
use crate::store::QueueStore;

/// Picks the overdue candidates and counts how many slots each daily counter
/// gives back.
pub fn plan_sweep(candidates: &[SweepCandidate], policy: &QueuePolicy, now: NaiveDateTime) -> SweepPlan {
    let mut cancelled_ids = Vec::new();
    let mut per_key: BTreeMap<DailyKey, u32> = BTreeMap::new();

    for candidate in candidates {
        let reservation = &candidate.reservation;
        let deadline = no_show_deadline(
            reservation.scheduled_at(),
            candidate.session.start,
            candidate.session.end,
            policy.check_in_late_minutes,
            policy.auto_cancel_grace_minutes,
        );

        if now > deadline {
            debug!("Reservation {} overdue (deadline {})", reservation.id, deadline);
            cancelled_ids.push(reservation.id);
            *per_key.entry(reservation.daily_key()).or_insert(0) += 1;
        }
    }

    SweepPlan {
        cancelled_ids,
        releases: per_key
            .into_iter()
            .map(|(key, count)| SlotRelease { schedule_id: key.schedule_id, date: key.date, count })
            .collect(),
        reason: NO_SHOW_REASON.to_string(),
    }
}

/// Cancels reservations whose no-show deadline has passed.
pub struct AutoCancelService {
    store: Arc<dyn QueueStore>,
    policy_service: PolicyService,
}

impl AutoCancelService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            policy_service: PolicyService::new(Arc::clone(&store)),
            store,
        }
    }

    /// One sweep. Either every overdue reservation is cancelled together with
    /// its counter release, or nothing changes and the sweep can be rerun.
    #[instrument(skip(self))]
    pub async fn run_auto_cancel_sweep(&self, now: NaiveDateTime) -> Result<SweepOutcome, QueueError> {
        let policy = self.policy_service.load_policy().await?;

        if !policy.enable_auto_cancel {
            debug!("Auto-cancel disabled, sweep skipped");
            return Ok(SweepOutcome::Skipped(SweepSkipped {
                skipped: true,
                reason: "auto-cancel is disabled".to_string(),
            }));
        }

        let run_id = Uuid::new_v4();
        let candidates = self.store.find_sweep_candidates(now).await?;
        let plan = plan_sweep(&candidates, &policy, now);

        if !plan.is_empty() {
            if let Err(e) = self.store.apply_sweep(&plan).await {
                error!("Sweep {} rolled back: {}", run_id, e);
                return Err(e);
            }
        }

        info!(
            "Sweep {} processed {} candidates, cancelled {}",
            run_id,
            candidates.len(),
            plan.cancelled_ids.len()
        );

        Ok(SweepOutcome::Completed(SweepReport {
            run_id,
            processed: candidates.len(),
            cancelled: plan.cancelled_ids.len(),
            cancelled_ids: plan.cancelled_ids,
        }))
    }
}
