// libs/queue-cell/src/services/capacity.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::error::QueueError;
use crate::models::{DailyKey, DailyScheduleStatus, ScheduleId};
use crate::store::QueueStore;

/// Per-(schedule, day) slot counter. The counter value is the queue number of
/// the last booking, so reserving and numbering are one atomic step.
pub struct CapacityService {
    store: Arc<dyn QueueStore>,
}

impl CapacityService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn reserve_slot(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
        max_patients: i32,
    ) -> Result<i32, QueueError> {
        let key = DailyKey::new(schedule_id, date);
        match self.store.reserve_slot(key, max_patients).await {
            Ok(queue_number) => {
                debug!("Assigned queue number {} on {}", queue_number, key);
                Ok(queue_number)
            }
            Err(e @ QueueError::CapacityExceeded { .. }) => {
                info!("Daily capacity reached for {}", key);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn release_slot(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
        count: u32,
    ) -> Result<i32, QueueError> {
        let key = DailyKey::new(schedule_id, date);
        let remaining = self.store.release_slot(key, count).await?;
        if remaining == 0 && count > 0 {
            warn!("Daily counter for {} is now empty after releasing {}", key, count);
        }
        Ok(remaining)
    }

    pub async fn daily_status(
        &self,
        schedule_id: ScheduleId,
        date: NaiveDate,
    ) -> Result<Option<DailyScheduleStatus>, QueueError> {
        self.store.get_daily_status(DailyKey::new(schedule_id, date)).await
    }
}
