// libs/queue-cell/src/store/mod.rs
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::error::QueueError;
use crate::models::{
    DailyKey, DailyScheduleStatus, DoctorId, DoctorSchedule, PracticeSession, PromotionPlan,
    QueuePolicy, Reservation, ReservationDraft, ReservationId, ReservationUpdate, ScheduleId, SessionId,
    SweepCandidate, SweepPlan,
};

pub use memory::{InMemoryQueueStore, MemorySeed};
pub use supabase::SupabaseQueueStore;

/// Storage the queue engine runs against.
///
/// Methods documented as atomic must either apply completely or leave the
/// store untouched, including under concurrent callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Raw settings row. Normalized by the caller.
    async fn load_policy(&self) -> Result<Value, QueueError>;

    async fn save_policy(&self, policy: &QueuePolicy) -> Result<(), QueueError>;

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<DoctorSchedule>, QueueError>;

    async fn get_session(&self, session_id: SessionId) -> Result<Option<PracticeSession>, QueueError>;

    async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, QueueError>;

    async fn get_daily_status(&self, key: DailyKey) -> Result<Option<DailyScheduleStatus>, QueueError>;

    /// Atomic increment-and-read of the daily counter.
    async fn reserve_slot(&self, key: DailyKey, max_patients: i32) -> Result<i32, QueueError>;

    /// Decrements the counter, floored at zero. Returns the remaining count.
    async fn release_slot(&self, key: DailyKey, count: u32) -> Result<i32, QueueError>;

    /// Atomic: reserves a slot and inserts the reservation with that queue number.
    async fn create_reservation(&self, draft: ReservationDraft, max_patients: i32) -> Result<Reservation, QueueError>;

    /// Atomic single-row update of the fields set in `update`. Rejected without
    /// writing when the row no longer has the expected examination status.
    async fn update_reservation(
        &self,
        reservation_id: ReservationId,
        update: &ReservationUpdate,
    ) -> Result<Reservation, QueueError>;

    /// Atomic: cancels the reservation and releases its slot.
    async fn cancel_reservation(&self, reservation_id: ReservationId, reason: String) -> Result<Reservation, QueueError>;

    /// Atomic: moves the reservation to a new day/time, reserving on the new
    /// counter and releasing the old one.
    async fn reschedule_reservation(
        &self,
        reservation_id: ReservationId,
        new_date: NaiveDate,
        new_time: NaiveTime,
        max_patients: i32,
    ) -> Result<Reservation, QueueError>;

    /// Confirmed reservations in `Waiting` for a doctor and day, by queue number.
    async fn list_waiting(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<Vec<Reservation>, QueueError>;

    /// Atomic: applies every queue-number assignment of the plan and flags the
    /// promoted reservation.
    async fn apply_promotion(&self, plan: &PromotionPlan) -> Result<(), QueueError>;

    /// Unstarted pending/confirmed reservations scheduled at or before `now`,
    /// with their session bounds.
    async fn find_sweep_candidates(&self, now: NaiveDateTime) -> Result<Vec<SweepCandidate>, QueueError>;

    /// Atomic: cancels every listed reservation and applies the slot releases.
    async fn apply_sweep(&self, plan: &SweepPlan) -> Result<(), QueueError>;
}
