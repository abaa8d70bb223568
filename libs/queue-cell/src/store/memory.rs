// libs/queue-cell/src/store/memory.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::models::{
    DailyKey, DailyScheduleStatus, DoctorId, DoctorSchedule, ExaminationStatus, PracticeSession,
    PromotionPlan, QueuePolicy, Reservation, ReservationDraft, ReservationId, ReservationStatus,
    ReservationUpdate,
    ScheduleId, SessionBounds, SessionId, SweepCandidate, SweepPlan,
};
use crate::store::QueueStore;

/// Reference data an in-memory store can start from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub sessions: Vec<PracticeSession>,
    #[serde(default)]
    pub schedules: Vec<DoctorSchedule>,
}

#[derive(Debug, Default)]
struct MemoryState {
    settings: Value,
    sessions: HashMap<SessionId, PracticeSession>,
    schedules: HashMap<ScheduleId, DoctorSchedule>,
    reservations: BTreeMap<ReservationId, Reservation>,
    daily: HashMap<DailyKey, DailyScheduleStatus>,
    last_reservation_id: ReservationId,
    last_daily_id: i64,
}

impl MemoryState {
    fn counter(&mut self, key: DailyKey, max_patients: i32) -> &mut DailyScheduleStatus {
        let last_daily_id = &mut self.last_daily_id;
        self.daily.entry(key).or_insert_with(|| {
            *last_daily_id += 1;
            DailyScheduleStatus {
                id: Some(*last_daily_id),
                ..DailyScheduleStatus::new(key, max_patients)
            }
        })
    }

    fn release(&mut self, key: DailyKey, count: u32) -> i32 {
        match self.daily.get_mut(&key) {
            Some(status) => status.release(count),
            None => 0,
        }
    }

    fn reservation_mut(&mut self, reservation_id: ReservationId) -> Result<&mut Reservation, QueueError> {
        self.reservations
            .get_mut(&reservation_id)
            .ok_or(QueueError::ReservationNotFound(reservation_id))
    }
}

/// Store kept entirely in process memory. Every mutation happens under one
/// async mutex, which makes each trait method a serialized, all-or-nothing unit.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    state: Mutex<MemoryState>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: MemorySeed) -> Self {
        let state = MemoryState {
            settings: seed.settings,
            sessions: seed.sessions.into_iter().map(|s| (s.id, s)).collect(),
            schedules: seed.schedules.into_iter().map(|s| (s.id, s)).collect(),
            ..MemoryState::default()
        };
        Self { state: Mutex::new(state) }
    }

    pub async fn set_settings(&self, settings: Value) {
        self.state.lock().await.settings = settings;
    }

    pub async fn insert_session(&self, session: PracticeSession) {
        self.state.lock().await.sessions.insert(session.id, session);
    }

    pub async fn insert_schedule(&self, schedule: DoctorSchedule) {
        self.state.lock().await.schedules.insert(schedule.id, schedule);
    }

    /// Overwrites a daily counter, e.g. to reproduce a drifted count.
    pub async fn set_daily_status(&self, status: DailyScheduleStatus) {
        self.state.lock().await.daily.insert(status.key(), status);
    }

    /// Inserts a reservation as-is without touching any counter.
    pub async fn insert_reservation(&self, reservation: Reservation) {
        let mut state = self.state.lock().await;
        state.last_reservation_id = state.last_reservation_id.max(reservation.id);
        state.reservations.insert(reservation.id, reservation);
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.values().cloned().collect()
    }

    fn session_bounds(state: &MemoryState, schedule_id: ScheduleId) -> SessionBounds {
        state
            .schedules
            .get(&schedule_id)
            .and_then(|schedule| schedule.practice_session_id)
            .and_then(|session_id| state.sessions.get(&session_id))
            .map(SessionBounds::from)
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn load_policy(&self) -> Result<Value, QueueError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn save_policy(&self, policy: &QueuePolicy) -> Result<(), QueueError> {
        self.state.lock().await.settings = json!(policy);
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<DoctorSchedule>, QueueError> {
        Ok(self.state.lock().await.schedules.get(&schedule_id).cloned())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<PracticeSession>, QueueError> {
        Ok(self.state.lock().await.sessions.get(&session_id).cloned())
    }

    async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, QueueError> {
        Ok(self.state.lock().await.reservations.get(&reservation_id).cloned())
    }

    async fn get_daily_status(&self, key: DailyKey) -> Result<Option<DailyScheduleStatus>, QueueError> {
        Ok(self.state.lock().await.daily.get(&key).cloned())
    }

    async fn reserve_slot(&self, key: DailyKey, max_patients: i32) -> Result<i32, QueueError> {
        let mut state = self.state.lock().await;
        let queue_number = state.counter(key, max_patients).try_reserve(max_patients)?;
        debug!("Reserved slot {} on {}", queue_number, key);
        Ok(queue_number)
    }

    async fn release_slot(&self, key: DailyKey, count: u32) -> Result<i32, QueueError> {
        let mut state = self.state.lock().await;
        Ok(state.release(key, count))
    }

    async fn create_reservation(&self, draft: ReservationDraft, max_patients: i32) -> Result<Reservation, QueueError> {
        let mut state = self.state.lock().await;
        let queue_number = state.counter(draft.daily_key(), max_patients).try_reserve(max_patients)?;

        state.last_reservation_id += 1;
        let reservation = draft.into_reservation(state.last_reservation_id, queue_number);
        state.reservations.insert(reservation.id, reservation.clone());

        Ok(reservation)
    }

    async fn update_reservation(
        &self,
        reservation_id: ReservationId,
        update: &ReservationUpdate,
    ) -> Result<Reservation, QueueError> {
        let mut state = self.state.lock().await;
        let stored = state.reservation_mut(reservation_id)?;
        if !update.matches(stored) {
            return Err(update.conflict(stored));
        }
        update.apply_to(stored);
        Ok(stored.clone())
    }

    async fn cancel_reservation(&self, reservation_id: ReservationId, reason: String) -> Result<Reservation, QueueError> {
        let mut state = self.state.lock().await;
        let reservation = state.reservation_mut(reservation_id)?;

        if reservation.status.is_terminal() {
            return Err(QueueError::reservation_transition(reservation.status, ReservationStatus::Cancelled));
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.examination_status = ExaminationStatus::Cancelled;
        reservation.cancellation_reason = Some(reason);
        let cancelled = reservation.clone();

        state.release(cancelled.daily_key(), 1);
        Ok(cancelled)
    }

    async fn reschedule_reservation(
        &self,
        reservation_id: ReservationId,
        new_date: NaiveDate,
        new_time: NaiveTime,
        max_patients: i32,
    ) -> Result<Reservation, QueueError> {
        let mut state = self.state.lock().await;
        let current = state.reservation_mut(reservation_id)?.clone();

        if !current.status.is_active() || current.examination_status != ExaminationStatus::NotStarted {
            return Err(QueueError::AlreadyCheckedIn(reservation_id));
        }

        let old_key = current.daily_key();
        let new_key = DailyKey::new(current.schedule_id, new_date);

        let queue_number = if old_key == new_key {
            current.queue_number
        } else {
            let number = state.counter(new_key, max_patients).try_reserve(max_patients)?;
            state.release(old_key, 1);
            Some(number)
        };

        let reservation = state.reservation_mut(reservation_id)?;
        reservation.reservation_date = new_date;
        reservation.reservation_time = new_time;
        reservation.queue_number = queue_number;
        Ok(reservation.clone())
    }

    async fn list_waiting(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<Vec<Reservation>, QueueError> {
        let state = self.state.lock().await;
        let mut waiting: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.doctor_id == doctor_id && r.reservation_date == date && r.is_waiting())
            .cloned()
            .collect();
        waiting.sort_by_key(|r| (r.queue_number.is_none(), r.queue_number, r.id));
        Ok(waiting)
    }

    async fn apply_promotion(&self, plan: &PromotionPlan) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;

        // Check everything before touching anything.
        let target = state
            .reservations
            .get(&plan.reservation_id)
            .ok_or(QueueError::ReservationNotFound(plan.reservation_id))?;
        if target.is_priority {
            return Err(QueueError::AlreadyPriority(plan.reservation_id));
        }
        if !target.is_waiting() {
            return Err(QueueError::NotWaiting(plan.reservation_id));
        }
        for assignment in &plan.assignments {
            if !state.reservations.contains_key(&assignment.reservation_id) {
                warn!("Promotion plan references missing reservation {}", assignment.reservation_id);
                return Err(QueueError::Transaction(format!(
                    "reservation {} disappeared while reordering",
                    assignment.reservation_id
                )));
            }
        }

        for assignment in &plan.assignments {
            let reservation = state.reservation_mut(assignment.reservation_id)?;
            reservation.queue_number = Some(assignment.queue_number);
        }

        let target = state.reservation_mut(plan.reservation_id)?;
        target.is_priority = true;
        target.priority_reason = Some(plan.reason.clone());
        Ok(())
    }

    async fn find_sweep_candidates(&self, now: NaiveDateTime) -> Result<Vec<SweepCandidate>, QueueError> {
        let state = self.state.lock().await;
        let candidates = state
            .reservations
            .values()
            .filter(|r| r.is_sweep_candidate(now))
            .map(|r| SweepCandidate {
                reservation: r.clone(),
                session: Self::session_bounds(&state, r.schedule_id),
            })
            .collect();
        Ok(candidates)
    }

    async fn apply_sweep(&self, plan: &SweepPlan) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;

        for id in &plan.cancelled_ids {
            match state.reservations.get(id) {
                Some(r) if r.status.is_active() && r.examination_status == ExaminationStatus::NotStarted => {}
                Some(_) => {
                    return Err(QueueError::Transaction(format!(
                        "reservation {} changed state during the sweep",
                        id
                    )))
                }
                None => return Err(QueueError::ReservationNotFound(*id)),
            }
        }

        for id in &plan.cancelled_ids {
            let reservation = state.reservation_mut(*id)?;
            reservation.status = ReservationStatus::Cancelled;
            reservation.examination_status = ExaminationStatus::Cancelled;
            reservation.cancellation_reason = Some(plan.reason.clone());
        }

        for release in &plan.releases {
            state.release(DailyKey::new(release.schedule_id, release.date), release.count);
        }

        Ok(())
    }
}
