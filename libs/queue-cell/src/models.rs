// libs/queue-cell/src/models.rs
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

pub type ReservationId = i64;
pub type ScheduleId = i64;
pub type SessionId = i64;
pub type DoctorId = i64;
pub type PatientId = i64;

// ==============================================================================
// POLICY
// ==============================================================================

pub const MAX_POLICY_MINUTES: u32 = 1440;
pub const DEFAULT_CHECK_IN_EARLY_MINUTES: u32 = 120;
pub const DEFAULT_CHECK_IN_LATE_MINUTES: u32 = 60;
pub const DEFAULT_AUTO_CANCEL_GRACE_MINUTES: u32 = 30;

/// Clinic-wide queue policy. Only ever built through `normalize_policy`, so every
/// minutes field is inside [0, 1440].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    pub enable_strict_check_in: bool,
    pub check_in_early_minutes: u32,
    pub check_in_late_minutes: u32,
    pub enable_auto_cancel: bool,
    pub auto_cancel_grace_minutes: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            enable_strict_check_in: false,
            check_in_early_minutes: DEFAULT_CHECK_IN_EARLY_MINUTES,
            check_in_late_minutes: DEFAULT_CHECK_IN_LATE_MINUTES,
            enable_auto_cancel: false,
            auto_cancel_grace_minutes: DEFAULT_AUTO_CANCEL_GRACE_MINUTES,
        }
    }
}

// ==============================================================================
// SCHEDULES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: SessionId,
    pub name: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: ScheduleId,
    pub doctor_id: DoctorId,
    pub practice_session_id: Option<SessionId>,
    pub max_patients: i32,
    pub is_active: bool,
}

/// Start and end of the practice session a reservation belongs to, if known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBounds {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl From<&PracticeSession> for SessionBounds {
    fn from(session: &PracticeSession) -> Self {
        Self {
            start: session.start_time,
            end: session.end_time,
        }
    }
}

// ==============================================================================
// RESERVATIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "pending"),
            ReservationStatus::Confirmed => write!(f, "confirmed"),
            ReservationStatus::Completed => write!(f, "completed"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Where the patient is inside the clinic. `NotStarted` replaces the nullable
/// column the table used to carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExaminationStatus {
    #[default]
    NotStarted,
    Waiting,
    InProgress,
    WaitingForPayment,
    Completed,
    Cancelled,
}

impl ExaminationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExaminationStatus::Completed | ExaminationStatus::Cancelled)
    }

    /// Staff-driven moves only. Entering `Waiting` goes through check-in,
    /// which enforces the check-in window.
    pub fn can_transition_to(&self, target: &ExaminationStatus) -> bool {
        use ExaminationStatus::*;
        match (self, target) {
            (Waiting, InProgress) => true,
            (InProgress, WaitingForPayment) => true,
            (InProgress, Completed) => true,
            (WaitingForPayment, Completed) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExaminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExaminationStatus::NotStarted => write!(f, "not_started"),
            ExaminationStatus::Waiting => write!(f, "waiting"),
            ExaminationStatus::InProgress => write!(f, "in_progress"),
            ExaminationStatus::WaitingForPayment => write!(f, "waiting_for_payment"),
            ExaminationStatus::Completed => write!(f, "completed"),
            ExaminationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn examination_status_or_not_started<'de, D>(deserializer: D) -> Result<ExaminationStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ExaminationStatus>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub schedule_id: ScheduleId,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub queue_number: Option<i32>,
    pub status: ReservationStatus,
    #[serde(default, deserialize_with = "examination_status_or_not_started")]
    pub examination_status: ExaminationStatus,
    #[serde(default)]
    pub is_priority: bool,
    pub priority_reason: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub is_walk_in: bool,
}

impl Reservation {
    /// Clinic-local moment the reservation is booked for. The only place the
    /// separate date and time columns are joined.
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.reservation_date.and_time(self.reservation_time)
    }

    pub fn daily_key(&self) -> DailyKey {
        DailyKey::new(self.schedule_id, self.reservation_date)
    }

    /// Checked in and waiting to be called.
    pub fn is_waiting(&self) -> bool {
        self.status == ReservationStatus::Confirmed
            && self.examination_status == ExaminationStatus::Waiting
    }

    /// Eligible for the no-show sweep once its deadline passes.
    pub fn is_sweep_candidate(&self, now: NaiveDateTime) -> bool {
        self.status.is_active()
            && self.examination_status == ExaminationStatus::NotStarted
            && self.scheduled_at() <= now
    }
}

/// Field-level change to one stored reservation. `None` fields are left as
/// they are, and the queue number is never part of an update: only counters,
/// promotions and reschedules assign it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReservationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReservationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examination_status: Option<ExaminationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_priority: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_reason: Option<Option<String>>,
    /// The write only happens while the stored examination status still equals this.
    #[serde(skip)]
    pub expected_examination_status: Option<ExaminationStatus>,
}

impl ReservationUpdate {
    /// Pending/confirmed and not started becomes confirmed and waiting.
    pub fn check_in() -> Self {
        Self {
            status: Some(ReservationStatus::Confirmed),
            examination_status: Some(ExaminationStatus::Waiting),
            expected_examination_status: Some(ExaminationStatus::NotStarted),
            ..Self::default()
        }
    }

    pub fn examination(from: ExaminationStatus, to: ExaminationStatus) -> Self {
        Self {
            status: (to == ExaminationStatus::Completed).then_some(ReservationStatus::Completed),
            examination_status: Some(to),
            expected_examination_status: Some(from),
            ..Self::default()
        }
    }

    /// Whether the stored row may take this update.
    pub fn matches(&self, current: &Reservation) -> bool {
        self.expected_examination_status
            .map_or(true, |expected| current.examination_status == expected)
    }

    pub fn apply_to(&self, reservation: &mut Reservation) {
        if let Some(status) = self.status {
            reservation.status = status;
        }
        if let Some(examination_status) = self.examination_status {
            reservation.examination_status = examination_status;
        }
        if let Some(is_priority) = self.is_priority {
            reservation.is_priority = is_priority;
        }
        if let Some(reason) = &self.priority_reason {
            reservation.priority_reason = reason.clone();
        }
    }

    /// Error for a row that no longer matches the expected examination status.
    pub fn conflict(&self, current: &Reservation) -> QueueError {
        QueueError::InvalidStatusTransition {
            from: current.examination_status.to_string(),
            to: self
                .examination_status
                .unwrap_or(current.examination_status)
                .to_string(),
        }
    }
}

/// Everything needed to insert a reservation except its id and queue number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub schedule_id: ScheduleId,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub status: ReservationStatus,
    pub examination_status: ExaminationStatus,
    pub is_walk_in: bool,
}

impl ReservationDraft {
    pub fn daily_key(&self) -> DailyKey {
        DailyKey::new(self.schedule_id, self.reservation_date)
    }

    pub fn into_reservation(self, id: ReservationId, queue_number: i32) -> Reservation {
        Reservation {
            id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            schedule_id: self.schedule_id,
            reservation_date: self.reservation_date,
            reservation_time: self.reservation_time,
            queue_number: Some(queue_number),
            status: self.status,
            examination_status: self.examination_status,
            is_priority: false,
            priority_reason: None,
            cancellation_reason: None,
            is_walk_in: self.is_walk_in,
        }
    }
}

// ==============================================================================
// DAILY CAPACITY
// ==============================================================================

/// Counter key. The date is a calendar date, never a timestamp, so every
/// reservation on the same day lands on the same counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailyKey {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
}

impl DailyKey {
    pub fn new(schedule_id: ScheduleId, date: NaiveDate) -> Self {
        Self { schedule_id, date }
    }
}

impl fmt::Display for DailyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.schedule_id, self.date.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScheduleStatus {
    pub id: Option<i64>,
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub current_reservations: i32,
    pub max_patients: i32,
    pub is_active: bool,
}

impl DailyScheduleStatus {
    pub fn new(key: DailyKey, max_patients: i32) -> Self {
        Self {
            id: None,
            schedule_id: key.schedule_id,
            date: key.date,
            current_reservations: 0,
            max_patients,
            is_active: true,
        }
    }

    pub fn key(&self) -> DailyKey {
        DailyKey::new(self.schedule_id, self.date)
    }

    pub fn has_capacity(&self, max_patients: i32) -> bool {
        self.current_reservations < max_patients
    }

    /// Takes the next slot and returns it as the queue number. Leaves the
    /// counter untouched when the day is full.
    pub fn try_reserve(&mut self, max_patients: i32) -> Result<i32, QueueError> {
        self.max_patients = max_patients;
        if !self.has_capacity(max_patients) {
            return Err(QueueError::CapacityExceeded {
                schedule_id: self.schedule_id,
                date: self.date,
                max_patients,
            });
        }
        self.current_reservations += 1;
        Ok(self.current_reservations)
    }

    /// Gives back `count` slots, never going below zero. Returns the new count.
    pub fn release(&mut self, count: u32) -> i32 {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        self.current_reservations = self.current_reservations.saturating_sub(count).max(0);
        self.current_reservations
    }
}

// ==============================================================================
// CHECK-IN
// ==============================================================================

/// Inclusive range in which a patient may check in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInWindow {
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

impl CheckInWindow {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.starts_at && at <= self.ends_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub reservation: Reservation,
    pub window: CheckInWindow,
    pub within_window: bool,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInWindowResponse {
    pub reservation_id: ReservationId,
    pub window: CheckInWindow,
    pub no_show_deadline: NaiveDateTime,
    pub strict: bool,
}

// ==============================================================================
// PRIORITY REORDERING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAssignment {
    pub reservation_id: ReservationId,
    pub queue_number: i32,
}

/// Full renumbering of one doctor's waiting list for a day. Applied as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionPlan {
    pub reservation_id: ReservationId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub reason: String,
    pub assignments: Vec<QueueAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub reservation_id: ReservationId,
    pub new_queue_number: i32,
    pub reordered: usize,
}

// ==============================================================================
// AUTO-CANCEL SWEEP
// ==============================================================================

pub const NO_SHOW_REASON: &str = "NO_SHOW";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCandidate {
    pub reservation: Reservation,
    pub session: SessionBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRelease {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub cancelled_ids: Vec<ReservationId>,
    pub releases: Vec<SlotRelease>,
    pub reason: String,
}

impl SweepPlan {
    pub fn is_empty(&self) -> bool {
        self.cancelled_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub processed: usize,
    pub cancelled: usize,
    pub cancelled_ids: Vec<ReservationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSkipped {
    pub skipped: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepOutcome {
    Skipped(SweepSkipped),
    Completed(SweepReport),
}

impl SweepOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SweepOutcome::Skipped(_))
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookReservationRequest {
    pub patient_id: PatientId,
    pub schedule_id: ScheduleId,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkInRequest {
    pub patient_id: PatientId,
    pub schedule_id: ScheduleId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaminationTransitionRequest {
    pub status: ExaminationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReservationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleReservationRequest {
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityUpdateRequest {
    pub is_priority: Option<bool>,
    pub priority_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingQueueQuery {
    pub date: NaiveDate,
}
