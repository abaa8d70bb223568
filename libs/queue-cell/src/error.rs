use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use shared_models::error::AppError;

use crate::models::{ExaminationStatus, ReservationId, ReservationStatus, ScheduleId};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Schedule {schedule_id} is fully booked on {date} ({max_patients} patients)")]
    CapacityExceeded { schedule_id: ScheduleId, date: NaiveDate, max_patients: i32 },

    #[error("Reservation {0} not found")]
    ReservationNotFound(ReservationId),

    #[error("Schedule {0} not found")]
    ScheduleNotFound(ScheduleId),

    #[error("Schedule {0} is not accepting reservations")]
    ScheduleInactive(ScheduleId),

    #[error("Reservation {0} is already a priority reservation")]
    AlreadyPriority(ReservationId),

    #[error("Reservation {0} is not waiting in the queue")]
    NotWaiting(ReservationId),

    #[error("Reservation {0} has already checked in")]
    AlreadyCheckedIn(ReservationId),

    #[error("Reservation cannot move from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Check-in at {attempted_at} is outside the allowed window {starts_at} - {ends_at}")]
    CheckInOutsideWindow {
        attempted_at: NaiveDateTime,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction aborted: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn reservation_transition(from: ReservationStatus, to: ReservationStatus) -> Self {
        QueueError::InvalidStatusTransition { from: from.to_string(), to: to.to_string() }
    }

    pub fn examination_transition(from: ExaminationStatus, to: ExaminationStatus) -> Self {
        QueueError::InvalidStatusTransition { from: from.to_string(), to: to.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueueError::ReservationNotFound(_)
                | QueueError::ScheduleNotFound(_)
        )
    }

    /// Rejected before any write because the record is in the wrong state.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            QueueError::ScheduleInactive(_)
                | QueueError::AlreadyPriority(_)
                | QueueError::NotWaiting(_)
                | QueueError::AlreadyCheckedIn(_)
                | QueueError::InvalidStatusTransition { .. }
                | QueueError::CheckInOutsideWindow { .. }
        )
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        let message = err.to_string();
        match err {
            QueueError::CapacityExceeded { .. } => AppError::CapacityExceeded(message),
            ref e if e.is_not_found() => AppError::NotFound(message),
            ref e if e.is_precondition_failure() => AppError::PreconditionFailed(message),
            QueueError::Database(_) => AppError::Database(message),
            _ => AppError::Internal(message),
        }
    }
}
