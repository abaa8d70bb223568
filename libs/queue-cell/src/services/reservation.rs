// libs/queue-cell/src/services/reservation.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument, warn};

use crate::error::QueueError;
use crate::models::{
    BookReservationRequest, CheckInOutcome, CheckInWindowResponse, DoctorId, DoctorSchedule,
    ExaminationStatus, PatientId, Reservation, ReservationDraft, ReservationId, ReservationStatus,
    ReservationUpdate, ScheduleId, SessionBounds, WalkInRequest,
};
use crate::services::deadline::{check_in_window, evaluate_check_in, no_show_deadline};
use crate::services::policy::PolicyService;
use crate::store::QueueStore;

pub const DEFAULT_CANCELLATION_REASON: &str = "CANCELLED_BY_STAFF";

/// Reservation lifecycle: booking, walk-ins, check-in, examination progress,
/// cancellation and rescheduling. Queue numbers always come from the daily
/// counter, so booking and numbering happen in the same store call.
pub struct ReservationService {
    store: Arc<dyn QueueStore>,
    policy_service: PolicyService,
}

impl ReservationService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            policy_service: PolicyService::new(Arc::clone(&store)),
            store,
        }
    }

    pub async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Reservation, QueueError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or(QueueError::ReservationNotFound(reservation_id))
    }

    async fn active_schedule(&self, schedule_id: ScheduleId) -> Result<DoctorSchedule, QueueError> {
        let schedule = self
            .store
            .get_schedule(schedule_id)
            .await?
            .ok_or(QueueError::ScheduleNotFound(schedule_id))?;

        if !schedule.is_active {
            return Err(QueueError::ScheduleInactive(schedule_id));
        }
        Ok(schedule)
    }

    /// Session bounds for a schedule. Missing links degrade to "no session".
    async fn session_bounds(&self, schedule_id: ScheduleId) -> Result<SessionBounds, QueueError> {
        let Some(schedule) = self.store.get_schedule(schedule_id).await? else {
            return Ok(SessionBounds::default());
        };
        let Some(session_id) = schedule.practice_session_id else {
            return Ok(SessionBounds::default());
        };

        match self.store.get_session(session_id).await? {
            Some(session) => Ok(SessionBounds::from(&session)),
            None => {
                warn!("Schedule {} points at missing session {}", schedule_id, session_id);
                Ok(SessionBounds::default())
            }
        }
    }

    fn draft(schedule: &DoctorSchedule, patient_id: PatientId, date: NaiveDate, time: NaiveTime) -> ReservationDraft {
        ReservationDraft {
            patient_id,
            doctor_id: schedule.doctor_id,
            schedule_id: schedule.id,
            reservation_date: date,
            reservation_time: time,
            status: ReservationStatus::Pending,
            examination_status: ExaminationStatus::NotStarted,
            is_walk_in: false,
        }
    }

    #[instrument(skip(self))]
    pub async fn book_reservation(&self, request: BookReservationRequest) -> Result<Reservation, QueueError> {
        let schedule = self.active_schedule(request.schedule_id).await?;

        let draft = Self::draft(&schedule, request.patient_id, request.reservation_date, request.reservation_time);
        let reservation = self.store.create_reservation(draft, schedule.max_patients).await?;

        info!(
            "Reservation {} booked for patient {} on {} with queue number {:?}",
            reservation.id, reservation.patient_id, reservation.daily_key(), reservation.queue_number
        );
        Ok(reservation)
    }

    /// A walk-in is booked for `now` and is already checked in.
    #[instrument(skip(self))]
    pub async fn register_walk_in(
        &self,
        request: WalkInRequest,
        now: NaiveDateTime,
    ) -> Result<Reservation, QueueError> {
        let schedule = self.active_schedule(request.schedule_id).await?;

        let draft = ReservationDraft {
            status: ReservationStatus::Confirmed,
            examination_status: ExaminationStatus::Waiting,
            is_walk_in: true,
            ..Self::draft(&schedule, request.patient_id, now.date(), now.time())
        };
        let reservation = self.store.create_reservation(draft, schedule.max_patients).await?;

        info!("Walk-in {} registered with queue number {:?}", reservation.id, reservation.queue_number);
        Ok(reservation)
    }

    /// Check-in window and no-show deadline under the current policy.
    pub async fn check_in_window_for(
        &self,
        reservation_id: ReservationId,
    ) -> Result<CheckInWindowResponse, QueueError> {
        let reservation = self.get_reservation(reservation_id).await?;
        let policy = self.policy_service.load_policy().await?;
        let session = self.session_bounds(reservation.schedule_id).await?;

        let reservation_at = reservation.scheduled_at();
        Ok(CheckInWindowResponse {
            reservation_id,
            window: check_in_window(reservation_at, session.start, session.end, &policy),
            no_show_deadline: no_show_deadline(
                reservation_at,
                session.start,
                session.end,
                policy.check_in_late_minutes,
                policy.auto_cancel_grace_minutes,
            ),
            strict: policy.enable_strict_check_in,
        })
    }

    /// Marks the patient as arrived. Under strict check-in an attempt outside
    /// the window is rejected and nothing is written.
    #[instrument(skip(self))]
    pub async fn check_in(
        &self,
        reservation_id: ReservationId,
        at: NaiveDateTime,
    ) -> Result<CheckInOutcome, QueueError> {
        let reservation = self.get_reservation(reservation_id).await?;

        if reservation.status.is_terminal() {
            return Err(QueueError::reservation_transition(reservation.status, ReservationStatus::Confirmed));
        }
        if reservation.examination_status != ExaminationStatus::NotStarted {
            return Err(QueueError::AlreadyCheckedIn(reservation_id));
        }

        let policy = self.policy_service.load_policy().await?;
        let session = self.session_bounds(reservation.schedule_id).await?;
        let window = check_in_window(reservation.scheduled_at(), session.start, session.end, &policy);
        let within_window = evaluate_check_in(&policy, &window, at)?;

        if !within_window {
            debug!("Reservation {} checked in outside its window (non-strict)", reservation_id);
        }

        let reservation = self
            .store
            .update_reservation(reservation_id, &ReservationUpdate::check_in())
            .await?;

        info!("Reservation {} checked in at {}", reservation_id, at);
        Ok(CheckInOutcome {
            reservation,
            window,
            within_window,
            strict: policy.enable_strict_check_in,
        })
    }

    /// Moves a checked-in reservation through the examination flow. Completing
    /// the examination completes the reservation too. Patients enter the
    /// waiting list only through `check_in`.
    #[instrument(skip(self))]
    pub async fn transition_examination(
        &self,
        reservation_id: ReservationId,
        target: ExaminationStatus,
    ) -> Result<Reservation, QueueError> {
        if target == ExaminationStatus::Cancelled {
            return self.cancel_reservation(reservation_id, None).await;
        }

        let reservation = self.get_reservation(reservation_id).await?;
        let current = reservation.examination_status;

        if reservation.status.is_terminal() || !current.can_transition_to(&target) {
            return Err(QueueError::examination_transition(current, target));
        }

        let updated = self
            .store
            .update_reservation(reservation_id, &ReservationUpdate::examination(current, target))
            .await?;
        debug!("Reservation {} examination is now {}", reservation_id, target);
        Ok(updated)
    }

    /// Cancels and gives the slot back to the daily counter in one store call.
    #[instrument(skip(self))]
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        reason: Option<String>,
    ) -> Result<Reservation, QueueError> {
        let reservation = self.get_reservation(reservation_id).await?;
        if reservation.status.is_terminal() {
            return Err(QueueError::reservation_transition(reservation.status, ReservationStatus::Cancelled));
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());

        let cancelled = self.store.cancel_reservation(reservation_id, reason).await?;
        info!("Reservation {} cancelled, slot released on {}", reservation_id, cancelled.daily_key());
        Ok(cancelled)
    }

    /// Moves a not-yet-arrived reservation to another day or time on the same
    /// schedule. Changing the day moves its slot between daily counters.
    #[instrument(skip(self))]
    pub async fn reschedule_reservation(
        &self,
        reservation_id: ReservationId,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<Reservation, QueueError> {
        let reservation = self.get_reservation(reservation_id).await?;
        if !reservation.status.is_active() {
            return Err(QueueError::reservation_transition(reservation.status, ReservationStatus::Pending));
        }
        if reservation.examination_status != ExaminationStatus::NotStarted {
            return Err(QueueError::AlreadyCheckedIn(reservation_id));
        }

        let schedule = self.active_schedule(reservation.schedule_id).await?;
        let updated = self
            .store
            .reschedule_reservation(reservation_id, new_date, new_time, schedule.max_patients)
            .await?;

        info!(
            "Reservation {} rescheduled to {} {}",
            reservation_id, updated.reservation_date, updated.reservation_time
        );
        Ok(updated)
    }

    /// Checked-in patients for a doctor on a day, in call order.
    pub async fn waiting_queue(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<Vec<Reservation>, QueueError> {
        self.store.list_waiting(doctor_id, date).await
    }
}
