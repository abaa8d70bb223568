// libs/queue-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::QueueError;
use crate::models::{
    DailyKey, DailyScheduleStatus, DoctorId, DoctorSchedule, PracticeSession, PromotionPlan,
    QueuePolicy, Reservation, ReservationDraft, ReservationId, ReservationUpdate, ScheduleId,
    SessionBounds, SessionId, SweepCandidate, SweepPlan,
};
use crate::store::QueueStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result envelope returned by the queue's Postgres functions. Each function
/// runs in a single transaction and reports business failures through
/// `status` instead of raising, so nothing is written when it is not `ok`.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RpcOutcome<T> {
    Ok { data: T },
    CapacityExceeded { schedule_id: ScheduleId, date: NaiveDate, max_patients: i32 },
    NotFound { reservation_id: ReservationId },
    InvalidState { reservation_id: ReservationId, message: String },
}

impl<T> RpcOutcome<T> {
    fn into_result(self) -> Result<T, QueueError> {
        match self {
            RpcOutcome::Ok { data } => Ok(data),
            RpcOutcome::CapacityExceeded { schedule_id, date, max_patients } => {
                Err(QueueError::CapacityExceeded { schedule_id, date, max_patients })
            }
            RpcOutcome::NotFound { reservation_id } => Err(QueueError::ReservationNotFound(reservation_id)),
            RpcOutcome::InvalidState { reservation_id, message } => {
                debug!("Reservation {} rejected by database: {}", reservation_id, message);
                Err(QueueError::InvalidStatusTransition {
                    from: format!("reservation {}", reservation_id),
                    to: message,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionEmbed {
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize)]
struct ScheduleEmbed {
    practice_sessions: Option<SessionEmbed>,
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    #[serde(flatten)]
    reservation: Reservation,
    doctor_schedules: Option<ScheduleEmbed>,
}

impl From<CandidateRow> for SweepCandidate {
    fn from(row: CandidateRow) -> Self {
        let session = row
            .doctor_schedules
            .and_then(|schedule| schedule.practice_sessions)
            .map(|session| SessionBounds { start: session.start_time, end: session.end_time })
            .unwrap_or_default();

        SweepCandidate { reservation: row.reservation, session }
    }
}

/// Queue storage backed by Supabase. Reads go through PostgREST; every
/// multi-row write is a single Postgres function call.
pub struct SupabaseQueueStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseQueueStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::with_service_role(config)),
        }
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, QueueError> {
        self.supabase
            .select_one(path, None)
            .await
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, QueueError> {
        self.supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(&self, function: &str, args: Value) -> Result<T, QueueError> {
        let outcome: RpcOutcome<T> = self.supabase.rpc(function, args, None).await.map_err(|e| {
            error!("Queue function {} failed: {}", function, e);
            QueueError::Transaction(format!("{}: {}", function, e))
        })?;
        outcome.into_result()
    }
}

#[async_trait]
impl QueueStore for SupabaseQueueStore {
    async fn load_policy(&self) -> Result<Value, QueueError> {
        let row: Option<Value> = self.fetch_one("/rest/v1/queue_settings?select=*&order=id.asc&limit=1").await?;
        Ok(row.unwrap_or(Value::Null))
    }

    async fn save_policy(&self, policy: &QueuePolicy) -> Result<(), QueueError> {
        let _: Value = self.call("save_queue_settings", json!({ "p_settings": policy })).await?;
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<DoctorSchedule>, QueueError> {
        self.fetch_one(&format!("/rest/v1/doctor_schedules?id=eq.{}&select=*", schedule_id)).await
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<PracticeSession>, QueueError> {
        self.fetch_one(&format!("/rest/v1/practice_sessions?id=eq.{}&select=*", session_id)).await
    }

    async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, QueueError> {
        self.fetch_one(&format!("/rest/v1/reservations?id=eq.{}&select=*", reservation_id)).await
    }

    async fn get_daily_status(&self, key: DailyKey) -> Result<Option<DailyScheduleStatus>, QueueError> {
        self.fetch_one(&format!(
            "/rest/v1/daily_schedule_status?schedule_id=eq.{}&date=eq.{}&select=*",
            key.schedule_id,
            key.date.format(DATE_FORMAT)
        ))
        .await
    }

    async fn reserve_slot(&self, key: DailyKey, max_patients: i32) -> Result<i32, QueueError> {
        self.call(
            "reserve_daily_slot",
            json!({
                "p_schedule_id": key.schedule_id,
                "p_date": key.date.format(DATE_FORMAT).to_string(),
                "p_max_patients": max_patients
            }),
        )
        .await
    }

    async fn release_slot(&self, key: DailyKey, count: u32) -> Result<i32, QueueError> {
        self.call(
            "release_daily_slots",
            json!({
                "p_schedule_id": key.schedule_id,
                "p_date": key.date.format(DATE_FORMAT).to_string(),
                "p_count": count
            }),
        )
        .await
    }

    async fn create_reservation(&self, draft: ReservationDraft, max_patients: i32) -> Result<Reservation, QueueError> {
        self.call(
            "book_reservation",
            json!({ "p_reservation": draft, "p_max_patients": max_patients }),
        )
        .await
    }

    async fn update_reservation(
        &self,
        reservation_id: ReservationId,
        update: &ReservationUpdate,
    ) -> Result<Reservation, QueueError> {
        let mut path = format!("/rest/v1/reservations?id=eq.{}", reservation_id);
        if let Some(expected) = update.expected_examination_status {
            path.push_str(&format!("&examination_status=eq.{}", expected));
        }
        let body = serde_json::to_value(update)?;

        let rows: Vec<Reservation> = self
            .supabase
            .request(Method::PATCH, &path, None, Some(body))
            .await
            .map_err(|e| QueueError::Database(e.to_string()))?;

        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or its status moved on.
        match self.get_reservation(reservation_id).await? {
            Some(current) => Err(update.conflict(&current)),
            None => Err(QueueError::ReservationNotFound(reservation_id)),
        }
    }

    async fn cancel_reservation(&self, reservation_id: ReservationId, reason: String) -> Result<Reservation, QueueError> {
        self.call(
            "cancel_reservation",
            json!({ "p_reservation_id": reservation_id, "p_reason": reason }),
        )
        .await
    }

    async fn reschedule_reservation(
        &self,
        reservation_id: ReservationId,
        new_date: NaiveDate,
        new_time: NaiveTime,
        max_patients: i32,
    ) -> Result<Reservation, QueueError> {
        self.call(
            "reschedule_reservation",
            json!({
                "p_reservation_id": reservation_id,
                "p_date": new_date.format(DATE_FORMAT).to_string(),
                "p_time": new_time.format("%H:%M:%S").to_string(),
                "p_max_patients": max_patients
            }),
        )
        .await
    }

    async fn list_waiting(&self, doctor_id: DoctorId, date: NaiveDate) -> Result<Vec<Reservation>, QueueError> {
        self.fetch_all(&format!(
            "/rest/v1/reservations?doctor_id=eq.{}&reservation_date=eq.{}&status=eq.confirmed&examination_status=eq.waiting&order=queue_number.asc.nullslast,id.asc&select=*",
            doctor_id,
            date.format(DATE_FORMAT)
        ))
        .await
    }

    async fn apply_promotion(&self, plan: &PromotionPlan) -> Result<(), QueueError> {
        let updated: usize = self
            .call(
                "apply_priority_promotion",
                json!({
                    "p_reservation_id": plan.reservation_id,
                    "p_reason": plan.reason,
                    "p_assignments": plan.assignments
                }),
            )
            .await?;
        debug!("Priority promotion renumbered {} reservations", updated);
        Ok(())
    }

    async fn find_sweep_candidates(&self, now: NaiveDateTime) -> Result<Vec<SweepCandidate>, QueueError> {
        let rows: Vec<CandidateRow> = self
            .fetch_all(&format!(
                "/rest/v1/reservations?select=*,doctor_schedules(practice_sessions(start_time,end_time))&status=in.(pending,confirmed)&examination_status=eq.not_started&reservation_date=lte.{}&order=id.asc",
                now.date().format(DATE_FORMAT)
            ))
            .await?;

        Ok(rows
            .into_iter()
            .map(SweepCandidate::from)
            .filter(|candidate| candidate.reservation.is_sweep_candidate(now))
            .collect())
    }

    async fn apply_sweep(&self, plan: &SweepPlan) -> Result<(), QueueError> {
        let cancelled: usize = self
            .call(
                "apply_no_show_sweep",
                json!({
                    "p_reservation_ids": plan.cancelled_ids,
                    "p_reason": plan.reason,
                    "p_releases": plan.releases
                }),
            )
            .await?;

        if cancelled != plan.cancelled_ids.len() {
            // The function rolls back on mismatch, so this only fires on a contract bug.
            error!("Sweep cancelled {} rows, expected {}", cancelled, plan.cancelled_ids.len());
            return Err(QueueError::Transaction("no-show sweep row count mismatch".to_string()));
        }
        Ok(())
    }
}
