use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use shared_config::{AppConfig, QueueStoreKind};
use shared_models::{auth::User, error::AppError};
use shared_utils::extractor::{require_admin, require_patient_or_operator, require_queue_operator};

use crate::models::{
    BookReservationRequest, CancelReservationRequest, CheckInOutcome, CheckInWindowResponse,
    DailyKey, DailyScheduleStatus, DoctorId, ExaminationTransitionRequest, PriorityUpdateRequest,
    QueuePolicy, Reservation, ReservationId, RescheduleReservationRequest, ScheduleId,
    SweepOutcome, WaitingQueueQuery, WalkInRequest,
};
use crate::services::{
    normalize_policy, AutoCancelService, CapacityService, PolicyService, QueueReorderService,
    ReservationService,
};
use crate::store::{InMemoryQueueStore, MemorySeed, QueueStore, SupabaseQueueStore};

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Clone)]
pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn QueueStore>,
}

impl QueueState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn QueueStore>) -> Self {
        Self { config, store }
    }

    /// Picks the store named by `QUEUE_STORE`. The in-memory store can be
    /// seeded from the JSON file at `QUEUE_SEED_PATH`.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let store: Arc<dyn QueueStore> = match config.queue_store {
            QueueStoreKind::Supabase => Arc::new(SupabaseQueueStore::new(&config)),
            QueueStoreKind::Memory => Arc::new(InMemoryQueueStore::from_seed(load_seed())),
        };
        Self { config, store }
    }
}

fn load_seed() -> MemorySeed {
    let Ok(path) = std::env::var("QUEUE_SEED_PATH") else {
        return MemorySeed::default();
    };

    match std::fs::read_to_string(&path).map(|raw| serde_json::from_str::<MemorySeed>(&raw)) {
        Ok(Ok(seed)) => {
            info!(
                "Loaded queue seed from {} ({} schedules, {} sessions)",
                path,
                seed.schedules.len(),
                seed.sessions.len()
            );
            seed
        }
        Ok(Err(e)) => {
            warn!("Queue seed {} is not valid JSON: {}", path, e);
            MemorySeed::default()
        }
        Err(e) => {
            warn!("Could not read queue seed {}: {}", path, e);
            MemorySeed::default()
        }
    }
}

/// Loads the reservation only when the caller is not staff, to check that the
/// patient owns it.
async fn authorize_reservation(
    service: &ReservationService,
    user: &User,
    reservation_id: ReservationId,
) -> Result<(), AppError> {
    if user.is_queue_operator() {
        return Ok(());
    }
    let reservation = service.get_reservation(reservation_id).await?;
    require_patient_or_operator(user, &reservation.patient_id.to_string())
}

// ==============================================================================
// POLICY
// ==============================================================================

pub async fn get_policy(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
) -> Result<Json<QueuePolicy>, AppError> {
    require_queue_operator(&user)?;
    let policy = PolicyService::new(state.store).load_policy().await?;
    Ok(Json(policy))
}

pub async fn update_policy(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Json(raw): Json<Value>,
) -> Result<Json<QueuePolicy>, AppError> {
    require_admin(&user)?;
    info!("Queue policy update from user: {}", user.id);
    let policy = PolicyService::new(state.store).update_policy(&raw).await?;
    Ok(Json(policy))
}

/// Shows what a settings payload would normalize to, without saving it.
pub async fn preview_policy(
    Extension(user): Extension<User>,
    Json(raw): Json<Value>,
) -> Result<Json<QueuePolicy>, AppError> {
    require_queue_operator(&user)?;
    Ok(Json(normalize_policy(&raw)))
}

// ==============================================================================
// RESERVATIONS
// ==============================================================================

pub async fn book_reservation(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    require_patient_or_operator(&user, &request.patient_id.to_string())?;
    info!("Booking request for patient {} from user: {}", request.patient_id, user.id);
    let reservation = ReservationService::new(state.store).book_reservation(request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn register_walk_in(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Json(request): Json<WalkInRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    require_queue_operator(&user)?;
    let reservation = ReservationService::new(state.store)
        .register_walk_in(request, state.config.clinic_now())
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn check_in(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<CheckInOutcome>, AppError> {
    require_queue_operator(&user)?;
    let outcome = ReservationService::new(state.store)
        .check_in(reservation_id, state.config.clinic_now())
        .await?;
    Ok(Json(outcome))
}

pub async fn get_check_in_window(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<CheckInWindowResponse>, AppError> {
    let service = ReservationService::new(state.store);
    authorize_reservation(&service, &user, reservation_id).await?;
    let window = service.check_in_window_for(reservation_id).await?;
    Ok(Json(window))
}

pub async fn transition_examination(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
    Json(request): Json<ExaminationTransitionRequest>,
) -> Result<Json<Reservation>, AppError> {
    require_queue_operator(&user)?;
    let reservation = ReservationService::new(state.store)
        .transition_examination(reservation_id, request.status)
        .await?;
    Ok(Json(reservation))
}

pub async fn cancel_reservation(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
    Json(request): Json<CancelReservationRequest>,
) -> Result<Json<Reservation>, AppError> {
    let service = ReservationService::new(state.store);
    authorize_reservation(&service, &user, reservation_id).await?;
    info!("Cancel request for reservation {} from user: {}", reservation_id, user.id);
    let reservation = service.cancel_reservation(reservation_id, request.reason).await?;
    Ok(Json(reservation))
}

pub async fn reschedule_reservation(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
    Json(request): Json<RescheduleReservationRequest>,
) -> Result<Json<Reservation>, AppError> {
    let service = ReservationService::new(state.store);
    authorize_reservation(&service, &user, reservation_id).await?;
    info!("Reschedule request for reservation {} from user: {}", reservation_id, user.id);
    let reservation = service
        .reschedule_reservation(reservation_id, request.reservation_date, request.reservation_time)
        .await?;
    Ok(Json(reservation))
}

pub async fn update_priority(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(reservation_id): Path<ReservationId>,
    Json(request): Json<PriorityUpdateRequest>,
) -> Result<Json<Reservation>, AppError> {
    require_queue_operator(&user)?;
    if request.is_priority.is_none() && request.priority_reason.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let reservation = QueueReorderService::new(state.store)
        .update_priority(reservation_id, request.is_priority, request.priority_reason)
        .await?;
    Ok(Json(reservation))
}

// ==============================================================================
// QUEUE VIEWS
// ==============================================================================

pub async fn waiting_queue(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<DoctorId>,
    Query(query): Query<WaitingQueueQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    require_queue_operator(&user)?;
    let waiting = ReservationService::new(state.store)
        .waiting_queue(doctor_id, query.date)
        .await?;
    Ok(Json(waiting))
}

/// Counter for one schedule and day. A day nobody has booked yet reports zero.
pub async fn daily_status(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path((schedule_id, date)): Path<(ScheduleId, NaiveDate)>,
) -> Result<Json<DailyScheduleStatus>, AppError> {
    require_queue_operator(&user)?;

    if let Some(status) = CapacityService::new(Arc::clone(&state.store))
        .daily_status(schedule_id, date)
        .await?
    {
        return Ok(Json(status));
    }

    let schedule = state
        .store
        .get_schedule(schedule_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", schedule_id)))?;

    Ok(Json(DailyScheduleStatus::new(
        DailyKey::new(schedule_id, date),
        schedule.max_patients,
    )))
}

// ==============================================================================
// SWEEP
// ==============================================================================

/// Cron entry point. Authenticated by a shared secret instead of a user token.
pub async fn run_sweep(
    State(state): State<QueueState>,
    headers: HeaderMap,
) -> Result<Json<SweepOutcome>, AppError> {
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if state.config.cron_secret.is_empty() || provided != state.config.cron_secret {
        warn!("Rejected sweep trigger with missing or wrong cron secret");
        return Err(AppError::Auth("Invalid cron secret".to_string()));
    }

    let outcome = AutoCancelService::new(state.store)
        .run_auto_cancel_sweep(state.config.clinic_now())
        .await?;
    Ok(Json(outcome))
}
