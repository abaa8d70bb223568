// libs/queue-cell/tests/reservation_test.rs
mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::{at, date, time, DOCTOR_ID, INACTIVE_SCHEDULE, MORNING_SCHEDULE};
use queue_cell::error::QueueError;
use queue_cell::models::{
    BookReservationRequest, DailyKey, DoctorSchedule, ExaminationStatus, ReservationStatus,
    ReservationUpdate, WalkInRequest,
};
use queue_cell::services::reservation::{ReservationService, DEFAULT_CANCELLATION_REASON};
use queue_cell::store::QueueStore;

fn booking(patient_id: i64, schedule_id: i64) -> BookReservationRequest {
    BookReservationRequest {
        patient_id,
        schedule_id,
        reservation_date: date(2024, 3, 1),
        reservation_time: time(10, 0),
    }
}

async fn counter(store: &dyn QueueStore, schedule_id: i64, day: chrono::NaiveDate) -> i32 {
    store
        .get_daily_status(DailyKey::new(schedule_id, day))
        .await
        .unwrap()
        .map(|s| s.current_reservations)
        .unwrap_or(0)
}

#[tokio::test]
async fn test_booking_assigns_sequential_queue_numbers() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());

    let first = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    let second = service.book_reservation(booking(2, MORNING_SCHEDULE)).await.unwrap();

    assert_eq!(first.queue_number, Some(1));
    assert_eq!(second.queue_number, Some(2));
    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.examination_status, ExaminationStatus::NotStarted);
    assert_eq!(first.doctor_id, DOCTOR_ID);
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 1)).await, 2);
}

#[tokio::test]
async fn test_booking_a_full_day_fails_without_inserting() {
    let store = std::sync::Arc::new(queue_cell::store::InMemoryQueueStore::from_seed(
        common::clinic_seed(json!({}), 1),
    ));
    let service = ReservationService::new(store.clone());

    service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    assert_matches!(
        service.book_reservation(booking(2, MORNING_SCHEDULE)).await,
        Err(QueueError::CapacityExceeded { .. })
    );
    assert_eq!(store.reservations().await.len(), 1);
}

#[tokio::test]
async fn test_booking_rejects_unknown_or_inactive_schedules() {
    let service = ReservationService::new(common::default_store());

    assert_matches!(
        service.book_reservation(booking(1, 404)).await,
        Err(QueueError::ScheduleNotFound(404))
    );
    assert_matches!(
        service.book_reservation(booking(1, INACTIVE_SCHEDULE)).await,
        Err(QueueError::ScheduleInactive(id)) if id == INACTIVE_SCHEDULE
    );
}

#[tokio::test]
async fn test_walk_in_is_already_waiting() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());

    service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    let walk_in = service
        .register_walk_in(WalkInRequest { patient_id: 9, schedule_id: MORNING_SCHEDULE }, at(2024, 3, 1, 9, 15))
        .await
        .unwrap();

    assert!(walk_in.is_walk_in);
    assert_eq!(walk_in.queue_number, Some(2));
    assert_eq!(walk_in.reservation_time, time(9, 15));
    assert!(walk_in.is_waiting());
}

#[tokio::test]
async fn test_strict_check_in_scenario_without_session() {
    let store = common::store_with_settings(json!({
        "checkInEarlyMinutes": 120,
        "checkInLateMinutes": 60,
        "enableStrictCheckIn": true
    }));
    store
        .insert_schedule(DoctorSchedule {
            id: 20,
            doctor_id: DOCTOR_ID,
            practice_session_id: None,
            max_patients: 10,
            is_active: true,
        })
        .await;
    let service = ReservationService::new(store.clone());

    let mut ids = Vec::new();
    for patient in 1..=4 {
        ids.push(service.book_reservation(booking(patient, 20)).await.unwrap().id);
    }

    let window = service.check_in_window_for(ids[0]).await.unwrap();
    assert_eq!(window.window.starts_at, at(2024, 3, 1, 8, 0));
    assert_eq!(window.window.ends_at, at(2024, 3, 1, 11, 0));
    assert!(window.strict);

    assert_matches!(
        service.check_in(ids[0], at(2024, 3, 1, 7, 59)).await,
        Err(QueueError::CheckInOutsideWindow { .. })
    );
    assert_matches!(
        service.check_in(ids[1], at(2024, 3, 1, 11, 1)).await,
        Err(QueueError::CheckInOutsideWindow { .. })
    );
    assert_matches!(service.check_in(ids[2], at(2024, 3, 1, 8, 0)).await, Ok(o) if o.within_window);
    assert_matches!(service.check_in(ids[3], at(2024, 3, 1, 11, 0)).await, Ok(o) if o.within_window);

    // Rejected attempts wrote nothing.
    let rejected = store.get_reservation(ids[0]).await.unwrap().unwrap();
    assert_eq!(rejected.examination_status, ExaminationStatus::NotStarted);
    assert_eq!(rejected.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_examination_transition_cannot_stand_in_for_check_in() {
    let store = common::store_with_settings(json!({ "enableStrictCheckIn": true }));
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();

    assert_matches!(
        service.check_in(booked.id, at(2024, 3, 1, 5, 0)).await,
        Err(QueueError::CheckInOutsideWindow { .. })
    );
    assert_matches!(
        service.transition_examination(booked.id, ExaminationStatus::Waiting).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );

    let stored = store.get_reservation(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Pending);
    assert_eq!(stored.examination_status, ExaminationStatus::NotStarted);
}

#[tokio::test]
async fn test_check_in_write_refuses_a_reservation_cancelled_after_the_read() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();

    service.cancel_reservation(booked.id, None).await.unwrap();

    assert_matches!(
        store.update_reservation(booked.id, &ReservationUpdate::check_in()).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );
    let stored = store.get_reservation(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
    assert_eq!(stored.examination_status, ExaminationStatus::Cancelled);
}

#[tokio::test]
async fn test_non_strict_late_check_in_is_recorded() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();

    let outcome = service.check_in(booked.id, at(2024, 3, 1, 11, 45)).await.unwrap();

    assert!(!outcome.within_window);
    assert!(!outcome.strict);
    assert_eq!(outcome.reservation.status, ReservationStatus::Confirmed);
    assert_eq!(outcome.reservation.examination_status, ExaminationStatus::Waiting);

    assert_matches!(
        service.check_in(booked.id, at(2024, 3, 1, 11, 50)).await,
        Err(QueueError::AlreadyCheckedIn(_))
    );
}

#[tokio::test]
async fn test_examination_flow_through_payment_to_completion() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();

    assert_matches!(
        service.transition_examination(booked.id, ExaminationStatus::InProgress).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );

    service.check_in(booked.id, at(2024, 3, 1, 9, 30)).await.unwrap();
    service.transition_examination(booked.id, ExaminationStatus::InProgress).await.unwrap();
    service
        .transition_examination(booked.id, ExaminationStatus::WaitingForPayment)
        .await
        .unwrap();
    let done = service.transition_examination(booked.id, ExaminationStatus::Completed).await.unwrap();

    assert_eq!(done.examination_status, ExaminationStatus::Completed);
    assert_eq!(done.status, ReservationStatus::Completed);

    assert_matches!(
        service.transition_examination(booked.id, ExaminationStatus::Waiting).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        service.cancel_reservation(booked.id, None).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_cancel_releases_the_slot_once() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    service.book_reservation(booking(2, MORNING_SCHEDULE)).await.unwrap();

    let cancelled = service.cancel_reservation(booked.id, Some("  ".to_string())).await.unwrap();

    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(cancelled.examination_status, ExaminationStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some(DEFAULT_CANCELLATION_REASON));
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 1)).await, 1);

    assert_matches!(
        service.cancel_reservation(booked.id, None).await,
        Err(QueueError::InvalidStatusTransition { .. })
    );
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 1)).await, 1);
}

#[tokio::test]
async fn test_reschedule_moves_the_slot_between_days() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();

    let same_day = service
        .reschedule_reservation(booked.id, date(2024, 3, 1), time(11, 0))
        .await
        .unwrap();
    assert_eq!(same_day.queue_number, Some(1));
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 1)).await, 1);

    let moved = service
        .reschedule_reservation(booked.id, date(2024, 3, 4), time(9, 0))
        .await
        .unwrap();
    assert_eq!(moved.reservation_date, date(2024, 3, 4));
    assert_eq!(moved.queue_number, Some(1));
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 1)).await, 0);
    assert_eq!(counter(&*store, MORNING_SCHEDULE, date(2024, 3, 4)).await, 1);
}

#[tokio::test]
async fn test_checked_in_reservations_cannot_be_rescheduled() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());
    let booked = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    service.check_in(booked.id, at(2024, 3, 1, 9, 30)).await.unwrap();

    assert_matches!(
        service.reschedule_reservation(booked.id, date(2024, 3, 4), time(9, 0)).await,
        Err(QueueError::AlreadyCheckedIn(_))
    );
}

#[tokio::test]
async fn test_waiting_queue_lists_checked_in_patients_in_order() {
    let store = common::default_store();
    let service = ReservationService::new(store.clone());

    let a = service.book_reservation(booking(1, MORNING_SCHEDULE)).await.unwrap();
    let b = service.book_reservation(booking(2, MORNING_SCHEDULE)).await.unwrap();
    let c = service.book_reservation(booking(3, MORNING_SCHEDULE)).await.unwrap();
    service.check_in(c.id, at(2024, 3, 1, 9, 0)).await.unwrap();
    service.check_in(a.id, at(2024, 3, 1, 9, 5)).await.unwrap();

    let waiting = service.waiting_queue(DOCTOR_ID, date(2024, 3, 1)).await.unwrap();
    let ids: Vec<i64> = waiting.iter().map(|r| r.id).collect();

    assert_eq!(ids, vec![a.id, c.id]);
    assert!(!ids.contains(&b.id));
}
