// libs/queue-cell/tests/capacity_test.rs
mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;

use common::{date, MORNING_SCHEDULE};
use queue_cell::error::QueueError;
use queue_cell::models::{DailyKey, DailyScheduleStatus};
use queue_cell::services::capacity::CapacityService;
use queue_cell::store::{InMemoryQueueStore, QueueStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_get_distinct_consecutive_numbers() {
    let store = Arc::new(InMemoryQueueStore::new());
    let n = 50;

    let handles = (0..n).map(|_| {
        let service = CapacityService::new(store.clone());
        tokio::spawn(async move { service.reserve_slot(MORNING_SCHEDULE, date(2024, 3, 1), n).await })
    });

    let numbers: Vec<i32> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let distinct: BTreeSet<i32> = numbers.iter().copied().collect();
    assert_eq!(distinct.len(), n as usize);
    assert_eq!(distinct, (1..=n).collect::<BTreeSet<i32>>());

    let status = store
        .get_daily_status(DailyKey::new(MORNING_SCHEDULE, date(2024, 3, 1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.current_reservations, n);
}

#[tokio::test]
async fn test_full_day_rejects_and_leaves_counter_unchanged() {
    let store = Arc::new(InMemoryQueueStore::new());
    let service = CapacityService::new(store.clone());
    let day = date(2024, 3, 1);

    for expected in 1..=3 {
        assert_eq!(service.reserve_slot(MORNING_SCHEDULE, day, 3).await.unwrap(), expected);
    }

    for _ in 0..5 {
        assert_matches!(
            service.reserve_slot(MORNING_SCHEDULE, day, 3).await,
            Err(QueueError::CapacityExceeded { max_patients: 3, .. })
        );
    }

    let status = service.daily_status(MORNING_SCHEDULE, day).await.unwrap().unwrap();
    assert_eq!(status.current_reservations, 3);
}

#[tokio::test]
async fn test_days_and_schedules_have_separate_counters() {
    let service = CapacityService::new(Arc::new(InMemoryQueueStore::new()));

    assert_eq!(service.reserve_slot(MORNING_SCHEDULE, date(2024, 3, 1), 1).await.unwrap(), 1);
    assert_eq!(service.reserve_slot(MORNING_SCHEDULE, date(2024, 3, 2), 1).await.unwrap(), 1);
    assert_eq!(service.reserve_slot(9, date(2024, 3, 1), 1).await.unwrap(), 1);
}

#[tokio::test]
async fn test_release_never_goes_below_zero() {
    let store = Arc::new(InMemoryQueueStore::new());
    let service = CapacityService::new(store.clone());
    let day = date(2024, 3, 1);

    service.reserve_slot(MORNING_SCHEDULE, day, 10).await.unwrap();
    service.reserve_slot(MORNING_SCHEDULE, day, 10).await.unwrap();

    assert_eq!(service.release_slot(MORNING_SCHEDULE, day, 1).await.unwrap(), 1);
    assert_eq!(service.release_slot(MORNING_SCHEDULE, day, 7).await.unwrap(), 0);
    assert_eq!(service.release_slot(MORNING_SCHEDULE, day, u32::MAX).await.unwrap(), 0);

    // Unknown day: nothing to release.
    assert_eq!(service.release_slot(MORNING_SCHEDULE, date(2030, 1, 1), 3).await.unwrap(), 0);
}

#[test]
fn test_daily_status_release_floor() {
    let mut status = DailyScheduleStatus::new(DailyKey::new(1, date(2024, 3, 1)), 5);
    status.current_reservations = 1;

    assert_eq!(status.release(2), 0);
    assert_eq!(status.release(0), 0);
    assert_eq!(status.try_reserve(5).unwrap(), 1);
}

#[tokio::test]
async fn test_each_counter_is_created_once_with_its_own_id() {
    let store = InMemoryQueueStore::new();
    let first_day = DailyKey::new(MORNING_SCHEDULE, date(2024, 3, 1));
    let second_day = DailyKey::new(MORNING_SCHEDULE, date(2024, 3, 2));

    store.reserve_slot(first_day, 8).await.unwrap();
    store.reserve_slot(first_day, 8).await.unwrap();
    store.reserve_slot(second_day, 8).await.unwrap();

    let first = store.get_daily_status(first_day).await.unwrap().unwrap();
    let second = store.get_daily_status(second_day).await.unwrap().unwrap();
    assert_eq!((first.id, first.current_reservations), (Some(1), 2));
    assert_eq!((second.id, second.current_reservations), (Some(2), 1));
}
