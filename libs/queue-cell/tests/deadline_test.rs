// libs/queue-cell/tests/deadline_test.rs
mod common;

use assert_matches::assert_matches;
use chrono::Duration;

use common::{at, time};
use queue_cell::error::QueueError;
use queue_cell::models::QueuePolicy;
use queue_cell::services::deadline::{check_in_window, evaluate_check_in, no_show_deadline};

fn strict_policy() -> QueuePolicy {
    QueuePolicy {
        enable_strict_check_in: true,
        check_in_early_minutes: 120,
        check_in_late_minutes: 60,
        ..QueuePolicy::default()
    }
}

#[test]
fn test_without_session_end_only_the_late_limit_applies() {
    let reservation_at = at(2024, 3, 1, 10, 0);

    for late in [0, 1, 60, 1440] {
        assert_eq!(
            no_show_deadline(reservation_at, Some(time(8, 0)), None, late, 30),
            reservation_at + Duration::minutes(i64::from(late))
        );
    }
    assert_eq!(no_show_deadline(reservation_at, None, None, 60, 0), at(2024, 3, 1, 11, 0));
}

#[test]
fn test_session_end_plus_grace_wins_when_earlier() {
    // Session ends 12:00, grace 30 -> 12:30 beats 11:30 + 60.
    let deadline = no_show_deadline(at(2024, 3, 1, 11, 30), Some(time(8, 0)), Some(time(12, 0)), 60, 30);
    assert_eq!(deadline, at(2024, 3, 1, 12, 30));
}

#[test]
fn test_late_limit_wins_when_earlier() {
    let deadline = no_show_deadline(at(2024, 3, 1, 9, 0), Some(time(8, 0)), Some(time(12, 0)), 60, 30);
    assert_eq!(deadline, at(2024, 3, 1, 10, 0));
}

#[test]
fn test_night_session_deadline_runs_into_next_day() {
    let deadline = no_show_deadline(at(2024, 3, 1, 23, 30), Some(time(22, 0)), Some(time(2, 0)), 240, 15);
    assert_eq!(deadline, at(2024, 3, 2, 2, 15));
}

#[test]
fn test_strict_window_boundaries() {
    let policy = strict_policy();
    let window = check_in_window(at(2024, 3, 1, 10, 0), None, None, &policy);

    assert_eq!(window.starts_at, at(2024, 3, 1, 8, 0));
    assert_eq!(window.ends_at, at(2024, 3, 1, 11, 0));

    assert_matches!(evaluate_check_in(&policy, &window, at(2024, 3, 1, 8, 0)), Ok(true));
    assert_matches!(evaluate_check_in(&policy, &window, at(2024, 3, 1, 11, 0)), Ok(true));
    assert_matches!(
        evaluate_check_in(&policy, &window, at(2024, 3, 1, 7, 59)),
        Err(QueueError::CheckInOutsideWindow { .. })
    );
    assert_matches!(
        evaluate_check_in(&policy, &window, at(2024, 3, 1, 11, 1)),
        Err(QueueError::CheckInOutsideWindow { .. })
    );
}

#[test]
fn test_non_strict_window_is_advisory() {
    let policy = QueuePolicy { enable_strict_check_in: false, ..strict_policy() };
    let window = check_in_window(at(2024, 3, 1, 10, 0), None, None, &policy);

    assert_matches!(evaluate_check_in(&policy, &window, at(2024, 3, 1, 6, 0)), Ok(false));
    assert_matches!(evaluate_check_in(&policy, &window, at(2024, 3, 1, 9, 0)), Ok(true));
}
