// libs/queue-cell/src/services/deadline.rs
use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::QueueError;
use crate::models::{CheckInWindow, QueuePolicy};
use crate::services::schedule_time::session_end_date_time;

fn minutes(value: u32) -> Duration {
    Duration::minutes(i64::from(value))
}

/// Moment after which a reservation counts as a no-show.
///
/// The earlier of the patient's own late-arrival limit and the session end plus
/// grace. Without session data only the late-arrival limit applies.
pub fn no_show_deadline(
    reservation_at: NaiveDateTime,
    session_start: Option<NaiveTime>,
    session_end: Option<NaiveTime>,
    check_in_late_minutes: u32,
    auto_cancel_grace_minutes: u32,
) -> NaiveDateTime {
    let appointment_late_deadline = reservation_at + minutes(check_in_late_minutes);

    match session_end_date_time(reservation_at, session_start, session_end) {
        None => appointment_late_deadline,
        Some(session_end_at) => {
            let session_grace_deadline = session_end_at + minutes(auto_cancel_grace_minutes);
            appointment_late_deadline.min(session_grace_deadline)
        }
    }
}

pub fn check_in_window(
    reservation_at: NaiveDateTime,
    session_start: Option<NaiveTime>,
    session_end: Option<NaiveTime>,
    policy: &QueuePolicy,
) -> CheckInWindow {
    CheckInWindow {
        starts_at: reservation_at - minutes(policy.check_in_early_minutes),
        ends_at: no_show_deadline(
            reservation_at,
            session_start,
            session_end,
            policy.check_in_late_minutes,
            policy.auto_cancel_grace_minutes,
        ),
    }
}

/// Applies the window under strict check-in. Outside strict mode the window is
/// advisory and this returns whether the attempt fell inside it.
pub fn evaluate_check_in(
    policy: &QueuePolicy,
    window: &CheckInWindow,
    at: NaiveDateTime,
) -> Result<bool, QueueError> {
    let within_window = window.contains(at);

    if policy.enable_strict_check_in && !within_window {
        debug!("Strict check-in rejected at {} (window {} - {})", at, window.starts_at, window.ends_at);
        return Err(QueueError::CheckInOutsideWindow {
            attempted_at: at,
            starts_at: window.starts_at,
            ends_at: window.ends_at,
        });
    }

    Ok(within_window)
}
