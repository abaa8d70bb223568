// libs/queue-cell/src/services/schedule_time.rs
use chrono::{Duration, NaiveDateTime, NaiveTime};

/// The reservation's calendar day at the session's time of day, down to the
/// sub-second part.
pub fn combine_date_and_session_time(reservation_at: NaiveDateTime, session_time: NaiveTime) -> NaiveDateTime {
    reservation_at.date().and_time(session_time)
}

/// Absolute end of the session on the reservation's day.
///
/// `None` when the session has no end time. A session whose end is not strictly
/// after its start crosses midnight and ends on the next calendar day.
pub fn session_end_date_time(
    reservation_at: NaiveDateTime,
    session_start: Option<NaiveTime>,
    session_end: Option<NaiveTime>,
) -> Option<NaiveDateTime> {
    let end_at = combine_date_and_session_time(reservation_at, session_end?);

    let Some(start) = session_start else {
        return Some(end_at);
    };

    let start_at = combine_date_and_session_time(reservation_at, start);
    if end_at > start_at {
        Some(end_at)
    } else {
        Some(end_at + Duration::days(1))
    }
}
