// libs/queue-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::json;

use queue_cell::models::{
    DoctorSchedule, ExaminationStatus, PracticeSession, Reservation, ReservationStatus,
};
use queue_cell::store::{InMemoryQueueStore, MemorySeed};

pub const DOCTOR_ID: i64 = 1;
pub const MORNING_SCHEDULE: i64 = 5;
pub const INACTIVE_SCHEDULE: i64 = 6;
pub const NIGHT_SCHEDULE: i64 = 7;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    date(y, mo, d).and_time(time(h, mi))
}

/// Morning session 08:00-12:00 and a night session 22:00-02:00.
pub fn clinic_seed(settings: serde_json::Value, max_patients: i32) -> MemorySeed {
    MemorySeed {
        settings,
        sessions: vec![
            PracticeSession {
                id: 1,
                name: Some("Morning".to_string()),
                start_time: Some(time(8, 0)),
                end_time: Some(time(12, 0)),
            },
            PracticeSession {
                id: 2,
                name: Some("Night".to_string()),
                start_time: Some(time(22, 0)),
                end_time: Some(time(2, 0)),
            },
        ],
        schedules: vec![
            DoctorSchedule {
                id: MORNING_SCHEDULE,
                doctor_id: DOCTOR_ID,
                practice_session_id: Some(1),
                max_patients,
                is_active: true,
            },
            DoctorSchedule {
                id: INACTIVE_SCHEDULE,
                doctor_id: DOCTOR_ID,
                practice_session_id: Some(1),
                max_patients,
                is_active: false,
            },
            DoctorSchedule {
                id: NIGHT_SCHEDULE,
                doctor_id: 2,
                practice_session_id: Some(2),
                max_patients,
                is_active: true,
            },
        ],
    }
}

pub fn default_store() -> Arc<InMemoryQueueStore> {
    Arc::new(InMemoryQueueStore::from_seed(clinic_seed(json!({}), 8)))
}

pub fn store_with_settings(settings: serde_json::Value) -> Arc<InMemoryQueueStore> {
    Arc::new(InMemoryQueueStore::from_seed(clinic_seed(settings, 8)))
}

pub fn reservation(id: i64, queue_number: i32, examination_status: ExaminationStatus) -> Reservation {
    let status = match examination_status {
        ExaminationStatus::NotStarted => ReservationStatus::Pending,
        _ => ReservationStatus::Confirmed,
    };

    Reservation {
        id,
        patient_id: 100 + id,
        doctor_id: DOCTOR_ID,
        schedule_id: MORNING_SCHEDULE,
        reservation_date: date(2024, 3, 1),
        reservation_time: time(10, 0),
        queue_number: Some(queue_number),
        status,
        examination_status,
        is_priority: false,
        priority_reason: None,
        cancellation_reason: None,
        is_walk_in: false,
    }
}
