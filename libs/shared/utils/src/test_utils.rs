use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, QueueStoreKind};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub cron_secret: String,
    pub queue_store: QueueStoreKind,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            cron_secret: "test-cron-secret".to_string(),
            queue_store: QueueStoreKind::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing at a wiremock server standing in for Supabase.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            queue_store: QueueStoreKind::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            queue_store: self.queue_store,
            clinic_utc_offset_minutes: 0,
            auto_cancel_sweep_interval_seconds: 0,
            cron_secret: self.cron_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes returned by the Supabase tables the queue reads.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn queue_settings_response(strict: bool, auto_cancel: bool) -> Value {
        json!({
            "id": 1,
            "enable_strict_check_in": strict,
            "check_in_early_minutes": 120,
            "check_in_late_minutes": 60,
            "enable_auto_cancel": auto_cancel,
            "auto_cancel_grace_minutes": 30
        })
    }

    pub fn practice_session_response(id: i64, start: &str, end: &str) -> Value {
        json!({
            "id": id,
            "name": "Morning session",
            "start_time": start,
            "end_time": end
        })
    }

    pub fn doctor_schedule_response(id: i64, doctor_id: i64, session_id: Option<i64>, max_patients: i32) -> Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "practice_session_id": session_id,
            "max_patients": max_patients,
            "is_active": true
        })
    }

    pub fn reservation_response(id: i64, schedule_id: i64, date: &str, time: &str, queue_number: i32) -> Value {
        json!({
            "id": id,
            "patient_id": 100 + id,
            "doctor_id": 1,
            "schedule_id": schedule_id,
            "reservation_date": date,
            "reservation_time": time,
            "queue_number": queue_number,
            "status": "pending",
            "examination_status": "not_started",
            "is_priority": false,
            "priority_reason": null,
            "cancellation_reason": null,
            "is_walk_in": false
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
