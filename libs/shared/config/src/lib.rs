use std::env;

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStoreKind {
    Memory,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub queue_store: QueueStoreKind,
    /// Offset of the clinic's wall clock from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
    /// 0 disables the in-process auto-cancel worker.
    pub auto_cancel_sweep_interval_seconds: u64,
    pub cron_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            queue_store: match env::var("QUEUE_STORE").as_deref() {
                Ok("supabase") => QueueStoreKind::Supabase,
                Ok("memory") => QueueStoreKind::Memory,
                Ok(other) => {
                    warn!("Unknown QUEUE_STORE '{}', using in-memory store", other);
                    QueueStoreKind::Memory
                }
                Err(_) => {
                    warn!("QUEUE_STORE not set, using in-memory store");
                    QueueStoreKind::Memory
                }
            },
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.trim().parse::<i32>().ok())
                .filter(|minutes| minutes.abs() < 24 * 60)
                .unwrap_or_else(|| {
                    warn!("CLINIC_UTC_OFFSET_MINUTES not set or invalid, using UTC");
                    0
                }),
            auto_cancel_sweep_interval_seconds: env::var("AUTO_CANCEL_SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or_else(|| {
                    warn!("AUTO_CANCEL_SWEEP_INTERVAL_SECONDS not set, using default");
                    300
                }),
            cron_secret: env::var("CRON_SECRET")
                .unwrap_or_else(|_| {
                    warn!("CRON_SECRET not set, sweep endpoint will reject all callers");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.queue_store {
            QueueStoreKind::Memory => auth_ready,
            QueueStoreKind::Supabase => auth_ready && self.is_supabase_configured(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && (!self.supabase_service_role_key.is_empty() || !self.supabase_anon_key.is_empty())
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Current wall-clock time at the clinic.
    pub fn clinic_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.clinic_offset()).naive_local()
    }
}
