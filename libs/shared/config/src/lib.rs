use chrono::FixedOffset;
use std::env;
use tracing::warn;

/// Default clinic civil timezone: UTC+05:30 (no DST).
const DEFAULT_CLINIC_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub clinic_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL").unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY").unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(|| {
                    warn!(
                        "CLINIC_UTC_OFFSET_MINUTES not set, defaulting to +{} minutes",
                        DEFAULT_CLINIC_UTC_OFFSET_MINUTES
                    );
                    DEFAULT_CLINIC_UTC_OFFSET_MINUTES
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Fixed civil timezone all weekday/time-of-day evaluation happens in,
    /// independent of each request's origin timezone.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            FixedOffset::east_opt(DEFAULT_CLINIC_UTC_OFFSET_MINUTES * 60).unwrap()
        })
    }
}
