use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{weekday_name, AvailabilitySlot, Doctor};

/// Outcome of an availability check. `reason` is set on denial and is safe to
/// surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AvailabilityDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decide whether `instant` falls inside the doctor's recurring weekly
/// schedule. The instant is converted from UTC into the clinic's fixed civil
/// timezone before the weekday and minute-of-day are derived.
///
/// Only the first slot matching the weekday is consulted; multiple slots on
/// the same day are not merged into a union of ranges.
pub fn evaluate_slots(
    slots: &[AvailabilitySlot],
    instant: DateTime<Utc>,
    clinic_offset: FixedOffset,
) -> AvailabilityDecision {
    let local = instant.with_timezone(&clinic_offset);
    let weekday = local.weekday();
    let candidate_minutes = local.hour() * 60 + local.minute();

    let Some(slot) = slots.iter().find(|slot| slot.day == weekday) else {
        return AvailabilityDecision::deny(format!(
            "Doctor is not available on {}",
            weekday_name(weekday)
        ));
    };

    let start_minutes = slot.start_minutes();
    let end_minutes = slot.end_minutes();

    let within = if start_minutes < end_minutes {
        // Same-day window: half-open interval [start, end).
        candidate_minutes >= start_minutes && candidate_minutes < end_minutes
    } else {
        // Window spans midnight (e.g. 22:00 to 02:00).
        candidate_minutes >= start_minutes || candidate_minutes < end_minutes
    };

    if within {
        AvailabilityDecision::allow()
    } else {
        AvailabilityDecision::deny(format!(
            "Doctor is not available at the specified time. Available hours on {}: {} to {}",
            weekday_name(weekday),
            slot.start_time.format("%H:%M"),
            slot.end_time.format("%H:%M"),
        ))
    }
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    clinic_offset: FixedOffset,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            clinic_offset: config.clinic_offset(),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, clinic_offset: FixedOffset) -> Self {
        Self {
            supabase,
            clinic_offset,
        }
    }

    /// Resolve the doctor from the store and evaluate the candidate instant
    /// against their weekly schedule. An unresolvable doctor or an empty
    /// availability list denies immediately with a distinct reason.
    pub async fn check_doctor_availability(
        &self,
        doctor_id: Uuid,
        instant: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AvailabilityDecision> {
        debug!("Checking availability for doctor {} at {}", doctor_id, instant);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(AvailabilityDecision::deny(
                "Doctor not found or has no availability",
            ));
        };

        let doctor: Doctor = serde_json::from_value(row)?;
        if doctor.availability.is_empty() {
            return Ok(AvailabilityDecision::deny(
                "Doctor not found or has no availability",
            ));
        }

        Ok(evaluate_slots(
            &doctor.availability,
            instant,
            self.clinic_offset,
        ))
    }
}
