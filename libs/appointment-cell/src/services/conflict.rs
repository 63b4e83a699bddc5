use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};

/// Half-width of the exclusion window around an appointment start. Two
/// bookings for the same doctor closer than this are a conflict.
pub const CONFLICT_WINDOW_MINUTES: i64 = 15;

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Look for a non-cancelled appointment for `doctor_id` starting within
    /// the symmetric window around `candidate`. The same window applies to
    /// both creation and rescheduling; rescheduling passes its own id via
    /// `exclude_appointment_id` so an appointment never conflicts with
    /// itself.
    pub async fn find_conflict(
        &self,
        doctor_id: Uuid,
        candidate: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
        let window_start = candidate - window;
        let window_end = candidate + window;

        debug!(
            "Checking conflicts for doctor {} between {} and {}",
            doctor_id, window_start, window_end
        );

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=gte.{}", urlencoding::encode(&window_start.to_rfc3339())),
            format!("date=lte.{}", urlencoding::encode(&window_end.to_rfc3339())),
            "status=neq.cancelled".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=date.asc&limit=1",
            query_parts.join("&")
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let conflicting: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))?;

        warn!(
            "Conflict detected for doctor {}: appointment {} at {}",
            doctor_id, conflicting.id, conflicting.date
        );

        Ok(Some(conflicting))
    }
}
