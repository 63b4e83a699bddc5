use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use patient_cell::models::Patient;
use shared_models::error::AppError;

/// A scheduled consultation between one patient and one doctor.
///
/// `date` is the start instant in UTC; availability checks interpret it in
/// the clinic's civil timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Cancelled appointments do not block the surrounding time window.
    pub fn blocks_schedule(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
    pub reason: String,
}

/// Partial update; any combination of fields may be present. A `date` change
/// re-runs the availability and conflict checks; a `status` change is gated
/// by role and by the transition table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub status: Option<AppointmentStatus>,
}

/// An appointment joined with the full patient and doctor records, as
/// returned by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Patient,
    pub doctor: Doctor,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Scheduling conflict: {0}")]
    SchedulingConflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Unauthenticated(msg) => AppError::Auth(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::Validation(msg) => AppError::BadRequest(msg),
            AppointmentError::SchedulingConflict(msg) => AppError::Conflict(msg),
            AppointmentError::Database(msg) => AppError::Database(msg),
            AppointmentError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
        assert_eq!(
            serde_json::to_value(AppointmentStatus::Cancelled).unwrap(),
            serde_json::json!("cancelled")
        );
    }

    #[test]
    fn cancelled_does_not_block_schedule() {
        assert!(AppointmentStatus::Pending.blocks_schedule());
        assert!(AppointmentStatus::Confirmed.blocks_schedule());
        assert!(AppointmentStatus::Completed.blocks_schedule());
        assert!(!AppointmentStatus::Cancelled.blocks_schedule());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!AppointmentStatus::Pending.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
    }
}
