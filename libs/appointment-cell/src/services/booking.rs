use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::availability::evaluate_slots;
use doctor_cell::services::DoctorService;
use patient_cell::models::Patient;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentStatus,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::policy;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    doctor_service: DoctorService,
    patient_service: PatientService,
    clinic_offset: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.clinic_offset())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, clinic_offset: FixedOffset) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            doctor_service: DoctorService::with_client(Arc::clone(&supabase)),
            patient_service: PatientService::with_client(Arc::clone(&supabase)),
            supabase,
            clinic_offset,
        }
    }

    /// Book a new appointment. Validates the request, resolves the doctor,
    /// lazily creates the caller's patient profile when none exists, then
    /// runs the availability and conflict checks before inserting the row
    /// with status `pending`.
    pub async fn create_appointment(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let role = actor_role(user)?;
        if !policy::can_create(role) {
            return Err(AppointmentError::Forbidden(
                "Not authorized to book appointments".to_string(),
            ));
        }

        if request.reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Appointment reason is required".to_string(),
            ));
        }

        if request.date < Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment date cannot be in the past".to_string(),
            ));
        }

        let doctor = self
            .doctor_service
            .get_doctor(request.doctor_id, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or_else(|| AppointmentError::NotFound("Doctor not found".to_string()))?;

        let patient = self
            .patient_service
            .ensure_patient_for_user(user, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        self.check_availability(&doctor, request.date)?;

        if let Some(conflicting) = self
            .conflict_service
            .find_conflict(doctor.id, request.date, None, auth_token)
            .await?
        {
            return Err(AppointmentError::SchedulingConflict(format!(
                "Doctor already has an appointment at {} within 15 minutes of the requested time",
                conflicting.date.to_rfc3339()
            )));
        }

        let row = json!({
            "patient_id": patient.id,
            "doctor_id": doctor.id,
            "date": request.date.to_rfc3339(),
            "reason": request.reason.trim(),
            "status": AppointmentStatus::Pending,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(row),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Internal("Failed to create appointment".to_string()))?;

        let appointment: Appointment = serde_json::from_value(created)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))?;

        info!(
            "Booked appointment {} for patient {} with doctor {} at {}",
            appointment.id, patient.id, doctor.id, appointment.date
        );

        Ok(AppointmentDetails {
            appointment,
            patient,
            doctor,
        })
    }

    /// List appointments visible to the caller. Admins see every booking;
    /// patients and doctors only their own. Rows whose patient or doctor
    /// record has since been deleted are skipped with a warning rather than
    /// failing the whole listing.
    pub async fn list_appointments(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let role = actor_role(user)?;
        let user_id = actor_uuid(user)?;

        let path = match role {
            Role::Admin => "/rest/v1/appointments?order=date.desc".to_string(),
            Role::Patient => {
                let patient = self
                    .patient_service
                    .get_patient_by_user(user_id, auth_token)
                    .await
                    .map_err(|e| AppointmentError::Database(e.to_string()))?
                    .ok_or_else(|| {
                        AppointmentError::NotFound("Patient profile not found".to_string())
                    })?;
                format!(
                    "/rest/v1/appointments?patient_id=eq.{}&order=date.desc",
                    patient.id
                )
            }
            Role::Doctor => {
                let doctor = self
                    .doctor_service
                    .get_doctor_by_user(user_id, auth_token)
                    .await
                    .map_err(|e| AppointmentError::Database(e.to_string()))?
                    .ok_or_else(|| {
                        AppointmentError::NotFound("Doctor profile not found".to_string())
                    })?;
                format!(
                    "/rest/v1/appointments?doctor_id=eq.{}&order=date.desc",
                    doctor.id
                )
            }
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointments: {}", e)))?;

        if appointments.is_empty() {
            return Ok(vec![]);
        }

        let patients = self
            .fetch_patients_by_id(&appointments, auth_token)
            .await?;
        let doctors = self.fetch_doctors_by_id(&appointments, auth_token).await?;

        let mut details = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let (Some(patient), Some(doctor)) = (
                patients.get(&appointment.patient_id),
                doctors.get(&appointment.doctor_id),
            ) else {
                warn!(
                    "Skipping appointment {} with dangling patient or doctor reference",
                    appointment.id
                );
                continue;
            };

            details.push(AppointmentDetails {
                appointment,
                patient: patient.clone(),
                doctor: doctor.clone(),
            });
        }

        Ok(details)
    }

    /// Fetch one appointment with its joined records, enforcing the access
    /// policy before returning it.
    pub async fn get_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let details = self.load_details(appointment_id, auth_token).await?;
        self.authorize(user, &details)?;
        Ok(details)
    }

    /// Apply a partial update. A date change re-runs the availability check
    /// and the conflict check (excluding this appointment's own slot); a
    /// status change is gated by role and by the transition table.
    pub async fn update_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let role = actor_role(user)?;
        let details = self.load_details(appointment_id, auth_token).await?;
        self.authorize(user, &details)?;

        let mut update_data = serde_json::Map::new();

        if let Some(date) = request.date {
            if date < Utc::now() {
                return Err(AppointmentError::Validation(
                    "Appointment date cannot be in the past".to_string(),
                ));
            }

            self.check_availability(&details.doctor, date)?;

            if let Some(conflicting) = self
                .conflict_service
                .find_conflict(details.doctor.id, date, Some(appointment_id), auth_token)
                .await?
            {
                return Err(AppointmentError::SchedulingConflict(format!(
                    "Doctor already has an appointment at {} within 15 minutes of the requested time",
                    conflicting.date.to_rfc3339()
                )));
            }

            update_data.insert("date".to_string(), json!(date.to_rfc3339()));
        }

        if let Some(reason) = request.reason {
            if reason.trim().is_empty() {
                return Err(AppointmentError::Validation(
                    "Appointment reason cannot be empty".to_string(),
                ));
            }
            update_data.insert("reason".to_string(), json!(reason.trim()));
        }

        if let Some(status) = request.status {
            if !policy::can_set_status(role, status) {
                return Err(AppointmentError::Forbidden(
                    "Patients can only cancel appointments".to_string(),
                ));
            }
            policy::validate_transition(details.appointment.status, status)?;
            update_data.insert("status".to_string(), json!(status));
        }

        if update_data.is_empty() {
            return Ok(details);
        }

        let appointment = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        Ok(AppointmentDetails {
            appointment,
            patient: details.patient,
            doctor: details.doctor,
        })
    }

    /// Cancel an appointment. Cancelling an already-cancelled appointment is
    /// a no-op; cancelling a completed one is rejected by the transition
    /// table.
    pub async fn cancel_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let details = self.load_details(appointment_id, auth_token).await?;
        self.authorize(user, &details)?;

        if details.appointment.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} is already cancelled", appointment_id);
            return Ok(details);
        }

        policy::validate_transition(details.appointment.status, AppointmentStatus::Cancelled)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(AppointmentStatus::Cancelled));

        let appointment = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        info!("Cancelled appointment {}", appointment_id);

        Ok(AppointmentDetails {
            appointment,
            patient: details.patient,
            doctor: details.doctor,
        })
    }

    fn authorize(
        &self,
        user: &User,
        details: &AppointmentDetails,
    ) -> Result<(), AppointmentError> {
        let role = actor_role(user)?;
        let user_id = actor_uuid(user)?;

        if policy::can_access(
            role,
            user_id,
            details.patient.user_id,
            details.doctor.user_id,
        ) {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(
                "Not authorized to access this appointment".to_string(),
            ))
        }
    }

    /// Availability denials are scheduling conflicts, not malformed input.
    fn check_availability(
        &self,
        doctor: &Doctor,
        date: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if doctor.availability.is_empty() {
            return Err(AppointmentError::SchedulingConflict(
                "Doctor not found or has no availability".to_string(),
            ));
        }

        let decision = evaluate_slots(&doctor.availability, date, self.clinic_offset);
        if decision.allowed {
            Ok(())
        } else {
            Err(AppointmentError::SchedulingConflict(
                decision.reason.unwrap_or_else(|| {
                    "Doctor is not available at the specified time".to_string()
                }),
            ))
        }
    }

    async fn load_details(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))?;

        let patient = self
            .patient_service
            .get_patient(appointment.patient_id, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppointmentError::Internal(format!(
                    "Appointment {} references a missing patient record",
                    appointment.id
                ))
            })?;

        let doctor = self
            .doctor_service
            .get_doctor(appointment.doctor_id, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppointmentError::Internal(format!(
                    "Appointment {} references a missing doctor record",
                    appointment.id
                ))
            })?;

        Ok(AppointmentDetails {
            appointment,
            patient,
            doctor,
        })
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        mut update_data: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let updated = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))?;

        serde_json::from_value(updated)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch_patients_by_id(
        &self,
        appointments: &[Appointment],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Patient>, AppointmentError> {
        let ids = appointments
            .iter()
            .map(|a| a.patient_id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!("/rest/v1/patients?id=in.({})", ids);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let patients = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()
            .map_err(|e| AppointmentError::Database(format!("Failed to parse patients: {}", e)))?;

        Ok(patients.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn fetch_doctors_by_id(
        &self,
        appointments: &[Appointment],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Doctor>, AppointmentError> {
        let ids = appointments
            .iter()
            .map(|a| a.doctor_id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!("/rest/v1/doctors?id=in.({})", ids);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let doctors = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| AppointmentError::Database(format!("Failed to parse doctors: {}", e)))?;

        Ok(doctors.into_iter().map(|d| (d.id, d)).collect())
    }
}

fn actor_role(user: &User) -> Result<Role, AppointmentError> {
    user.role_kind()
        .ok_or_else(|| AppointmentError::Forbidden("Invalid user role".to_string()))
}

fn actor_uuid(user: &User) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppointmentError::Unauthenticated("Invalid user ID in token".to_string()))
}
