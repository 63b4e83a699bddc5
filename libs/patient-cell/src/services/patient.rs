use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_models::auth::User;

use crate::models::{CreatePatientRequest, Patient, UpdatePatientRequest};

pub struct PatientService {
    supabase: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Explicit profile creation by the patient; demographics are required
    /// here, so the profile starts complete.
    pub async fn create_patient(
        &self,
        user: &User,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        let user_id = Uuid::parse_str(&user.id).map_err(|_| anyhow!("Invalid user ID"))?;

        if self.get_patient_by_user(user_id, auth_token).await?.is_some() {
            return Err(anyhow!("Patient profile already exists"));
        }

        let row = json!({
            "user_id": user_id,
            "full_name": user.display_name(),
            "email": user.email.clone().unwrap_or_default(),
            "date_of_birth": request.date_of_birth,
            "gender": request.gender,
            "phone": request.phone,
            "address": request.address,
            "medical_history": request.medical_history,
            "profile_complete": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.insert_row(row, auth_token).await
    }

    /// Resolve the caller's patient profile, creating an incomplete one when
    /// none exists yet. Used by appointment creation so any authenticated
    /// actor can book; no placeholder demographics are written.
    pub async fn ensure_patient_for_user(&self, user: &User, auth_token: &str) -> Result<Patient> {
        let user_id = Uuid::parse_str(&user.id).map_err(|_| anyhow!("Invalid user ID"))?;

        if let Some(existing) = self.get_patient_by_user(user_id, auth_token).await? {
            return Ok(existing);
        }

        info!(
            "Lazily creating incomplete patient profile for user {}",
            user_id
        );

        let row = json!({
            "user_id": user_id,
            "full_name": user.display_name(),
            "email": user.email.clone().unwrap_or_default(),
            "date_of_birth": null,
            "gender": null,
            "phone": null,
            "address": null,
            "medical_history": null,
            "profile_complete": false,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.insert_row(row, auth_token).await
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Option<Patient>> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_patient_by_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn list_patients(&self, auth_token: &str) -> Result<Vec<Patient>> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/patients?order=full_name.asc",
                Some(auth_token),
                None,
            )
            .await?;

        let patients = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Patient>, _>>()?;

        Ok(patients)
    }

    /// Apply a partial update. Flips `profile_complete` once the stored
    /// profile has both date of birth and gender after the merge.
    pub async fn update_patient(
        &self,
        patient: &Patient,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Updating patient profile {}", patient.id);

        let mut update_data = serde_json::Map::new();
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(medical_history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(medical_history));
        }

        let will_be_complete = (patient.date_of_birth.is_some()
            || update_data.contains_key("date_of_birth"))
            && (patient.gender.is_some() || update_data.contains_key("gender"));
        update_data.insert("profile_complete".to_string(), json!(will_be_complete));
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient.id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await?;

        let updated = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Patient not found"))?;

        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<()> {
        debug!("Deleting patient profile {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    /// Whether the doctor behind `doctor_user_id` shares at least one
    /// appointment with the patient. Gates doctor access to patient records.
    pub async fn has_appointment_with_doctor(
        &self,
        patient_id: Uuid,
        doctor_user_id: Uuid,
        auth_token: &str,
    ) -> Result<bool> {
        let doctor_path = format!("/rest/v1/doctors?user_id=eq.{}", doctor_user_id);
        let doctors: Vec<Value> = self
            .supabase
            .request(Method::GET, &doctor_path, Some(auth_token), None)
            .await?;

        let Some(doctor_id) = doctors
            .first()
            .and_then(|row| row.get("id"))
            .and_then(|id| id.as_str())
        else {
            return Ok(false);
        };

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&patient_id=eq.{}&limit=1",
            doctor_id, patient_id
        );
        let appointments: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(!appointments.is_empty())
    }

    async fn insert_row(&self, row: Value, auth_token: &str) -> Result<Patient> {
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(row),
                Some(return_representation()),
            )
            .await?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create patient profile"))?;

        Ok(serde_json::from_value(created)?)
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Option<Patient>> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }
}
