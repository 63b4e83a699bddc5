use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{CreateDoctorRequest, Doctor, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: Arc<SupabaseClient>,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Onboard a doctor profile for an existing identity-store user.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Creating doctor profile for user {}", request.user_id);

        if request.full_name.trim().is_empty()
            || request.email.trim().is_empty()
            || request.department.trim().is_empty()
            || request.license_number.trim().is_empty()
        {
            return Err(anyhow!(
                "Name, email, department, and license number are required"
            ));
        }

        if self
            .get_doctor_by_user(request.user_id, auth_token)
            .await?
            .is_some()
        {
            return Err(anyhow!("Doctor profile already exists for this user"));
        }

        let row = json!({
            "user_id": request.user_id,
            "full_name": request.full_name,
            "email": request.email,
            "phone": request.phone,
            "department": request.department,
            "license_number": request.license_number,
            "availability": request.availability,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(row),
                Some(return_representation()),
            )
            .await?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create doctor profile"))?;

        let doctor: Doctor = serde_json::from_value(created)?;
        debug!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Option<Doctor>> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_doctor_by_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Doctor>> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn list_doctors(&self, auth_token: &str) -> Result<Vec<Doctor>> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/doctors?order=full_name.asc",
                Some(auth_token),
                None,
            )
            .await?;

        let doctors = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Doctor>, _>>()?;

        Ok(doctors)
    }

    /// Apply a partial update; each omitted field keeps its previous value.
    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor profile {}", doctor_id);

        let mut update_data = serde_json::Map::new();
        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(department) = request.department {
            update_data.insert("department".to_string(), json!(department));
        }
        if let Some(license_number) = request.license_number {
            update_data.insert("license_number".to_string(), json!(license_number));
        }
        if let Some(availability) = request.availability {
            // Full replacement of the weekly schedule.
            update_data.insert("availability".to_string(), json!(availability));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
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
            .ok_or_else(|| anyhow!("Doctor not found"))?;

        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delete_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<()> {
        debug!("Deleting doctor profile {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Option<Doctor>> {
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
