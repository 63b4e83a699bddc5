use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, UpdatePatientRequest};
use crate::services::patient::PatientService;

fn actor_role(user: &User) -> Result<Role, AppError> {
    user.role_kind()
        .ok_or_else(|| AppError::Forbidden("Invalid user role".to_string()))
}

fn actor_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Patient {
        return Err(AppError::Forbidden(
            "Access denied: Patient role required".to_string(),
        ));
    }

    let patient_service = PatientService::new(&state);
    let patient = patient_service
        .create_patient(&user, request, auth.token())
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Admin {
        return Err(AppError::Forbidden(
            "Not authorized, admin access required".to_string(),
        ));
    }

    let patient_service = PatientService::new(&state);
    let patients = patient_service
        .list_patients(auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "count": patients.len(),
        "patients": patients
    })))
}

/// Admins always; patients their own record; doctors only patients they share
/// an appointment with.
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user)?;
    let patient_service = PatientService::new(&state);

    let patient = patient_service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let has_access = match role {
        Role::Admin => true,
        Role::Patient => patient.user_id.to_string() == user.id,
        Role::Doctor => patient_service
            .has_appointment_with_doctor(patient.id, actor_uuid(&user)?, auth.token())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?,
    };

    if !has_access {
        return Err(AppError::Forbidden(
            "Not authorized to view this profile".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn get_current_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Patient {
        return Err(AppError::Forbidden(
            "Access denied: Patient role required".to_string(),
        ));
    }

    let patient_service = PatientService::new(&state);
    let patient = patient_service
        .get_patient_by_user(actor_uuid(&user)?, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user)?;
    let patient_service = PatientService::new(&state);

    let patient = patient_service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    if role != Role::Admin && patient.user_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to update this profile".to_string(),
        ));
    }

    let updated = patient_service
        .update_patient(&patient, request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "patient": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Admin {
        return Err(AppError::Forbidden(
            "Not authorized, admin access required".to_string(),
        ));
    }

    let patient_service = PatientService::new(&state);

    patient_service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    patient_service
        .delete_patient(patient_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient profile deleted",
        "patient_id": patient_id
    })))
}
