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

use crate::models::{CreateDoctorRequest, UpdateDoctorRequest};
use crate::services::doctor::DoctorService;

fn actor_role(user: &User) -> Result<Role, AppError> {
    user.role_kind()
        .ok_or_else(|| AppError::Forbidden("Invalid user role".to_string()))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Admin {
        return Err(AppError::Forbidden(
            "Not authorized, admin access required".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .create_doctor(request, auth.token())
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service
        .list_doctors(auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "count": doctors.len(),
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .get_doctor(doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

/// Profile of the calling doctor. Requires the doctor role.
#[axum::debug_handler]
pub async fn get_current_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Doctor {
        return Err(AppError::Forbidden(
            "Access denied: Doctor role required".to_string(),
        ));
    }

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service
        .get_doctor_by_user(user_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let role = actor_role(&user)?;
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .get_doctor(doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    // Only the doctor themself or an admin may mutate a doctor profile.
    if role != Role::Admin && doctor.user_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to update this profile".to_string(),
        ));
    }

    let updated = doctor_service
        .update_doctor(doctor_id, request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "doctor": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if actor_role(&user)? != Role::Admin {
        return Err(AppError::Forbidden(
            "Not authorized, admin access required".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);

    doctor_service
        .get_doctor(doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    doctor_service
        .delete_doctor(doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor removed",
        "doctor_id": doctor_id
    })))
}
