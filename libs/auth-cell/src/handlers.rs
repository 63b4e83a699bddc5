use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Validate a token and echo back the identity it carries. Fails with 401 on
/// an invalid or expired token.
pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = jwt::validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Boolean token check. Unlike `validate_token` this never fails the request;
/// a bad token simply reports `valid: false`.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = jwt::validate_token(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

/// The caller's identity plus their role-specific clinic profile: the doctor
/// record for doctors, the patient record for patients, nothing for admins.
/// A missing profile is not an error here; `profile` is simply null.
#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let role = user
        .role_kind()
        .ok_or_else(|| AppError::Forbidden("Invalid user role".to_string()))?;
    let user_id =
        Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;

    let profile = match role {
        Role::Doctor => DoctorService::new(&config)
            .get_doctor_by_user(user_id, auth.token())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map(|doctor| json!(doctor))
            .unwrap_or(Value::Null),
        Role::Patient => PatientService::new(&config)
            .get_patient_by_user(user_id, auth.token())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map(|patient| json!(patient))
            .unwrap_or(Value::Null),
        Role::Admin => Value::Null,
    };

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
        },
        "profile": profile
    })))
}
