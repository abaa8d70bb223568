use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Rejects callers that are not allowed to operate the clinic queue.
pub fn require_queue_operator(user: &User) -> Result<(), AppError> {
    if user.is_queue_operator() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only clinic staff can manage the queue".to_string()))
    }
}

/// Staff may act on any patient's reservations, patients only on their own.
pub fn require_patient_or_operator(user: &User, patient_id: &str) -> Result<(), AppError> {
    if user.is_queue_operator() || (user.is_patient() && user.id == patient_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Patients can only manage their own reservations".to_string()))
    }
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only administrators can change queue settings".to_string()))
    }
}
