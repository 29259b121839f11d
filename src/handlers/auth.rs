// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::LoginRequest,
    state::AppState,
    utils::{hash::verify_password, jwt::sign_jwt},
};

/// Authenticates a teacher and returns a JWT token.
///
/// Unknown users and wrong passwords get the same answer.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state
        .db
        .find_user_by_username(&payload.username)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        tracing::info!("Rejected login for {}", payload.username);
        return Err(AppError::AuthError(
            "Invalid username or password".to_string(),
        ));
    }

    let token = sign_jwt(
        user.id,
        &user.username,
        &user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": state.config.jwt_expiration,
        "username": user.username,
    })))
}
