//! Sign-in and sign-out

use crate::api::extract::CurrentUser;
use crate::app::AppState;
use crate::database::Role;
use crate::error::Result;
use crate::services::auth::SignIn;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
    pub role: Role,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SignIn>> {
    let signed_in = state
        .auth
        .sign_in_as(&req.login, &req.password, req.role)
        .await?;

    Ok(Json(signed_in))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<StatusCode> {
    state.auth.sign_out(&current.token).await?;
    tracing::info!("User signed out: {}", current.user.login);

    Ok(StatusCode::NO_CONTENT)
}
