//! Bearer-token extractors
//!
//! Handlers take `AdminUser` or `StudentUser` to declare which dashboard
//! they belong to. Both resolve the `Authorization: Bearer` header first.

use crate::app::AppState;
use crate::database::{Role, Student, User};
use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use std::sync::Arc;

/// Token carried in the `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Any signed-in user
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user = state.auth.authenticate(token).await?;

        Ok(CurrentUser {
            user,
            token: token.to_string(),
        })
    }
}

/// A signed-in admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.user.role != Role::Admin {
            tracing::warn!("Admin route refused for {}", current.user.login);
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(current.user))
    }
}

/// A signed-in student together with their student record
#[derive(Debug, Clone)]
pub struct StudentUser {
    pub user: User,
    pub student: Student,
}

impl FromRequestParts<Arc<AppState>> for StudentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.user.role != Role::Student {
            tracing::warn!("Student route refused for {}", current.user.login);
            return Err(AppError::Forbidden);
        }

        let student = state.students.student_for_user(&current.user.id).await?;
        Ok(StudentUser {
            user: current.user,
            student,
        })
    }
}
