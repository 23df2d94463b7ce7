//! HTTP API
//!
//! JSON routes for the admin and student dashboards. Every route except
//! login and health expects `Authorization: Bearer <token>`.

pub mod attendance;
pub mod auth;
pub mod extract;
pub mod marks;
pub mod student;
pub mod students;

use crate::app::AppState;
use crate::error::{AppError, Result};
use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub(crate) use crate::services::validation::selected;

/// Numeric dropdown selection, see [`selected`]
pub(crate) fn selected_number(field: &str, value: Option<String>) -> Result<Option<i32>> {
    selected(value)
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| AppError::validation(format!("{} must be a number", field)))
        })
        .transpose()
}

/// Semester and mid number both default to the first one
pub(crate) fn first_term() -> i32 {
    1
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // Admin dashboard
        .route("/api/admin/dashboard", get(attendance::dashboard))
        .route(
            "/api/admin/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/api/admin/students/{id}",
            put(students::update_student).delete(students::delete_student),
        )
        .route(
            "/api/admin/attendance",
            get(attendance::attendance_page).post(attendance::submit_attendance),
        )
        .route("/api/admin/attendance/bulk", post(attendance::bulk_attendance))
        .route(
            "/api/admin/subjects",
            get(marks::list_subjects).post(marks::create_subject),
        )
        .route("/api/admin/subjects/{id}", delete(marks::delete_subject))
        .route("/api/admin/marks", get(marks::marks_sheet).put(marks::save_marks))
        // Student dashboard
        .route("/api/student/profile", get(student::profile))
        .route("/api/student/dashboard", get(student::dashboard))
        .route("/api/student/dashboard/live", get(student::live_dashboard))
        .route("/api/student/results", get(student::results))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
