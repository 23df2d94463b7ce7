//! Admin attendance marking and dashboard

use crate::api::extract::AdminUser;
use crate::api::{selected, selected_number};
use crate::app::AppState;
use crate::database::{SessionWriteOutcome, Student};
use crate::error::Result;
use crate::services::attendance::{
    self, AttendanceSubmission, AttendanceSummary, BulkOutcome, BulkSubmission, SessionView,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_students: i64,
    pub today: AttendanceSummary,
    pub branches: Vec<String>,
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<AdminDashboard>> {
    let total_students = state.students.count_students().await?;
    let today = state.attendance.today_summary().await?;
    let branches = state.students.branches().await?;

    Ok(Json(AdminDashboard {
        total_students,
        today,
        branches,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    pub date: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
}

/// Everything the marking screen shows for one date
#[derive(Debug, Serialize)]
pub struct AttendancePage {
    pub date: NaiveDate,
    pub session: Option<SessionView>,
    pub roster: Vec<Student>,
    pub today: AttendanceSummary,
}

/// GET /api/admin/attendance
pub async fn attendance_page(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<AttendancePage>> {
    let date = match selected(query.date) {
        Some(date) => attendance::normalize_date(&date)?,
        None => attendance::today(),
    };
    let branch = selected(query.branch);
    let year = selected_number("Year", query.year)?;

    let session = state.attendance.session_view(date).await?;
    let roster = state.students.roster(branch.as_deref(), year).await?;
    let today = state.attendance.today_summary().await?;

    Ok(Json(AttendancePage {
        date,
        session,
        roster,
        today,
    }))
}

/// POST /api/admin/attendance
pub async fn submit_attendance(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(submission): Json<AttendanceSubmission>,
) -> Result<Json<SessionWriteOutcome>> {
    let outcome = state.attendance.reconcile(submission).await?;

    Ok(Json(outcome))
}

/// POST /api/admin/attendance/bulk
pub async fn bulk_attendance(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(submission): Json<BulkSubmission>,
) -> Result<Json<BulkOutcome>> {
    let outcome = state.attendance.mark_by_percentage(submission).await?;

    Ok(Json(outcome))
}
