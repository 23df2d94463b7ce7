//! Admin subjects and mid-marks entry

use crate::api::extract::AdminUser;
use crate::api::selected;
use crate::app::AppState;
use crate::database::{CreateSubjectRequest, MidMarks, Subject};
use crate::error::{AppError, Result};
use crate::services::marks::{MarksSheet, SaveMarksRequest};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
    #[serde(default = "crate::api::first_term")]
    pub semester: i32,
    pub branch: Option<String>,
}

/// GET /api/admin/subjects
pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<SubjectsQuery>,
) -> Result<Json<Vec<Subject>>> {
    let branch = selected(query.branch).ok_or_else(|| AppError::validation("Branch is required"))?;
    let subjects = state.marks.list_subjects(query.semester, &branch).await?;

    Ok(Json(subjects))
}

/// POST /api/admin/subjects
pub async fn create_subject(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>)> {
    let subject = state.marks.create_subject(req).await?;

    Ok((StatusCode::CREATED, Json(subject)))
}

/// DELETE /api/admin/subjects/{id}
pub async fn delete_subject(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.marks.delete_subject(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MarksQuery {
    pub student_id: Option<String>,
    #[serde(default = "crate::api::first_term")]
    pub semester: i32,
    #[serde(default = "crate::api::first_term")]
    pub mid: i32,
    pub branch: Option<String>,
}

/// GET /api/admin/marks
pub async fn marks_sheet(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<MarksQuery>,
) -> Result<Json<MarksSheet>> {
    let student_id = selected(query.student_id)
        .ok_or_else(|| AppError::Precondition("Please select a student first".to_string()))?;
    let branch = selected(query.branch);

    let sheet = state
        .marks
        .marks_for_student(&student_id, query.semester, query.mid, branch.as_deref())
        .await?;

    Ok(Json(sheet))
}

/// PUT /api/admin/marks
pub async fn save_marks(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<SaveMarksRequest>,
) -> Result<Json<Vec<MidMarks>>> {
    let saved = state.marks.save_marks(req).await?;

    Ok(Json(saved))
}
