//! Admin student management

use crate::api::extract::AdminUser;
use crate::api::selected;
use crate::app::AppState;
use crate::database::{CreateStudentRequest, Student, UpdateStudentRequest};
use crate::error::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct StudentsQuery {
    pub branch: Option<String>,
}

/// GET /api/admin/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<StudentsQuery>,
) -> Result<Json<Vec<Student>>> {
    let branch = selected(query.branch);
    let students = state.students.list_students(branch.as_deref()).await?;

    Ok(Json(students))
}

/// POST /api/admin/students
pub async fn create_student(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>)> {
    let student = state.students.create_student(req).await?;

    Ok((StatusCode::CREATED, Json(student)))
}

/// PUT /api/admin/students/{id}
pub async fn update_student(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<Json<Student>> {
    let student = state.students.update_student(&id, req).await?;

    Ok(Json(student))
}

/// DELETE /api/admin/students/{id}
pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.students.delete_student(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
