//! Database models
//!
//! Rust structs representing stored entities and the request payloads
//! that create or change them. All models use serde for the JSON API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role attached to an auth identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth identity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: String,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Student record, linked to its auth identity through `user_id`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub branch: String,
    pub year: i32,
    pub batch: String,
    /// Email used to sign in
    pub login: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create student request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub roll_number: String,
    pub branch: String,
    pub year: i32,
    pub batch: String,
    pub login: String,
    pub password: String,
}

/// Update student request. A password, when present, replaces the login's password.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: String,
    pub roll_number: String,
    pub branch: String,
    pub year: i32,
    pub batch: String,
    pub login: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Optional branch/year/semester scope of an attendance session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionScope {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
}

/// One day's attendance pass
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceSession {
    pub id: String,
    pub date: NaiveDate,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub semester: Option<i32>,
    /// Set when the session was written by bulk percentage marking
    pub is_direct_entry: bool,
    pub percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One student's presence within a session
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub present: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything one submission writes: the session row for `date` and one
/// presence value per student.
#[derive(Debug, Clone)]
pub struct SessionWrite {
    pub date: NaiveDate,
    pub scope: SessionScope,
    /// Target percentage for bulk entry, `None` for per-student marking
    pub direct_percentage: Option<f64>,
    pub entries: Vec<(String, bool)>,
}

/// Result of a committed `SessionWrite`
#[derive(Debug, Clone, Serialize)]
pub struct SessionWriteOutcome {
    pub session: AttendanceSession,
    pub created_session: bool,
    pub inserted: usize,
    pub updated: usize,
}

/// Subject taught in a semester for a branch
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub semester: i32,
    pub branch: String,
    pub created_at: DateTime<Utc>,
}

/// Create subject request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub code: String,
    pub semester: i32,
    pub branch: String,
}

/// Marks for one (student, subject, semester, mid)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MidMarks {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub semester: i32,
    pub mid_number: i32,
    pub marks: i32,
    pub max_marks: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mid marks joined with their subject. The subject fields are `None`
/// once the subject has been deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MarksWithSubject {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub marks: MidMarks,
    pub subject_name: Option<String>,
    pub subject_code: Option<String>,
}
