//! Students service
//!
//! Student records and the logins provisioned for them. Roster filtering
//! happens in memory over the name-ordered list.

use crate::config;
use crate::crypto;
use crate::database::{CreateStudentRequest, Repository, Student, UpdateStudentRequest};
use crate::error::{AppError, Result};
use crate::services::validation::{require_min_len, require_non_empty, require_range, validate_login};

/// Keep the students matching `branch` and `year`; `None` matches everything.
/// Input order is preserved.
pub fn filter_roster(students: Vec<Student>, branch: Option<&str>, year: Option<i32>) -> Vec<Student> {
    students
        .into_iter()
        .filter(|s| branch.map_or(true, |b| s.branch == b))
        .filter(|s| year.map_or(true, |y| s.year == y))
        .collect()
}

fn validate_profile(name: &str, roll_number: &str, branch: &str, year: i32, batch: &str) -> Result<()> {
    require_min_len("Name", name, config::MIN_NAME_LENGTH)?;
    require_non_empty("Roll number", roll_number)?;
    require_non_empty("Branch", branch)?;
    require_range("Year", year, config::MIN_YEAR, config::MAX_YEAR)?;
    require_non_empty("Batch", batch)?;
    Ok(())
}

fn trimmed(mut req: CreateStudentRequest) -> CreateStudentRequest {
    req.name = req.name.trim().to_string();
    req.roll_number = req.roll_number.trim().to_string();
    req.branch = req.branch.trim().to_string();
    req.batch = req.batch.trim().to_string();
    req.login = req.login.trim().to_string();
    req
}

/// Service for managing students
#[derive(Clone)]
pub struct StudentsService {
    repo: Repository,
}

impl StudentsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a student and its login
    pub async fn create_student(&self, req: CreateStudentRequest) -> Result<Student> {
        let req = trimmed(req);

        validate_profile(&req.name, &req.roll_number, &req.branch, req.year, &req.batch)?;
        validate_login(&req.login)?;
        require_min_len("Password", &req.password, config::MIN_PASSWORD_LENGTH)?;

        tracing::info!("Creating student: {} ({})", req.name, req.roll_number);

        let hash = crypto::hash_password(&req.password).await?;
        let student = self.repo.create_student(&req, &hash).await?;

        tracing::info!("Student created successfully: {}", student.id);
        Ok(student)
    }

    /// The student record attached to an auth identity
    pub async fn student_for_user(&self, user_id: &str) -> Result<Student> {
        self.repo
            .find_student_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::StudentNotFound(format!("user {}", user_id)))
    }

    /// Edit a student. The login's email follows the record; the password
    /// changes only when one is supplied.
    pub async fn update_student(&self, id: &str, mut req: UpdateStudentRequest) -> Result<Student> {
        req.name = req.name.trim().to_string();
        req.roll_number = req.roll_number.trim().to_string();
        req.branch = req.branch.trim().to_string();
        req.batch = req.batch.trim().to_string();
        req.login = req.login.trim().to_string();

        validate_profile(&req.name, &req.roll_number, &req.branch, req.year, &req.batch)?;
        validate_login(&req.login)?;

        let hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                require_min_len("Password", password, config::MIN_PASSWORD_LENGTH)?;
                Some(crypto::hash_password(password).await?)
            }
            None => None,
        };

        tracing::debug!("Updating student: {}", id);

        let student = self.repo.update_student(id, &req, hash.as_deref()).await?;

        tracing::info!("Student updated successfully: {}", id);
        Ok(student)
    }

    /// Delete a student together with its login
    pub async fn delete_student(&self, id: &str) -> Result<Student> {
        tracing::info!("Deleting student: {}", id);

        let student = self.repo.delete_student(id).await?;

        tracing::info!("Student deleted successfully: {} ({})", student.name, id);
        Ok(student)
    }

    /// Students ordered by name, optionally limited to one branch
    pub async fn list_students(&self, branch: Option<&str>) -> Result<Vec<Student>> {
        let students = self.repo.list_students().await?;
        Ok(filter_roster(students, branch, None))
    }

    /// The roster shown on the attendance screen
    pub async fn roster(&self, branch: Option<&str>, year: Option<i32>) -> Result<Vec<Student>> {
        let students = self.repo.list_students().await?;
        Ok(filter_roster(students, branch, year))
    }

    pub async fn branches(&self) -> Result<Vec<String>> {
        self.repo.list_branches().await
    }

    pub async fn count_students(&self) -> Result<i64> {
        self.repo.count_students().await
    }
}
