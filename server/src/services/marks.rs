//! Marks service
//!
//! Subjects per (semester, branch) and the mid-exam marks entered against
//! them. Marks rows are never cascaded from subjects: deleting a subject
//! leaves its marks behind, reported as orphaned on the results view.

use crate::config;
use crate::database::{CreateSubjectRequest, MarksWithSubject, MidMarks, Repository, Student, Subject};
use crate::error::{AppError, Result};
use crate::services::validation::{require_non_empty, require_range};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Clamp a submitted mark into `0..=30`. Fractions are dropped and
/// anything that is not a number counts as 0.
pub fn clamp_marks(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().clamp(0.0, config::MAX_MID_MARKS as f64) as i32
}

fn validate_exam(semester: i32, mid_number: i32) -> Result<()> {
    require_range("Semester", semester, config::MIN_SEMESTER, config::MAX_SEMESTER)?;
    require_range("Mid number", mid_number, config::MIN_MID_NUMBER, config::MAX_MID_NUMBER)?;
    Ok(())
}

/// Marks for one student, keyed by subject id
#[derive(Debug, Clone, Deserialize)]
pub struct SaveMarksRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    pub semester: i32,
    pub mid_number: i32,
    /// Subjects are taken from this branch, or the student's own when absent
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub marks: HashMap<String, f64>,
}

/// The marks entry grid for one student
#[derive(Debug, Clone, Serialize)]
pub struct MarksSheet {
    pub student: Student,
    pub semester: i32,
    pub mid_number: i32,
    pub subjects: Vec<Subject>,
    pub marks: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectResult {
    pub subject: Subject,
    pub marks: Option<i32>,
    pub max_marks: i32,
}

/// A student's results for one semester and mid
#[derive(Debug, Clone, Serialize)]
pub struct StudentResults {
    pub semester: i32,
    pub mid_number: i32,
    pub subjects: Vec<SubjectResult>,
    /// Marks whose subject no longer exists
    pub orphaned: Vec<MarksWithSubject>,
}

/// Service for subjects and mid marks
#[derive(Clone)]
pub struct MarksService {
    repo: Repository,
}

impl MarksService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create_subject(&self, mut req: CreateSubjectRequest) -> Result<Subject> {
        req.name = req.name.trim().to_string();
        req.code = req.code.trim().to_string();
        req.branch = req.branch.trim().to_string();

        require_non_empty("Subject name", &req.name)?;
        require_non_empty("Subject code", &req.code)?;
        require_non_empty("Branch", &req.branch)?;
        require_range("Semester", req.semester, config::MIN_SEMESTER, config::MAX_SEMESTER)?;

        let subject = self.repo.create_subject(&req).await?;

        tracing::info!(
            "Subject created: {} {} (semester {}, {})",
            subject.code,
            subject.name,
            subject.semester,
            subject.branch
        );
        Ok(subject)
    }

    pub async fn list_subjects(&self, semester: i32, branch: &str) -> Result<Vec<Subject>> {
        require_range("Semester", semester, config::MIN_SEMESTER, config::MAX_SEMESTER)?;
        self.repo.list_subjects(semester, branch.trim()).await
    }

    /// Delete a subject. Marks entered against it are kept.
    pub async fn delete_subject(&self, id: &str) -> Result<()> {
        self.repo.delete_subject(id).await?;

        tracing::info!("Subject deleted: {}", id);
        Ok(())
    }

    /// Save one mark per subject of the branch and semester. Subjects
    /// missing from `req.marks` are saved as 0.
    pub async fn save_marks(&self, req: SaveMarksRequest) -> Result<Vec<MidMarks>> {
        let student_id = req
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Precondition("Please select a student first".to_string()))?;

        validate_exam(req.semester, req.mid_number)?;

        let student = self.repo.get_student(student_id).await?;
        let branch = req
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&student.branch);

        let subjects = self.repo.list_subjects(req.semester, branch).await?;
        let entries: Vec<(String, i32)> = subjects
            .into_iter()
            .map(|subject| {
                let value = req.marks.get(&subject.id).copied().unwrap_or(0.0);
                (subject.id, clamp_marks(value))
            })
            .collect();

        tracing::info!(
            "Saving marks for {} (semester {}, mid {}): {} subjects",
            student.name,
            req.semester,
            req.mid_number,
            entries.len()
        );

        self.repo
            .upsert_marks(
                &student.id,
                req.semester,
                req.mid_number,
                config::MAX_MID_MARKS,
                &entries,
            )
            .await
    }

    /// The entry grid for one student: the branch's subjects and any marks
    /// already saved for them
    pub async fn marks_for_student(
        &self,
        student_id: &str,
        semester: i32,
        mid_number: i32,
        branch: Option<&str>,
    ) -> Result<MarksSheet> {
        validate_exam(semester, mid_number)?;

        let student = self.repo.get_student(student_id).await?;
        let branch = branch.unwrap_or(&student.branch);
        let subjects = self.repo.list_subjects(semester, branch).await?;

        let marks = self
            .repo
            .list_marks(&student.id, semester, mid_number)
            .await?
            .into_iter()
            .map(|row| (row.marks.subject_id, row.marks.marks))
            .collect();

        Ok(MarksSheet {
            student,
            semester,
            mid_number,
            subjects,
            marks,
        })
    }

    /// Results as shown to the student: every subject of their branch with
    /// its mark if one was entered, plus marks left behind by deleted subjects
    pub async fn student_results(
        &self,
        student: &Student,
        semester: i32,
        mid_number: i32,
    ) -> Result<StudentResults> {
        validate_exam(semester, mid_number)?;

        let subjects = self.repo.list_subjects(semester, &student.branch).await?;
        let mut saved: HashMap<String, MarksWithSubject> = self
            .repo
            .list_marks(&student.id, semester, mid_number)
            .await?
            .into_iter()
            .map(|row| (row.marks.subject_id.clone(), row))
            .collect();

        let subjects = subjects
            .into_iter()
            .map(|subject| {
                let row = saved.remove(&subject.id);
                SubjectResult {
                    marks: row.as_ref().map(|r| r.marks.marks),
                    max_marks: row.map_or(config::MAX_MID_MARKS, |r| r.marks.max_marks),
                    subject,
                }
            })
            .collect();

        let mut orphaned: Vec<MarksWithSubject> = saved
            .into_values()
            .filter(|row| row.subject_name.is_none())
            .collect();
        orphaned.sort_by(|a, b| a.marks.created_at.cmp(&b.marks.created_at));

        Ok(StudentResults {
            semester,
            mid_number,
            subjects,
            orphaned,
        })
    }
}
