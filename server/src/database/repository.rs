//! Repository layer for database operations
//!
//! Reads go straight to the pool. Every write that touches more than one
//! row runs inside a single transaction, so a failed submission leaves
//! nothing behind.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn login_conflict(err: sqlx::Error, login: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::validation(format!("Login already in use: {}", login))
    } else {
        AppError::Database(err)
    }
}

async fn insert_user(
    conn: &mut SqliteConnection,
    login: &str,
    password_hash: &str,
    role: Role,
    name: &str,
) -> Result<User> {
    let id = Uuid::new_v4().to_string();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, login, password_hash, role, name, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(login)
    .bind(password_hash)
    .bind(role)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| login_conflict(e, login))?;

    Ok(user)
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) fn pool_for_tests(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Users & tokens =====

    /// Create a standalone auth identity
    pub async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        role: Role,
        name: &str,
    ) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        let user = insert_user(&mut *conn, login, password_hash, role, name).await?;

        tracing::debug!("Created {} user: {}", role, user.id);
        Ok(user)
    }

    pub async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE login = ?")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn insert_token(&self, token_hash: &str, user_id: &str, expires_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolve a token digest to its user, ignoring expired tokens
    pub async fn find_user_by_token(&self, token_hash: &str, now: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = ? AND t.expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn delete_token(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_expired_tokens(&self, now: i64) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows)
    }

    // ===== Students =====

    /// Create a student together with its login, in one transaction
    pub async fn create_student(
        &self,
        req: &CreateStudentRequest,
        password_hash: &str,
    ) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut *tx, &req.login, password_hash, Role::Student, &req.name).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (id, name, roll_number, branch, year, batch, login, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.name)
        .bind(&req.roll_number)
        .bind(&req.branch)
        .bind(req.year)
        .bind(&req.batch)
        .bind(&req.login)
        .bind(&user.id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Created student: {} with user: {}", student.id, user.id);
        Ok(student)
    }

    pub async fn get_student(&self, id: &str) -> Result<Student> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::StudentNotFound(id.to_string()))
    }

    pub async fn find_student_by_user(&self, user_id: &str) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    /// All students, alphabetical by name
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students ORDER BY name ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    pub async fn count_students(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn list_branches(&self) -> Result<Vec<String>> {
        let branches: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT branch FROM students WHERE branch <> '' ORDER BY branch",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    /// Update a student and keep its login in step
    pub async fn update_student(
        &self,
        id: &str,
        req: &UpdateStudentRequest,
        password_hash: Option<&str>,
    ) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET name = ?, roll_number = ?, branch = ?, year = ?, batch = ?, login = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.roll_number)
        .bind(&req.branch)
        .bind(req.year)
        .bind(&req.batch)
        .bind(&req.login)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::StudentNotFound(id.to_string()))?;

        if let Some(user_id) = &student.user_id {
            sqlx::query("UPDATE users SET login = ?, name = ? WHERE id = ?")
                .bind(&req.login)
                .bind(&req.name)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| login_conflict(e, &req.login))?;

            if let Some(hash) = password_hash {
                sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                    .bind(hash)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::debug!("Updated student: {}", id);
        Ok(student)
    }

    /// Delete a student and its auth identity. Attendance records and
    /// marks referencing the student are kept.
    pub async fn delete_student(&self, id: &str) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>("DELETE FROM students WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::StudentNotFound(id.to_string()))?;

        if let Some(user_id) = &student.user_id {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Deleted student: {}", id);
        Ok(student)
    }

    // ===== Attendance =====

    pub async fn find_session_by_date(&self, date: NaiveDate) -> Result<Option<AttendanceSession>> {
        let session = sqlx::query_as::<_, AttendanceSession>(
            "SELECT * FROM attendance_sessions WHERE date = ?",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn list_records(&self, session_id: &str) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance_records WHERE session_id = ? ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn find_record(
        &self,
        session_id: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records WHERE session_id = ? AND student_id = ?",
        )
        .bind(session_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Every record of every session dated within `from..=to`
    pub async fn list_records_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT r.* FROM attendance_records r
            JOIN attendance_sessions s ON s.id = r.session_id
            WHERE s.date >= ? AND s.date <= ?
            ORDER BY s.date ASC, r.created_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Every record held for one student, across all sessions
    pub async fn list_student_records(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance_records WHERE student_id = ? ORDER BY created_at ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Upsert the session for `write.date` and one record per entry.
    ///
    /// The session's scope and direct-entry fields are overwritten. Records
    /// for students absent from `write.entries` are not touched.
    pub async fn write_session(&self, write: &SessionWrite) -> Result<SessionWriteOutcome> {
        let now = Utc::now();
        let fresh_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        // Write first. Under WAL a deferred transaction that opens with a read
        // gets SQLITE_BUSY on upgrade instead of waiting out the busy timeout.
        let session = sqlx::query_as::<_, AttendanceSession>(
            r#"
            INSERT INTO attendance_sessions
                (id, date, branch, year, semester, is_direct_entry, percentage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                branch = excluded.branch,
                year = excluded.year,
                semester = excluded.semester,
                is_direct_entry = excluded.is_direct_entry,
                percentage = excluded.percentage,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&fresh_id)
        .bind(write.date)
        .bind(&write.scope.branch)
        .bind(write.scope.year)
        .bind(write.scope.semester)
        .bind(write.direct_percentage.is_some())
        .bind(write.direct_percentage)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let known: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT student_id FROM attendance_records WHERE session_id = ?",
        )
        .bind(&session.id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let mut inserted = 0;
        let mut updated = 0;

        for (student_id, present) in &write.entries {
            sqlx::query(
                r#"
                INSERT INTO attendance_records (id, session_id, student_id, present, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(session_id, student_id) DO UPDATE SET
                    present = excluded.present,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&session.id)
            .bind(student_id)
            .bind(*present)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if known.contains(student_id) {
                updated += 1;
            } else {
                inserted += 1;
            }
        }

        tx.commit().await?;

        tracing::debug!(
            "Wrote session {} for {}: {} inserted, {} updated",
            session.id,
            write.date,
            inserted,
            updated
        );

        Ok(SessionWriteOutcome {
            created_session: session.id == fresh_id,
            session,
            inserted,
            updated,
        })
    }

    // ===== Subjects =====

    pub async fn create_subject(&self, req: &CreateSubjectRequest) -> Result<Subject> {
        let id = Uuid::new_v4().to_string();

        let subject = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO subjects (id, name, code, semester, branch, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.name)
        .bind(&req.code)
        .bind(req.semester)
        .bind(&req.branch)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created subject: {}", id);
        Ok(subject)
    }

    pub async fn list_subjects(&self, semester: i32, branch: &str) -> Result<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>(
            r#"
            SELECT * FROM subjects WHERE semester = ? AND branch = ? ORDER BY created_at ASC
            "#,
        )
        .bind(semester)
        .bind(branch)
        .fetch_all(&self.pool)
        .await?;

        Ok(subjects)
    }

    pub async fn delete_subject(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM subjects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::SubjectNotFound(id.to_string()));
        }

        tracing::debug!("Deleted subject: {}", id);
        Ok(())
    }

    // ===== Mid marks =====

    /// Upsert one marks row per (subject, marks) entry, in one transaction
    pub async fn upsert_marks(
        &self,
        student_id: &str,
        semester: i32,
        mid_number: i32,
        max_marks: i32,
        entries: &[(String, i32)],
    ) -> Result<Vec<MidMarks>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(entries.len());

        for (subject_id, marks) in entries {
            let row = sqlx::query_as::<_, MidMarks>(
                r#"
                INSERT INTO mid_marks
                    (id, student_id, subject_id, semester, mid_number, marks, max_marks, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(student_id, subject_id, semester, mid_number) DO UPDATE SET
                    marks = excluded.marks,
                    updated_at = excluded.updated_at
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(student_id)
            .bind(subject_id)
            .bind(semester)
            .bind(mid_number)
            .bind(*marks)
            .bind(max_marks)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            saved.push(row);
        }

        tx.commit().await?;

        tracing::debug!(
            "Saved {} marks rows for student {} (semester {}, mid {})",
            saved.len(),
            student_id,
            semester,
            mid_number
        );
        Ok(saved)
    }

    /// Marks of one student for a semester and mid, with subject names where
    /// the subject still exists
    pub async fn list_marks(
        &self,
        student_id: &str,
        semester: i32,
        mid_number: i32,
    ) -> Result<Vec<MarksWithSubject>> {
        let marks = sqlx::query_as::<_, MarksWithSubject>(
            r#"
            SELECT m.*, s.name AS subject_name, s.code AS subject_code
            FROM mid_marks m
            LEFT JOIN subjects s ON s.id = m.subject_id
            WHERE m.student_id = ? AND m.semester = ? AND m.mid_number = ?
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(student_id)
        .bind(semester)
        .bind(mid_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(marks)
    }
}
