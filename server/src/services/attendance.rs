//! Attendance service
//!
//! Locates the session held for a date, aggregates its records into
//! present/total counts, and reconciles new submissions into it. Every
//! committed write is announced on a broadcast channel so open dashboards
//! can re-query.

use crate::config;
use crate::database::{
    AttendanceRecord, AttendanceSession, Repository, SessionScope, SessionWrite,
    SessionWriteOutcome, Student,
};
use crate::error::{AppError, Result};
use crate::services::students::filter_roster;
use crate::services::validation::{require_range, selected};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Published after every committed attendance write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceChange {
    pub date: NaiveDate,
}

/// Parse a submitted date into a calendar date.
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, in which case the date in
/// the timestamp's own offset is used.
pub fn normalize_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.date_naive())
        .map_err(|_| AppError::validation(format!("Invalid date: {:?}", input)))
}

/// The server's local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `present / total * 100`, or 0 when nothing was recorded
pub fn percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    present as f64 / total as f64 * 100.0
}

/// Number of students marked present when `p` percent of `n` attend.
/// Rounds half away from zero.
pub fn bulk_split(n: usize, p: f64) -> usize {
    let k = (n as f64 * p / 100.0).round();
    (k.max(0.0) as usize).min(n)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub percentage: f64,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let total = records.len();
        let present = records.iter().filter(|r| r.present).count();

        Self {
            total,
            present,
            percentage: percentage(present, total),
        }
    }

    /// Summary of one session. Bulk-entered sessions report the percentage
    /// they were marked with.
    pub fn for_session(session: &AttendanceSession, records: &[AttendanceRecord]) -> Self {
        let mut summary = Self::from_records(records);

        if session.is_direct_entry {
            if let Some(p) = session.percentage {
                summary.percentage = p;
            }
        }
        summary
    }
}

/// A session with its records and their aggregate
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: AttendanceSession,
    pub records: Vec<AttendanceRecord>,
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentPresence {
    pub student_id: String,
    pub present: bool,
}

/// Per-student attendance submission for one date
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceSubmission {
    pub date: String,
    #[serde(flatten)]
    pub scope: SessionScope,
    pub students: Vec<StudentPresence>,
}

/// Percentage-based attendance for the roster matching `scope`
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSubmission {
    pub date: String,
    #[serde(flatten)]
    pub scope: SessionScope,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    #[serde(flatten)]
    pub outcome: SessionWriteOutcome,
    pub present: usize,
    pub absent: usize,
}

/// What a student sees for one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Present,
    Absent,
    NotMarked,
}

impl From<Option<bool>> for DayStatus {
    fn from(present: Option<bool>) -> Self {
        match present {
            Some(true) => DayStatus::Present,
            Some(false) => DayStatus::Absent,
            None => DayStatus::NotMarked,
        }
    }
}

/// A student's attendance for today plus their running total
#[derive(Debug, Clone, Serialize)]
pub struct StudentOverview {
    pub date: NaiveDate,
    pub today: DayStatus,
    pub overall: AttendanceSummary,
}

/// Collapse repeated student ids, keeping the last value submitted for each.
/// Students keep the position of their first appearance.
fn dedupe_entries(students: Vec<StudentPresence>) -> Vec<(String, bool)> {
    let mut order: Vec<String> = Vec::with_capacity(students.len());
    let mut latest: HashMap<String, bool> = HashMap::with_capacity(students.len());

    for entry in students {
        if latest.insert(entry.student_id.clone(), entry.present).is_none() {
            order.push(entry.student_id);
        }
    }

    order
        .into_iter()
        .map(|id| {
            let present = latest.get(&id).copied().unwrap_or(false);
            (id, present)
        })
        .collect()
}

fn normalize_scope(scope: SessionScope) -> Result<SessionScope> {
    let branch = selected(scope.branch);

    if let Some(year) = scope.year {
        require_range("Year", year, config::MIN_YEAR, config::MAX_YEAR)?;
    }
    if let Some(semester) = scope.semester {
        require_range("Semester", semester, config::MIN_SEMESTER, config::MAX_SEMESTER)?;
    }

    Ok(SessionScope {
        branch,
        year: scope.year,
        semester: scope.semester,
    })
}

/// Service for attendance sessions
#[derive(Clone)]
pub struct AttendanceService {
    repo: Repository,
    changes: broadcast::Sender<AttendanceChange>,
}

impl AttendanceService {
    pub fn new(repo: Repository) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { repo, changes }
    }

    /// Receive an event after every committed attendance write
    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceChange> {
        self.changes.subscribe()
    }

    fn publish(&self, date: NaiveDate) {
        // No receivers is fine; nobody is watching.
        let _ = self.changes.send(AttendanceChange { date });
    }

    /// The session held for `date`, if any
    pub async fn locate_session(&self, date: NaiveDate) -> Result<Option<AttendanceSession>> {
        self.repo.find_session_by_date(date).await
    }

    /// Session for `date` with its records and summary
    pub async fn session_view(&self, date: NaiveDate) -> Result<Option<SessionView>> {
        let Some(session) = self.locate_session(date).await? else {
            return Ok(None);
        };

        let records = self.repo.list_records(&session.id).await?;
        let summary = AttendanceSummary::for_session(&session, &records);

        Ok(Some(SessionView {
            session,
            records,
            summary,
        }))
    }

    /// Counts summed over every record of every session in `from..=to`
    pub async fn summarize_range(&self, from: NaiveDate, to: NaiveDate) -> Result<AttendanceSummary> {
        let records = self.repo.list_records_between(from, to).await?;
        Ok(AttendanceSummary::from_records(&records))
    }

    pub async fn today_summary(&self) -> Result<AttendanceSummary> {
        let today = today();
        self.summarize_range(today, today).await
    }

    /// Merge a per-student submission into the session for its date,
    /// creating the session when none exists.
    pub async fn reconcile(&self, submission: AttendanceSubmission) -> Result<SessionWriteOutcome> {
        let date = normalize_date(&submission.date)?;
        let scope = normalize_scope(submission.scope)?;

        if submission.students.is_empty() {
            return Err(AppError::validation("No students in attendance submission"));
        }
        if submission.students.len() > config::MAX_SUBMISSION_SIZE {
            return Err(AppError::validation(format!(
                "Attendance submission exceeds {} students",
                config::MAX_SUBMISSION_SIZE
            )));
        }
        if submission.students.iter().any(|s| s.student_id.trim().is_empty()) {
            return Err(AppError::validation("Student id is required"));
        }

        let entries = dedupe_entries(submission.students);

        tracing::info!("Recording attendance for {}: {} students", date, entries.len());

        let outcome = self
            .repo
            .write_session(&SessionWrite {
                date,
                scope,
                direct_percentage: None,
                entries,
            })
            .await?;

        tracing::info!(
            "Attendance saved for {}: {} inserted, {} updated",
            date,
            outcome.inserted,
            outcome.updated
        );

        self.publish(date);
        Ok(outcome)
    }

    /// Mark the first `round(n * p / 100)` students of the filtered roster
    /// present and the rest absent.
    pub async fn mark_by_percentage(&self, bulk: BulkSubmission) -> Result<BulkOutcome> {
        let date = normalize_date(&bulk.date)?;
        let scope = normalize_scope(bulk.scope)?;

        if !bulk.percentage.is_finite()
            || bulk.percentage < config::MIN_PERCENTAGE
            || bulk.percentage > config::MAX_PERCENTAGE
        {
            return Err(AppError::validation(
                "Percentage must be a number between 0 and 100",
            ));
        }

        let students = self.repo.list_students().await?;
        let roster = filter_roster(students, scope.branch.as_deref(), scope.year);
        let entries = split_roster(&roster, bulk.percentage);
        let present = entries.iter().filter(|(_, present)| *present).count();
        let absent = entries.len() - present;

        tracing::info!(
            "Bulk marking {} at {}%: {} of {} present",
            date,
            bulk.percentage,
            present,
            entries.len()
        );

        let outcome = self
            .repo
            .write_session(&SessionWrite {
                date,
                scope,
                direct_percentage: Some(bulk.percentage),
                entries,
            })
            .await?;

        self.publish(date);
        Ok(BulkOutcome {
            outcome,
            present,
            absent,
        })
    }

    /// Presence of one student on `date`, `None` when not marked
    pub async fn student_status_on(&self, student_id: &str, date: NaiveDate) -> Result<Option<bool>> {
        let Some(session) = self.locate_session(date).await? else {
            return Ok(None);
        };

        let record = self.repo.find_record(&session.id, student_id).await?;
        Ok(record.map(|r| r.present))
    }

    pub async fn student_overview(&self, student: &Student) -> Result<StudentOverview> {
        let date = today();
        let today = self.student_status_on(&student.id, date).await?;
        let records = self.repo.list_student_records(&student.id).await?;

        Ok(StudentOverview {
            date,
            today: today.into(),
            overall: AttendanceSummary::from_records(&records),
        })
    }
}

fn split_roster(roster: &[Student], p: f64) -> Vec<(String, bool)> {
    let k = bulk_split(roster.len(), p);

    roster
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i < k))
        .collect()
}
