//! Student dashboard, profile and results

use crate::api::extract::StudentUser;
use crate::app::AppState;
use crate::database::Student;
use crate::error::Result;
use crate::services::attendance::{self, StudentOverview};
use crate::services::marks::StudentResults;
use crate::services::AttendanceService;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{error::RecvError, Receiver};

/// GET /api/student/profile
pub async fn profile(current: StudentUser) -> Json<Student> {
    Json(current.student)
}

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub student: Student,
    #[serde(flatten)]
    pub overview: StudentOverview,
}

/// GET /api/student/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    current: StudentUser,
) -> Result<Json<StudentDashboard>> {
    let overview = state.attendance.student_overview(&current.student).await?;

    Ok(Json(StudentDashboard {
        student: current.student,
        overview,
    }))
}

/// Wait for the next write touching today's session. `false` once the
/// channel is gone.
async fn next_change_today(changes: &mut Receiver<attendance::AttendanceChange>) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if change.date == attendance::today() => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live dashboard lagged by {} changes", skipped);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

async fn status_event(service: &AttendanceService, student: &Student) -> Event {
    let event = match service.student_overview(student).await {
        Ok(overview) => Event::default().event("status").json_data(&overview),
        Err(e) => {
            tracing::error!("Live dashboard query failed for {}: {}", student.id, e);
            Ok(Event::default().event("error").data("Internal server error"))
        }
    };

    event.unwrap_or_else(|e| {
        tracing::error!("Failed to encode live dashboard event: {}", e);
        Event::default().event("error").data("Internal server error")
    })
}

/// GET /api/student/dashboard/live
///
/// Sends the current status immediately and again after every attendance
/// write for today.
pub async fn live_dashboard(
    State(state): State<Arc<AppState>>,
    current: StudentUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let changes = state.attendance.subscribe();
    let service = state.attendance.clone();

    tracing::debug!("Live dashboard opened for {}", current.student.id);

    let events = stream::unfold(
        (service, current.student, changes, true),
        |(service, student, mut changes, first)| async move {
            if !first && !next_change_today(&mut changes).await {
                return None;
            }

            let event = status_event(&service, &student).await;
            Some((Ok(event), (service, student, changes, false)))
        },
    );

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default = "crate::api::first_term")]
    pub semester: i32,
    #[serde(default = "crate::api::first_term")]
    pub mid: i32,
}

/// GET /api/student/results
pub async fn results(
    State(state): State<Arc<AppState>>,
    current: StudentUser,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<StudentResults>> {
    let results = state
        .marks
        .student_results(&current.student, query.semester, query.mid)
        .await?;

    Ok(Json(results))
}
