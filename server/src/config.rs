//! Application configuration
//!
//! Validation boundaries shared by the services, plus the runtime
//! `ServerConfig` read from the environment at start-up.

use std::net::SocketAddr;
use std::path::PathBuf;

// ===== Student Limits =====

/// Minimum length of a student's name
pub const MIN_NAME_LENGTH: usize = 2;

/// Students are enrolled in years 1 through 4
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 4;

/// Minimum password length accepted when provisioning a login
pub const MIN_PASSWORD_LENGTH: usize = 6;

// ===== Academic Calendar =====

/// Semesters run 1 through 8
pub const MIN_SEMESTER: i32 = 1;
pub const MAX_SEMESTER: i32 = 8;

/// Two mid exams per semester
pub const MIN_MID_NUMBER: i32 = 1;
pub const MAX_MID_NUMBER: i32 = 2;

/// Mid exam marks are capped at 30
pub const MAX_MID_MARKS: i32 = 30;

// ===== Attendance =====

/// Bulk entry percentage bounds
pub const MIN_PERCENTAGE: f64 = 0.0;
pub const MAX_PERCENTAGE: f64 = 100.0;

/// Upper bound on students in a single attendance submission
pub const MAX_SUBMISSION_SIZE: usize = 5_000;

// ===== Auth =====

/// Default lifetime of a sign-in token
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 12;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_ADMIN_LOGIN: &str = "admin@college.local";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Runtime configuration, read once in `main`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub admin_login: String,
    pub admin_password: String,
    pub token_ttl_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir()
                .join("college-attendance")
                .join("attendance.db"),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
            admin_login: DEFAULT_ADMIN_LOGIN.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }
}

impl ServerConfig {
    /// Build configuration from `ATTENDANCE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unparseable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ATTENDANCE_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup("ATTENDANCE_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => tracing::warn!("Ignoring invalid ATTENDANCE_BIND_ADDR: {}", addr),
            }
        }

        if let Some(login) = lookup("ATTENDANCE_ADMIN_LOGIN").filter(|v| !v.trim().is_empty()) {
            config.admin_login = login.trim().to_string();
        }

        if let Some(password) = lookup("ATTENDANCE_ADMIN_PASSWORD") {
            if password.len() >= MIN_PASSWORD_LENGTH {
                config.admin_password = password;
            } else {
                tracing::warn!("ATTENDANCE_ADMIN_PASSWORD is too short, using default");
            }
        }

        if let Some(ttl) = lookup("ATTENDANCE_TOKEN_TTL_HOURS") {
            match ttl.parse::<i64>() {
                Ok(hours) if hours > 0 => config.token_ttl_hours = hours,
                _ => tracing::warn!("Ignoring invalid ATTENDANCE_TOKEN_TTL_HOURS: {}", ttl),
            }
        }

        config
    }
}
