//! Services module
//!
//! Business logic services that coordinate between the HTTP handlers and
//! the repository.

pub mod attendance;
pub mod auth;
pub mod marks;
pub mod students;
pub mod validation;

pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use marks::MarksService;
pub use students::StudentsService;
