//! # Domain Module
//!
//! Business logic of the attendance tracker, independent of HTTP and of the
//! concrete storage backends.
//!
//! ## Module Organization
//!
//! - **state**: the application state object shared by every service
//! - **calendar**: Bogota calendar day, Spanish date formats
//! - **auth_service**: static credential table, sessions, group authorization
//! - **sync_service**: local/remote dual write, migration sweep, roster subscriptions
//! - **roster_service**: student CRUD with the duplicate-name guard
//! - **attendance_service**: Sunday sheet and attendance submission
//! - **report_service**: role-scoped summaries, history and chart aggregates
//! - **export_service** / **print_service**: spreadsheet and printable views
//!
//! ## Business Rules
//!
//! - No two students of a group share a name, ignoring case
//! - One attendance record per (year, group, date); re-saving replaces it
//! - Local persistence always happens; the remote mirror is best effort
//! - Percentages and averages over nothing are 0

pub mod attendance_service;
pub mod auth_service;
pub mod calendar;
pub mod export_service;
pub mod models;
pub mod print_service;
pub mod report_service;
pub mod roster_service;
pub mod state;
pub mod sync_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use attendance_service::{AttendanceError, AttendanceService};
pub use auth_service::{AuthError, AuthService};
pub use calendar::{CalendarService, Clock, FixedClock, SystemClock};
pub use export_service::{ExportError, ExportService};
pub use print_service::PrintService;
pub use report_service::ReportService;
pub use roster_service::{RosterError, RosterService};
pub use state::{AppData, SharedState};
pub use sync_service::{SyncError, SyncService};
