//! # REST API Interface Layer
//!
//! HTTP/JSON endpoints for the attendance tracker. This layer handles:
//! - request/response serialization
//! - resolving the active session (401 when there is none)
//! - translating domain errors to HTTP status codes
//!
//! Handlers hold no business logic; every decision is made by a domain
//! service.

pub mod attendance_apis;
pub mod export_apis;
pub mod print_apis;
pub mod report_apis;
pub mod session_apis;
pub mod student_apis;
pub mod sync_apis;

pub use attendance_apis::*;
pub use export_apis::*;
pub use print_apis::*;
pub use report_apis::*;
pub use session_apis::*;
pub use student_apis::*;
pub use sync_apis::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use shared::Session;
use std::fmt::Display;

use crate::domain::{AttendanceError, AuthError, ExportError, RosterError, SyncError};
use crate::AppState;

/// HTTP status for a domain error
pub trait HttpStatus {
    fn status(&self) -> StatusCode;
}

impl HttpStatus for AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::NotAuthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Unauthorized(_) | AuthError::AdminOnly => StatusCode::FORBIDDEN,
            AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HttpStatus for RosterError {
    fn status(&self) -> StatusCode {
        match self {
            RosterError::Unauthorized(_) => StatusCode::FORBIDDEN,
            RosterError::Validation(_) => StatusCode::BAD_REQUEST,
            RosterError::DuplicateName(_) => StatusCode::CONFLICT,
            RosterError::NotFound(_) => StatusCode::NOT_FOUND,
            RosterError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HttpStatus for AttendanceError {
    fn status(&self) -> StatusCode {
        match self {
            AttendanceError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AttendanceError::NotSunday(_) | AttendanceError::EmptyRoster(_) => {
                StatusCode::CONFLICT
            }
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HttpStatus for ExportError {
    fn status(&self) -> StatusCode {
        match self {
            ExportError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ExportError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HttpStatus for SyncError {
    fn status(&self) -> StatusCode {
        match self {
            SyncError::RemoteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Log a failed operation and turn the error into a plain-text response
pub fn error_response<E: HttpStatus + Display>(operation: &str, e: &E) -> Response {
    let status = e.status();
    if status.is_server_error() {
        error!("Failed to {}: {:#}", operation, e);
    } else {
        warn!("Failed to {}: {}", operation, e);
    }
    (status, e.to_string()).into_response()
}

/// The active session, or a ready 401 response
pub fn session_or_reject(state: &AppState) -> Result<Session, Response> {
    state
        .auth_service
        .require_session()
        .map_err(|e| error_response("resolve session", &e))
}
