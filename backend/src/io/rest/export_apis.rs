//! # REST API for Data Export
//!
//! Spreadsheet artifacts are returned as JSON with a suggested file name;
//! the frontend turns the content into a download.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::{error_response, session_or_reject};
use crate::AppState;
use shared::Group;

pub async fn export_students(
    State(state): State<AppState>,
    Path(group): Path<Group>,
) -> impl IntoResponse {
    info!("GET /api/export/students/{}", group);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.export_service.export_roster(&session, group) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("export students", &e),
    }
}

pub async fn export_attendance(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/export/attendance/{}", year);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.export_service.export_attendance(&session, year) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("export attendance", &e),
    }
}
