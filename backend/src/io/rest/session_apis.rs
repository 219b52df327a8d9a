//! # REST API for Sessions
//!
//! Login, session lookup, logout and the current Bogota date.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::error_response;
use crate::AppState;
use shared::{LoginRequest, SessionResponse};

/// Log in against the credential table
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    info!("POST /api/session/login - user: {}", request.username);

    match state.auth_service.login(&request.username, &request.password) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("log in", &e),
    }
}

/// The active session, if any
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/session");

    let response = SessionResponse {
        session: state.auth_service.current_session(),
    };
    (StatusCode::OK, Json(response))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    info!("DELETE /api/session");

    match state.auth_service.logout() {
        Ok(()) => (StatusCode::NO_CONTENT, "").into_response(),
        Err(e) => error_response("log out", &e),
    }
}

/// Today's date in Bogota and whether attendance capture is open
pub async fn get_current_date(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/date");

    let response = state
        .calendar_service
        .current_date(state.attendance_service.sunday_only());
    (StatusCode::OK, Json(response))
}
