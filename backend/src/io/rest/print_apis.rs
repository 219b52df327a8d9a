//! # REST API for Printable Documents

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::{error_response, session_or_reject};
use crate::AppState;
use shared::Group;

/// Blank attendance sheet for marking by hand
pub async fn print_roster_sheet(
    State(state): State<AppState>,
    Path(group): Path<Group>,
) -> impl IntoResponse {
    info!("GET /api/print/students/{}/sheet", group);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.print_service.roster_sheet(&session, group) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => error_response("print roster sheet", &e),
    }
}

pub async fn print_roster_info(
    State(state): State<AppState>,
    Path(group): Path<Group>,
) -> impl IntoResponse {
    info!("GET /api/print/students/{}/info", group);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.print_service.roster_info(&session, group) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => error_response("print student info", &e),
    }
}

pub async fn print_attendance_history(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/print/attendance/{}", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.print_service.attendance_history(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use crate::io::rest::test_helpers::{login, parse, send, test_app};
    use axum::http::{Method, StatusCode};
    use shared::PrintDocumentResponse;

    #[tokio::test]
    async fn test_print_documents() {
        let (_, router) = test_app();
        login(&router, "maestro_ninos", "ninos123").await;

        let (status, body) =
            send(&router, Method::GET, "/api/print/students/children/sheet", None).await;
        assert_eq!(status, StatusCode::OK);
        let sheet: PrintDocumentResponse = parse(&body);
        assert_eq!(sheet.title, "Lista de Asistencia - Niños");

        let (status, _) =
            send(&router, Method::GET, "/api/print/students/teens/info", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, Method::GET, "/api/print/attendance/2024", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(parse::<PrintDocumentResponse>(&body).title.ends_with("Niños"));
    }
}
