//! # REST API for Attendance Capture

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::{error_response, session_or_reject};
use crate::AppState;
use shared::{Group, SubmitAttendanceRequest};

/// Today's sheet for a group
pub async fn get_attendance_sheet(
    State(state): State<AppState>,
    Path(group): Path<Group>,
) -> impl IntoResponse {
    info!("GET /api/groups/{}/attendance/sheet", group);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.attendance_service.open_attendance_sheet(&session, group) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("open attendance sheet", &e),
    }
}

/// Submit today's marks for a group
pub async fn submit_attendance(
    State(state): State<AppState>,
    Path(group): Path<Group>,
    Json(request): Json<SubmitAttendanceRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/groups/{}/attendance - {} marks",
        group,
        request.marks.len()
    );
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state
        .attendance_service
        .submit_attendance(&session, group, &request.marks)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("submit attendance", &e),
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::test_support::{calendar_on, student};
    use crate::io::rest::test_helpers::{login, parse, send, test_app, test_app_with};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shared::{AttendanceSheetResponse, Group, SubmitAttendanceResponse};

    #[tokio::test]
    async fn test_sheet_and_submit_on_sunday() {
        let (app, router) = test_app();
        {
            let mut data = app.data.write();
            data.roster_mut(Group::Children).extend([
                student("c1", "Ana", Group::Children),
                student("c2", "Beto", Group::Children),
                student("c3", "Carla", Group::Children),
            ]);
        }
        login(&router, "maestro_ninos", "ninos123").await;

        let (status, body) =
            send(&router, Method::GET, "/api/groups/children/attendance/sheet", None).await;
        assert_eq!(status, StatusCode::OK);
        let sheet: AttendanceSheetResponse = parse(&body);
        assert_eq!(sheet.students.len(), 3);
        assert_eq!(sheet.formatted_date, "domingo, 10 de marzo de 2024");

        let marks = json!({ "marks": { "c1": true, "c2": false, "ghost": true } });
        let (status, body) =
            send(&router, Method::POST, "/api/groups/children/attendance", Some(marks)).await;
        assert_eq!(status, StatusCode::OK);
        let saved: SubmitAttendanceResponse = parse(&body);
        assert_eq!(saved.year, 2024);
        assert_eq!(saved.record.summary.present, 1);
        assert_eq!(saved.record.summary.total, 3);

        let (status, _) =
            send(&router, Method::GET, "/api/groups/teens/attendance/sheet", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_capture_rejected_off_sunday_and_for_empty_roster() {
        let (_, router) = test_app();
        login(&router, "pastor", "pastor123").await;
        let (status, _) =
            send(&router, Method::GET, "/api/groups/teens/attendance/sheet", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, router) = test_app_with(calendar_on(2024, 3, 13), None);
        login(&router, "pastor", "pastor123").await;
        let marks = json!({ "marks": {} });
        let (status, body) =
            send(&router, Method::POST, "/api/groups/teens/attendance", Some(marks)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("Sundays"));
    }
}
