//! # REST API for Student Management
//!
//! Endpoints for listing, creating, retrieving, updating, and deleting
//! students of a group roster.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::{error_response, session_or_reject};
use crate::AppState;
use shared::{Group, StudentFields};

/// List the roster of a group, ordered by name
pub async fn list_students(
    State(state): State<AppState>,
    Path(group): Path<Group>,
) -> impl IntoResponse {
    info!("GET /api/groups/{}/students", group);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.roster_service.list_students(&session, group) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("list students", &e),
    }
}

/// Add a student to a group
pub async fn create_student(
    State(state): State<AppState>,
    Path(group): Path<Group>,
    Json(request): Json<StudentFields>,
) -> impl IntoResponse {
    info!("POST /api/groups/{}/students - name: {}", group, request.name);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.roster_service.add_student(&session, group, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => error_response("create student", &e),
    }
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/students/{}", student_id);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.roster_service.get_student(&session, &student_id) {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(e) => error_response("get student", &e),
    }
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<StudentFields>,
) -> impl IntoResponse {
    info!("PUT /api/students/{} - name: {}", student_id, request.name);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state
        .roster_service
        .update_student(&session, &student_id, request)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("update student", &e),
    }
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/students/{}", student_id);
    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.roster_service.remove_student(&session, &student_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("delete student", &e),
    }
}

#[cfg(test)]
mod tests {
    use crate::io::rest::test_helpers::{login, parse, send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shared::{DeleteStudentResponse, Student, StudentListResponse, StudentResponse, SyncOutcome};

    #[tokio::test]
    async fn test_requires_session() {
        let (_, router) = test_app();
        let (status, _) = send(&router, Method::GET, "/api/groups/children/students", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_student_lifecycle() {
        let (_, router) = test_app();
        login(&router, "pastor", "pastor123").await;

        let body = json!({ "name": "  Ana Gómez ", "age": 9, "phone": " " });
        let (status, body) =
            send(&router, Method::POST, "/api/groups/children/students", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let created: StudentResponse = parse(&body);
        assert_eq!(created.student.name, "Ana Gómez");
        assert_eq!(created.student.phone, None);
        assert_eq!(created.sync, SyncOutcome::LocalOnly);
        let id = created.student.id.clone();

        let duplicate = json!({ "name": "ana gómez", "age": 11 });
        let (status, _) =
            send(&router, Method::POST, "/api/groups/children/students", Some(duplicate)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/students/{}", id);
        let update = json!({ "name": "Ana María Gómez", "age": 10, "notes": "Coro" });
        let (status, body) = send(&router, Method::PUT, &uri, Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        let updated: StudentResponse = parse(&body);
        assert!(updated.student.last_modified_at.is_some());

        let (status, body) = send(&router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Student>(&body).notes.as_deref(), Some("Coro"));

        let (status, body) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<DeleteStudentResponse>(&body).student_id, id);

        let (status, _) = send(&router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_teacher_is_scoped_to_own_group() {
        let (_, router) = test_app();
        login(&router, "maestro_adolescentes", "adolescentes123").await;

        let body = json!({ "name": "Juan", "age": 14 });
        let (status, _) =
            send(&router, Method::POST, "/api/groups/teens/students", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) =
            send(&router, Method::POST, "/api/groups/children/students", Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, Method::GET, "/api/groups/teens/students", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<StudentListResponse>(&body).students.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fields_and_unknown_group() {
        let (_, router) = test_app();
        login(&router, "pastor", "pastor123").await;

        let body = json!({ "name": "   ", "age": 9 });
        let (status, _) =
            send(&router, Method::POST, "/api/groups/children/students", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, Method::GET, "/api/groups/adults/students", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
