//! # REST API for Sync and Maintenance
//!
//! Stream status, manual pull/push of an attendance year against the remote
//! store, and the retention trim.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::domain::auth_service::require_admin;
use crate::io::rest::{error_response, session_or_reject};
use crate::AppState;
use shared::{PullResponse, TrimRequest, TrimResponse};

pub async fn get_sync_status(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/sync/status");
    if let Err(response) = session_or_reject(&state) {
        return response;
    }
    (StatusCode::OK, Json(state.sync_service.status())).into_response()
}

/// Merge the remote attendance of a year into the local database
pub async fn pull_attendance(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("POST /api/sync/pull/{}", year);
    if let Err(response) = session_or_reject(&state) {
        return response;
    }

    match state.sync_service.pull_attendance(year).await {
        Ok(merged) => (StatusCode::OK, Json(PullResponse { year, merged })).into_response(),
        Err(e) => error_response("pull attendance", &e),
    }
}

/// Mirror every local record of a year to the remote store
pub async fn push_attendance(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("POST /api/sync/push/{}", year);
    if let Err(response) = session_or_reject(&state) {
        return response;
    }

    match state.sync_service.push_year(year).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("push attendance", &e),
    }
}

/// Drop attendance years outside the retention window (administrator only)
pub async fn trim_attendance(
    State(state): State<AppState>,
    request: Option<Json<TrimRequest>>,
) -> impl IntoResponse {
    let keep_years = request
        .and_then(|Json(r)| r.keep_years)
        .unwrap_or(state.retention_years);
    info!("POST /api/maintenance/trim - keep {} years", keep_years);

    let session = match session_or_reject(&state) {
        Ok(session) => session,
        Err(response) => return response,
    };
    if let Err(e) = require_admin(&session) {
        return error_response("trim attendance", &e);
    }

    match state.sync_service.trim_retention(keep_years).await {
        Ok(removed_years) => {
            (StatusCode::OK, Json(TrimResponse { removed_years })).into_response()
        }
        Err(e) => error_response("trim attendance", &e),
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::test_support::{date, record};
    use crate::io::rest::test_helpers::{login, parse, send, test_app, test_app_with_remote};
    use crate::storage::Collection;
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use serde_json::json;
    use shared::{Group, PullResponse, PushResponse, SyncState, SyncStatusResponse, TrimResponse};

    #[tokio::test]
    async fn test_pull_without_remote_is_unavailable() {
        let (_, router) = test_app();
        login(&router, "pastor", "pastor123").await;

        let (status, _) = send(&router, Method::POST, "/api/sync/pull/2024", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(&router, Method::GET, "/api/sync/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!parse::<SyncStatusResponse>(&body).remote_available);
    }

    #[tokio::test]
    async fn test_push_and_pull_with_remote() {
        let (app, router, remote) = test_app_with_remote();
        app.sync_service.start().await;
        {
            let now = Utc::now();
            let mut data = app.data.write();
            data.attendance
                .insert(2024, record(Group::Teens, date(2024, 3, 3), 4, 5), now);
        }
        login(&router, "pastor", "pastor123").await;

        let (status, body) = send(&router, Method::POST, "/api/sync/push/2024", None).await;
        assert_eq!(status, StatusCode::OK);
        let pushed: PushResponse = parse(&body);
        assert_eq!(pushed.pushed, 1);
        assert_eq!(remote.document_count(Collection::Attendance(2024)), 1);

        let (status, body) = send(&router, Method::POST, "/api/sync/pull/2024", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<PullResponse>(&body).merged, 1);

        let (_, body) = send(&router, Method::GET, "/api/sync/status", None).await;
        let status: SyncStatusResponse = parse(&body);
        assert!(status.remote_available);
        assert!(status.streams.iter().all(|s| s.state == SyncState::Live));

        app.sync_service.shutdown();
    }

    #[tokio::test]
    async fn test_trim_is_admin_only() {
        let (app, router) = test_app();
        {
            let now = Utc::now();
            let mut data = app.data.write();
            data.attendance
                .insert(2021, record(Group::Children, date(2021, 5, 2), 1, 2), now);
            data.attendance
                .insert(2024, record(Group::Children, date(2024, 3, 3), 1, 2), now);
        }

        login(&router, "maestro_ninos", "ninos123").await;
        let (status, _) = send(&router, Method::POST, "/api/maintenance/trim", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        login(&router, "pastor", "pastor123").await;
        let body = json!({ "keep_years": 0 });
        let (status, _) =
            send(&router, Method::POST, "/api/maintenance/trim", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, Method::POST, "/api/maintenance/trim", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<TrimResponse>(&body).removed_years, vec![2021]);
        assert_eq!(app.data.read().attendance.years(), vec![2024]);
    }
}
