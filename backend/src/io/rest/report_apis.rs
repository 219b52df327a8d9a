//! # REST API for Reports
//!
//! Every report is computed for the session's role: teachers only ever see
//! their own group, the administrator sees both plus combined figures.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;

use crate::io::rest::session_or_reject;
use crate::AppState;

pub async fn get_summary(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/reports/{}/summary", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.report_service.summary(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/reports/{}/history", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.report_service.history(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// Per-month present totals for the chart
pub async fn get_monthly(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/reports/{}/monthly", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.report_service.monthly(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// Children vs teens totals; teachers get an access-denied payload
pub async fn get_group_comparison(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/reports/{}/groups", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.report_service.groups(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

pub async fn get_year_stats(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    info!("GET /api/reports/{}/stats", year);
    match session_or_reject(&state) {
        Ok(session) => (
            StatusCode::OK,
            Json(state.report_service.year_stats(&session, year)),
        )
            .into_response(),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::test_support::{date, record};
    use crate::io::rest::test_helpers::{login, parse, send, test_app};
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use shared::{Group, GroupComparison, HistoryResponse, ReportSummary, YearStats};

    fn seed(app: &crate::AppState) {
        let mut data = app.data.write();
        let now = Utc::now();
        data.attendance
            .insert(2024, record(Group::Children, date(2024, 3, 3), 6, 10), now);
        data.attendance
            .insert(2024, record(Group::Children, date(2024, 3, 10), 8, 10), now);
        data.attendance
            .insert(2024, record(Group::Teens, date(2024, 3, 10), 5, 7), now);
    }

    #[tokio::test]
    async fn test_reports_require_session() {
        let (_, router) = test_app();
        let (status, _) = send(&router, Method::GET, "/api/reports/2024/summary", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_sees_combined_reports() {
        let (app, router) = test_app();
        seed(&app);
        login(&router, "pastor", "pastor123").await;

        let (status, body) = send(&router, Method::GET, "/api/reports/2024/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        let summary: ReportSummary = parse(&body);
        assert_eq!(summary.sunday_count, 2);
        assert_eq!(summary.averages.len(), 2);
        assert_eq!(summary.best_attendance.unwrap().count, 8);

        let (_, body) = send(&router, Method::GET, "/api/reports/2024/history", None).await;
        let history: HistoryResponse = parse(&body);
        assert_eq!(history.entries[0].date, date(2024, 3, 10));

        let (_, body) = send(&router, Method::GET, "/api/reports/2024/groups", None).await;
        assert_eq!(
            parse::<GroupComparison>(&body),
            GroupComparison::Available {
                children_total: 14,
                teens_total: 5
            }
        );

        let (_, body) = send(&router, Method::GET, "/api/reports/2024/stats", None).await;
        let stats: YearStats = parse(&body);
        assert_eq!(stats.total_sundays, 2);
        assert_eq!(stats.best_month.unwrap().total, 19);
    }

    #[tokio::test]
    async fn test_teacher_reports_are_scoped() {
        let (app, router) = test_app();
        seed(&app);
        login(&router, "maestro_adolescentes", "adolescentes123").await;

        let (_, body) = send(&router, Method::GET, "/api/reports/2024/summary", None).await;
        let summary: ReportSummary = parse(&body);
        assert_eq!(summary.sunday_count, 1);
        assert_eq!(summary.averages.len(), 1);

        let (status, body) = send(&router, Method::GET, "/api/reports/2024/groups", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(matches!(
            parse::<GroupComparison>(&body),
            GroupComparison::AccessDenied { .. }
        ));

        let (status, body) = send(&router, Method::GET, "/api/reports/2023/monthly", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"buckets\""));
    }
}
