//! # Attendance Tracker Backend
//!
//! Everything except the UI for the children and teens attendance tracker.
//!
//! The backend brings together:
//! - **Domain**: sessions, rosters, Sunday attendance, reports, export and print
//! - **Storage**: the local key-value store and the remote document store
//! - **IO**: the REST API the frontend talks to
//!
//! ## Architecture
//!
//! ```text
//! UI Layer (frontend)
//!     ↓
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (services over the shared application state)
//!     ↓
//! Storage Layer (local key-value store, remote document store)
//! ```

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::domain::{
    AttendanceService, AuthService, CalendarService, ExportService, PrintService,
    ReportService, RosterService, SharedState, SyncService,
};
use crate::storage::{DirectoryDocumentStore, FileKeyValueStore, LocalStore, RemoteStore};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub data: SharedState,
    pub auth_service: AuthService,
    pub calendar_service: CalendarService,
    pub sync_service: SyncService,
    pub roster_service: RosterService,
    pub attendance_service: AttendanceService,
    pub report_service: ReportService,
    pub export_service: ExportService,
    pub print_service: PrintService,
    /// Default window for the retention trim
    pub retention_years: u32,
}

impl AppState {
    /// Wire every service over one shared state, without touching storage
    pub fn assemble(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        calendar: CalendarService,
        config: &AppConfig,
    ) -> Self {
        let data = SharedState::new();
        let sync_service = SyncService::new(
            data.clone(),
            local.clone(),
            remote,
            calendar.clone(),
            config.remote_timeout(),
        );

        Self {
            auth_service: AuthService::new(data.clone(), local),
            roster_service: RosterService::new(data.clone(), sync_service.clone(), calendar.clone()),
            attendance_service: AttendanceService::new(
                data.clone(),
                sync_service.clone(),
                calendar.clone(),
                config.attendance.sunday_only,
            ),
            report_service: ReportService::new(data.clone()),
            export_service: ExportService::new(data.clone(), calendar.clone()),
            print_service: PrintService::new(data.clone(), calendar.clone()),
            calendar_service: calendar,
            sync_service,
            retention_years: config.attendance.retention_years,
            data,
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("Setting up local storage in {}", config.data_directory.display());
    let file_store = FileKeyValueStore::new(&config.data_directory)?;
    let local = LocalStore::new(Arc::new(file_store));

    let remote: Option<Arc<dyn RemoteStore>> = match &config.remote.directory {
        Some(directory) if config.remote.enabled => {
            info!("Using remote document store at {}", directory.display());
            Some(Arc::new(DirectoryDocumentStore::new(
                directory,
                config.poll_interval(),
            )))
        }
        _ => None,
    };

    info!("Setting up domain model");
    let app_state = AppState::assemble(local, remote, CalendarService::new(), config);

    app_state.sync_service.start().await;
    if let Some(session) = app_state.auth_service.restore_session() {
        info!("Resuming session of {}", session.name);
    }

    Ok(app_state)
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Router {
    // CORS setup to allow the frontend to make requests
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any origin", cors_origin);
            cors.allow_origin(Any)
        }
    };

    let api_routes = Router::new()
        // Session
        .route(
            "/session",
            get(io::get_session).delete(io::logout),
        )
        .route("/session/login", post(io::login))
        .route("/date", get(io::get_current_date))
        // Rosters
        .route(
            "/groups/:group/students",
            get(io::list_students).post(io::create_student),
        )
        .route(
            "/students/:id",
            get(io::get_student)
                .put(io::update_student)
                .delete(io::delete_student),
        )
        // Attendance
        .route("/groups/:group/attendance/sheet", get(io::get_attendance_sheet))
        .route("/groups/:group/attendance", post(io::submit_attendance))
        // Reports
        .route("/reports/:year/summary", get(io::get_summary))
        .route("/reports/:year/history", get(io::get_history))
        .route("/reports/:year/monthly", get(io::get_monthly))
        .route("/reports/:year/groups", get(io::get_group_comparison))
        .route("/reports/:year/stats", get(io::get_year_stats))
        // Export and print
        .route("/export/students/:group", get(io::export_students))
        .route("/export/attendance/:year", get(io::export_attendance))
        .route("/print/students/:group/sheet", get(io::print_roster_sheet))
        .route("/print/students/:group/info", get(io::print_roster_info))
        .route("/print/attendance/:year", get(io::print_attendance_history))
        // Sync and maintenance
        .route("/sync/status", get(io::get_sync_status))
        .route("/sync/pull/:year", post(io::pull_attendance))
        .route("/sync/push/:year", post(io::push_attendance))
        .route("/maintenance/trim", post(io::trim_attendance));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state)
}
