//! # Sync Service
//!
//! Mirrors the local snapshot into the optional remote document store.
//!
//! Every entity stream (children roster, teens roster, attendance) moves
//! through `Uninitialized -> LocalOnly -> Syncing -> Live`:
//!
//! 1. The local snapshot is loaded into memory unconditionally.
//! 2. If the remote store answers a ping, locally persisted attendance records
//!    the remote store does not have yet are uploaded one by one. A record that
//!    fails is logged and skipped; the sweep goes on.
//! 3. The current year's remote records are merged into memory (remote wins).
//! 4. Each roster collection is watched; every notification replaces the
//!    in-memory roster of its group. Notifications never write to the local
//!    store, so an edit made through the roster service stays durable.
//!
//! Writes always go to the local store first, under the state lock. The remote
//! mirror runs afterwards, bounded by a timeout, and a failure only downgrades
//! that write to local-only.

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::{
    AttendanceRecord, EntityStream, Group, MigrationReport, PushResponse, StreamStatus, Student,
    SyncOutcome, SyncState, SyncStatusResponse,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use chrono::NaiveDate;

use crate::domain::calendar::CalendarService;
use crate::domain::models::AttendanceDatabase;
use crate::domain::state::SharedState;
use crate::storage::{keys, Collection, Document, LocalStore, RemoteStore, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store is not available")]
    RemoteUnavailable,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Remote document id of an attendance record: `<group>_<YYYY-MM-DD>`
pub fn record_document_id(record: &AttendanceRecord) -> String {
    format!("{}_{}", record.group.as_str(), record.date.format("%Y-%m-%d"))
}

/// Split a `<group>_<date>` document id at its first underscore
pub fn parse_document_id(id: &str) -> Option<(Group, NaiveDate)> {
    let (group, date) = id.split_once('_')?;
    let group = group.parse().ok()?;
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    // Only the canonical zero-padded form counts as a key
    (parsed.format("%Y-%m-%d").to_string() == date).then_some((group, parsed))
}

/// Read an attendance record out of a remote document.
///
/// A well-formed id decides group and date; otherwise the body's own
/// `group`/`date` fields are used. Unreadable documents are skipped.
pub fn parse_record_document(document: &Document) -> Option<AttendanceRecord> {
    let mut data = document.data.clone();
    let body = match data.as_object_mut() {
        Some(body) => body,
        None => {
            warn!("Skipping non-object attendance document {}", document.id);
            return None;
        }
    };

    if let Some((group, date)) = parse_document_id(&document.id) {
        body.insert("group".to_string(), Value::String(group.as_str().to_string()));
        body.insert("date".to_string(), Value::String(date.format("%Y-%m-%d").to_string()));
    }

    match serde_json::from_value(data) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping unreadable attendance document {}: {}", document.id, e);
            None
        }
    }
}

/// Read a student out of a roster document; the document id is the student id
pub fn parse_student_document(group: Group, document: &Document) -> Option<Student> {
    let mut data = document.data.clone();
    let body = data.as_object_mut()?;
    body.insert("id".to_string(), Value::String(document.id.clone()));
    body.insert("group".to_string(), Value::String(group.as_str().to_string()));

    match serde_json::from_value(data) {
        Ok(student) => Some(student),
        Err(e) => {
            warn!("Skipping unreadable student document {}: {}", document.id, e);
            None
        }
    }
}

/// Combine the two halves of a dual write: success if either side succeeded
pub fn settle(local: Result<()>, remote_saved: bool) -> Result<SyncOutcome> {
    match (local, remote_saved) {
        (Ok(()), true) => Ok(SyncOutcome::CloudSynced),
        (Ok(()), false) => Ok(SyncOutcome::LocalOnly),
        (Err(e), true) => {
            error!("Local persistence failed, change only reached the remote store: {:#}", e);
            Ok(SyncOutcome::CloudSynced)
        }
        (Err(e), false) => Err(e.context("Change could not be persisted locally or remotely")),
    }
}

#[derive(Clone)]
pub struct SyncService {
    state: SharedState,
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    calendar: CalendarService,
    remote_timeout: Duration,
    listeners: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SyncService {
    pub fn new(
        state: SharedState,
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        calendar: CalendarService,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            state,
            local,
            remote,
            calendar,
            remote_timeout,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bring every stream up: local snapshot, then migration, pull and
    /// subscriptions when the remote store is reachable
    pub async fn start(&self) {
        self.load_local_snapshot();

        let remote = match &self.remote {
            Some(remote) => Arc::clone(remote),
            None => {
                info!("No remote store configured, running local-only");
                return;
            }
        };

        if let Err(e) = self.remote_call("ping", remote.ping()).await {
            warn!("Remote store unavailable, running local-only: {:#}", e);
            return;
        }

        {
            let mut data = self.state.write();
            data.remote_available = true;
            for stream in EntityStream::ALL {
                data.set_stream(stream, SyncState::Syncing);
            }
        }
        info!("Remote store available, starting sync");

        self.migrate_local_records().await;

        let year = self.calendar.current_year();
        match self.pull_attendance(year).await {
            Ok(merged) => info!("Merged {} remote attendance records for {}", merged, year),
            Err(e) => warn!("Initial attendance pull for {} failed: {}", year, e),
        }
        self.state
            .write()
            .set_stream(EntityStream::Attendance, SyncState::Live);

        self.subscribe_rosters().await;
    }

    /// Replace in-memory rosters and attendance with the local snapshot
    pub fn load_local_snapshot(&self) {
        let children: Vec<Student> = self.load_or_default(&keys::roster(Group::Children));
        let teens: Vec<Student> = self.load_or_default(&keys::roster(Group::Teens));
        let attendance: AttendanceDatabase = self.load_or_default(keys::ATTENDANCE_DATABASE);

        info!(
            "Loaded local snapshot: {} children, {} teens, {} attendance years",
            children.len(),
            teens.len(),
            attendance.years().len()
        );

        let mut data = self.state.write();
        *data.roster_mut(Group::Children) = children;
        *data.roster_mut(Group::Teens) = teens;
        data.attendance = attendance;
        for stream in EntityStream::ALL {
            data.set_stream(stream, SyncState::LocalOnly);
        }
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.local.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                error!("Ignoring unreadable local value {}: {:#}", key, e);
                T::default()
            }
        }
    }

    /// Upload every locally persisted attendance record the remote store
    /// does not already hold. One failing record never stops the sweep.
    pub async fn migrate_local_records(&self) -> MigrationReport {
        let mut report = MigrationReport::default();
        let remote = match self.active_remote() {
            Some(remote) => remote,
            None => return report,
        };

        let database: AttendanceDatabase = self.load_or_default(keys::ATTENDANCE_DATABASE);
        for year in database.years() {
            let collection = Collection::Attendance(year);
            let confirmed: HashSet<String> =
                match self.remote_call("listing", remote.list_documents(collection)).await {
                    Ok(documents) => documents.into_iter().map(|d| d.id).collect(),
                    Err(e) => {
                        warn!("Could not list {}, uploading every record: {:#}", collection, e);
                        HashSet::new()
                    }
                };

            for record in database.records(year) {
                report.examined += 1;
                let id = record_document_id(record);
                if confirmed.contains(&id) {
                    report.skipped += 1;
                    continue;
                }

                match self.write_document(&remote, collection, &id, record).await {
                    Ok(()) => {
                        debug!("Migrated {}/{}", collection, id);
                        report.migrated += 1;
                    }
                    Err(e) => {
                        warn!("Skipping {}/{} during migration: {:#}", collection, id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Migration sweep: {} examined, {} migrated, {} already remote, {} failed",
            report.examined, report.migrated, report.skipped, report.failed
        );
        self.state.write().last_migration = Some(report.clone());
        report
    }

    /// Merge a year of remote attendance records into memory and persist the
    /// result locally. Remote records overwrite local ones at the same key.
    pub async fn pull_attendance(&self, year: i32) -> Result<usize, SyncError> {
        let remote = self.active_remote().ok_or(SyncError::RemoteUnavailable)?;
        let snapshot = self
            .remote_call("listing", remote.list_documents(Collection::Attendance(year)))
            .await?;

        let records: Vec<AttendanceRecord> =
            snapshot.iter().filter_map(parse_record_document).collect();
        let merged = records.len();
        let now = self.calendar.now_utc();

        let mut data = self.state.write();
        for record in records {
            data.attendance.insert(year, record, now);
        }
        self.local
            .save(keys::ATTENDANCE_DATABASE, &data.attendance)
            .context("Failed to persist merged attendance")?;

        Ok(merged)
    }

    /// Re-mirror every record of `year`, continuing past failures
    pub async fn push_year(&self, year: i32) -> Result<PushResponse, SyncError> {
        let remote = self.active_remote().ok_or(SyncError::RemoteUnavailable)?;
        let records: Vec<AttendanceRecord> = self
            .state
            .read()
            .attendance
            .records(year)
            .into_iter()
            .cloned()
            .collect();

        let collection = Collection::Attendance(year);
        let mut response = PushResponse {
            year,
            pushed: 0,
            failed: 0,
        };
        for record in &records {
            let id = record_document_id(record);
            match self.write_document(&remote, collection, &id, record).await {
                Ok(()) => response.pushed += 1,
                Err(e) => {
                    warn!("Failed to push {}/{}: {:#}", collection, id, e);
                    response.failed += 1;
                }
            }
        }

        info!("Pushed {} records of {} ({} failed)", response.pushed, year, response.failed);
        Ok(response)
    }

    /// Drop attendance years outside the last `keep_years` years, locally
    /// and, best effort, from the remote store
    pub async fn trim_retention(&self, keep_years: u32) -> Result<Vec<i32>, SyncError> {
        if keep_years == 0 {
            return Err(SyncError::Validation(
                "At least one year must be kept".to_string(),
            ));
        }
        let window = i32::try_from(keep_years).unwrap_or(i32::MAX);
        let oldest_kept = self.calendar.current_year().saturating_sub(window - 1);

        let removed = {
            let mut data = self.state.write();
            let removed = data.attendance.trim(oldest_kept);
            if !removed.is_empty() {
                self.local
                    .save(keys::ATTENDANCE_DATABASE, &data.attendance)
                    .context("Failed to persist trimmed attendance")?;
                info!("Removed attendance years {:?}", removed);
            }
            removed
        };

        if let Some(remote) = self.active_remote() {
            for year in &removed {
                self.remove_remote_year(&remote, *year).await;
            }
        }
        Ok(removed)
    }

    async fn remove_remote_year(&self, remote: &Arc<dyn RemoteStore>, year: i32) {
        let collection = Collection::Attendance(year);
        let documents = match self
            .remote_call("listing", remote.list_documents(collection))
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Remote {} left in place: {:#}", collection, e);
                return;
            }
        };

        for document in documents {
            if let Err(e) = self
                .remote_call("delete", remote.delete_document(collection, &document.id))
                .await
            {
                warn!("Failed to delete {}/{}: {:#}", collection, document.id, e);
            }
        }
    }

    /// Watch both roster collections and feed their snapshots into memory
    pub async fn subscribe_rosters(&self) {
        let remote = match self.active_remote() {
            Some(remote) => remote,
            None => return,
        };

        for group in Group::ALL {
            let stream = EntityStream::roster(group);
            match self
                .remote_call("subscription", remote.subscribe(Collection::Students(group)))
                .await
            {
                Ok(receiver) => {
                    let handle = self.spawn_roster_listener(group, receiver);
                    self.listeners
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(handle);
                    self.state.write().set_stream(stream, SyncState::Live);
                    info!("Roster {} is live", group);
                }
                Err(e) => {
                    warn!("Roster {} stays local-only: {:#}", group, e);
                    self.state.write().set_stream(stream, SyncState::LocalOnly);
                }
            }
        }
    }

    fn spawn_roster_listener(
        &self,
        group: Group,
        mut receiver: watch::Receiver<Snapshot>,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                service.apply_roster_snapshot(group, &snapshot);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
            debug!("Roster {} subscription closed", group);
            service
                .state
                .write()
                .set_stream(EntityStream::roster(group), SyncState::LocalOnly);
        })
    }

    /// Replace the in-memory roster of `group` with a remote snapshot
    pub fn apply_roster_snapshot(&self, group: Group, snapshot: &[Document]) -> usize {
        let students: Vec<Student> = snapshot
            .iter()
            .filter_map(|document| parse_student_document(group, document))
            .collect();
        let count = students.len();

        *self.state.write().roster_mut(group) = students;
        debug!("Roster {} replaced by remote snapshot ({} students)", group, count);
        count
    }

    pub fn persist_roster(&self, group: Group, students: &[Student]) -> Result<()> {
        self.local.save(&keys::roster(group), students)
    }

    /// Persist the whole attendance database plus the ad hoc marks key of `record`
    pub fn persist_attendance(
        &self,
        database: &AttendanceDatabase,
        record: &AttendanceRecord,
    ) -> Result<()> {
        self.local.save(keys::ATTENDANCE_DATABASE, database)?;
        self.local.save(
            &keys::attendance_marks(record.group, record.date),
            &record.attendance,
        )
    }

    pub async fn mirror_student(&self, student: &Student) -> bool {
        let collection = Collection::Students(student.group);
        self.mirror(collection, &student.id, student).await
    }

    pub async fn mirror_student_removal(&self, group: Group, student_id: &str) -> bool {
        let remote = match self.active_remote() {
            Some(remote) => remote,
            None => return false,
        };
        let collection = Collection::Students(group);
        match self
            .remote_call("delete", remote.delete_document(collection, student_id))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Delete of {}/{} stays local-only: {:#}", collection, student_id, e);
                false
            }
        }
    }

    pub async fn mirror_attendance(&self, year: i32, record: &AttendanceRecord) -> bool {
        let id = record_document_id(record);
        self.mirror(Collection::Attendance(year), &id, record).await
    }

    async fn mirror<T: Serialize + Sync>(&self, collection: Collection, id: &str, value: &T) -> bool {
        let remote = match self.active_remote() {
            Some(remote) => remote,
            None => return false,
        };
        match self.write_document(&remote, collection, id, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Write of {}/{} stays local-only: {:#}", collection, id, e);
                false
            }
        }
    }

    async fn write_document<T: Serialize + Sync>(
        &self,
        remote: &Arc<dyn RemoteStore>,
        collection: Collection,
        id: &str,
        value: &T,
    ) -> Result<()> {
        let data = serde_json::to_value(value)?;
        self.remote_call("write", remote.set_document(collection, id, data))
            .await
    }

    async fn remote_call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(result) => result.with_context(|| format!("Remote {} failed", operation)),
            Err(_) => Err(anyhow!(
                "Remote {} timed out after {:?}",
                operation,
                self.remote_timeout
            )),
        }
    }

    fn active_remote(&self) -> Option<Arc<dyn RemoteStore>> {
        if self.state.read().remote_available {
            self.remote.clone()
        } else {
            None
        }
    }

    pub fn status(&self) -> SyncStatusResponse {
        let data = self.state.read();
        SyncStatusResponse {
            remote_available: data.remote_available,
            streams: data
                .streams
                .iter()
                .map(|(stream, state)| StreamStatus {
                    stream: *stream,
                    state: *state,
                })
                .collect(),
            last_migration: data.last_migration.clone(),
        }
    }

    /// Stop every roster listener and drop the in-memory state
    pub fn shutdown(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in listeners.drain(..) {
            handle.abort();
        }
        self.state.reset();
        info!("Sync service stopped");
    }
}
