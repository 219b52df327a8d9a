//! Process-wide application state.
//!
//! Session, rosters and the attendance database live in one [`AppData`]
//! value behind a lock. Services hold a [`SharedState`] handle and never keep
//! a guard across an `.await`.

use shared::{EntityStream, Group, MigrationReport, Session, Student, SyncState};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::models::AttendanceDatabase;

#[derive(Debug, Clone, PartialEq)]
pub struct AppData {
    pub session: Option<Session>,
    pub rosters: BTreeMap<Group, Vec<Student>>,
    pub attendance: AttendanceDatabase,
    pub streams: BTreeMap<EntityStream, SyncState>,
    pub remote_available: bool,
    pub last_migration: Option<MigrationReport>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            session: None,
            rosters: Group::ALL.iter().map(|g| (*g, Vec::new())).collect(),
            attendance: AttendanceDatabase::new(),
            streams: EntityStream::ALL
                .iter()
                .map(|s| (*s, SyncState::Uninitialized))
                .collect(),
            remote_available: false,
            last_migration: None,
        }
    }
}

impl AppData {
    pub fn roster(&self, group: Group) -> &[Student] {
        self.rosters.get(&group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn roster_mut(&mut self, group: Group) -> &mut Vec<Student> {
        self.rosters.entry(group).or_default()
    }

    /// Find a student in any roster
    pub fn find_student(&self, student_id: &str) -> Option<&Student> {
        self.rosters
            .values()
            .flat_map(|roster| roster.iter())
            .find(|s| s.id == student_id)
    }

    pub fn set_stream(&mut self, stream: EntityStream, state: SyncState) {
        self.streams.insert(stream, state);
    }

    pub fn stream(&self, stream: EntityStream) -> SyncState {
        self.streams
            .get(&stream)
            .copied()
            .unwrap_or(SyncState::Uninitialized)
    }
}

/// Cloneable handle to the application state
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<AppData>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AppData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AppData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Back to the freshly started, nothing-loaded state
    pub fn reset(&self) {
        *self.write() = AppData::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::student;

    #[test]
    fn test_find_student_across_rosters_and_reset() {
        let state = SharedState::new();
        {
            let mut data = state.write();
            data.roster_mut(Group::Teens).push(student("t1", "Camilo", Group::Teens));
            data.set_stream(EntityStream::Attendance, SyncState::Live);
        }

        assert_eq!(state.read().find_student("t1").map(|s| s.group), Some(Group::Teens));
        assert!(state.read().find_student("nope").is_none());
        assert_eq!(state.read().stream(EntityStream::Attendance), SyncState::Live);

        state.reset();
        assert!(state.read().roster(Group::Teens).is_empty());
        assert_eq!(state.read().stream(EntityStream::Attendance), SyncState::Uninitialized);
    }
}
