use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use shared::{
    AttendanceMark, AttendanceRecord, AttendanceSheetResponse, AttendanceSummary, Group, Session,
    SubmitAttendanceResponse, SyncOutcome,
};
use std::collections::BTreeMap;

use crate::domain::auth_service::{require_group, AuthError};
use crate::domain::calendar::CalendarService;
use crate::domain::state::SharedState;
use crate::domain::sync_service::{settle, SyncService};

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("Not authorized for group {0}")]
    Unauthorized(Group),
    #[error("Attendance can only be taken on Sundays (today is {0})")]
    NotSunday(NaiveDate),
    #[error("Group {0} has no students")]
    EmptyRoster(Group),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<AuthError> for AttendanceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized(group) => AttendanceError::Unauthorized(group),
            other => AttendanceError::Storage(anyhow::Error::new(other)),
        }
    }
}

/// Sunday checklist generation and attendance submission
#[derive(Clone)]
pub struct AttendanceService {
    state: SharedState,
    sync: SyncService,
    calendar: CalendarService,
    sunday_only: bool,
}

impl AttendanceService {
    pub fn new(
        state: SharedState,
        sync: SyncService,
        calendar: CalendarService,
        sunday_only: bool,
    ) -> Self {
        Self {
            state,
            sync,
            calendar,
            sunday_only,
        }
    }

    pub fn sunday_only(&self) -> bool {
        self.sunday_only
    }

    fn check_capture_day(&self) -> Result<NaiveDate, AttendanceError> {
        let today = self.calendar.today();
        if self.sunday_only && !self.calendar.is_sunday(today) {
            return Err(AttendanceError::NotSunday(today));
        }
        Ok(today)
    }

    /// Students to check off today, in roster order
    pub fn open_attendance_sheet(
        &self,
        session: &Session,
        group: Group,
    ) -> Result<AttendanceSheetResponse, AttendanceError> {
        require_group(session, group)?;
        let today = self.check_capture_day()?;

        let students = self.state.read().roster(group).to_vec();
        if students.is_empty() {
            return Err(AttendanceError::EmptyRoster(group));
        }

        Ok(AttendanceSheetResponse {
            group,
            date: today,
            formatted_date: self.calendar.format_long(today),
            students,
        })
    }

    /// Record today's attendance for `group`, replacing any earlier submission
    /// for the same day. Every roster student gets a mark; students missing
    /// from `marks` count as absent.
    pub async fn submit_attendance(
        &self,
        session: &Session,
        group: Group,
        marks: &BTreeMap<String, bool>,
    ) -> Result<SubmitAttendanceResponse, AttendanceError> {
        require_group(session, group)?;
        let today = self.check_capture_day()?;
        let year = today.year();
        let now = self.calendar.now();

        let (record, local) = {
            let mut data = self.state.write();
            let roster = data.roster(group);
            if roster.is_empty() {
                return Err(AttendanceError::EmptyRoster(group));
            }

            let unknown = marks
                .keys()
                .filter(|id| !roster.iter().any(|s| &s.id == *id))
                .count();
            if unknown > 0 {
                warn!("Ignoring {} marks for students not in {}", unknown, group);
            }

            let attendance: Vec<AttendanceMark> = roster
                .iter()
                .map(|student| AttendanceMark {
                    student_id: student.id.clone(),
                    student_name: student.name.clone(),
                    student_age: student.age,
                    present: marks.get(&student.id).copied().unwrap_or(false),
                    date: today,
                    timestamp: now,
                })
                .collect();

            let record = AttendanceRecord {
                date: today,
                group,
                summary: AttendanceSummary::from_marks(&attendance),
                attendance,
                saved_by: session.name.clone(),
                saved_at: now,
            };

            data.attendance
                .insert(year, record.clone(), self.calendar.now_utc());
            let local = self.sync.persist_attendance(&data.attendance, &record);
            (record, local)
        };

        let remote = self.sync.mirror_attendance(year, &record).await;
        let outcome = settle(local, remote)?;

        info!(
            "Saved attendance for {} on {}: {}/{} present ({:?})",
            group, today, record.summary.present, record.summary.total, outcome
        );

        let success_message = match outcome {
            SyncOutcome::CloudSynced => "Asistencia guardada y sincronizada en la nube",
            SyncOutcome::LocalOnly => "Asistencia guardada localmente",
        };
        Ok(SubmitAttendanceResponse {
            year,
            record,
            sync: outcome,
            success_message: success_message.to_string(),
        })
    }
}
