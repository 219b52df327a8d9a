use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the two fixed ministry cohorts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Children,
    Teens,
}

impl Group {
    /// Every group, in the order reports iterate them
    pub const ALL: [Group; 2] = [Group::Children, Group::Teens];

    /// Identifier used in storage keys and remote paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Children => "children",
            Group::Teens => "teens",
        }
    }

    /// Human-readable name used in exports and printed documents
    pub fn display_name(&self) -> &'static str {
        match self {
            Group::Children => "Niños",
            Group::Teens => "Adolescentes",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGroupError(pub String);

impl fmt::Display for ParseGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown group: {}", self.0)
    }
}

impl std::error::Error for ParseGroupError {}

impl FromStr for Group {
    type Err = ParseGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "children" => Ok(Group::Children),
            "teens" => Ok(Group::Teens),
            other => Err(ParseGroupError(other.to_string())),
        }
    }
}

/// Role attached to a user in the static credential table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and edits both groups, and every report
    Admin,
    ChildrenTeacher,
    TeensTeacher,
}

impl Role {
    /// The single group a teacher role is scoped to (None for admin)
    pub fn own_group(&self) -> Option<Group> {
        match self {
            Role::Admin => None,
            Role::ChildrenTeacher => Some(Group::Children),
            Role::TeensTeacher => Some(Group::Teens),
        }
    }
}

/// The "current user" snapshot persisted to restore a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    /// Display name
    pub name: String,
}

/// A student belonging to one group roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Opaque identifier, assigned by the store that created the student
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Guardian names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub group: Group,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_modified_at: Option<DateTime<Utc>>,
    /// Display name of the user that created the student
    pub created_by: String,
}

impl Student {
    /// Case-insensitive name comparison used by the duplicate-name guard
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Editable student fields, used both for creation and for updates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudentFields {
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub parents: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Presence mark for a single student on a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: String,
    pub student_name: String,
    pub student_age: u32,
    pub present: bool,
    pub date: NaiveDate,
    /// Capture time in the reference time zone
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub total: u32,
    /// Rounded percentage; 0 when total is 0
    pub percentage: u32,
}

impl AttendanceSummary {
    pub fn new(present: u32, total: u32) -> Self {
        Self {
            present,
            total,
            percentage: percentage(present, total),
        }
    }

    pub fn from_marks(marks: &[AttendanceMark]) -> Self {
        let present = marks.iter().filter(|m| m.present).count() as u32;
        Self::new(present, marks.len() as u32)
    }
}

/// `round(part / whole * 100)`, or 0 when `whole` is 0
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// One record per group per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub group: Group,
    pub attendance: Vec<AttendanceMark>,
    pub summary: AttendanceSummary,
    /// Display name of the user that saved the record
    pub saved_by: String,
    pub saved_at: DateTime<FixedOffset>,
}

/// Whether a write reached the remote store or only local persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    CloudSynced,
    LocalOnly,
}

/// Lifecycle of an entity stream in the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    LocalOnly,
    Syncing,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStream {
    RosterChildren,
    RosterTeens,
    Attendance,
}

impl EntityStream {
    pub const ALL: [EntityStream; 3] = [
        EntityStream::RosterChildren,
        EntityStream::RosterTeens,
        EntityStream::Attendance,
    ];

    pub fn roster(group: Group) -> Self {
        match group {
            Group::Children => EntityStream::RosterChildren,
            Group::Teens => EntityStream::RosterTeens,
        }
    }
}

// ---------------------------------------------------------------------------
// Session API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session: Session,
    /// Groups this session may open
    pub groups: Vec<Group>,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentDateResponse {
    pub year: i32,
    pub iso_date: NaiveDate,
    /// e.g. "domingo, 7 de enero de 2024"
    pub formatted_date: String,
    pub is_sunday: bool,
    /// False when the Sunday-only guard is on and today is not Sunday
    pub capture_open: bool,
}

// ---------------------------------------------------------------------------
// Roster API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentListResponse {
    pub group: Group,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResponse {
    pub student: Student,
    pub sync: SyncOutcome,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStudentResponse {
    pub student_id: String,
    pub sync: SyncOutcome,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Attendance API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSheetResponse {
    pub group: Group,
    pub date: NaiveDate,
    pub formatted_date: String,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAttendanceRequest {
    /// student id -> present
    pub marks: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAttendanceResponse {
    pub year: i32,
    pub record: AttendanceRecord,
    pub sync: SyncOutcome,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Reports API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAverage {
    pub group: Group,
    pub sundays: u32,
    /// Rounded mean of `present` over the recorded dates; 0 with no dates
    pub average_present: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestAttendance {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub year: i32,
    pub sunday_count: u32,
    pub averages: Vec<GroupAverage>,
    pub best_attendance: Option<BestAttendance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDayStats {
    pub group: Group,
    pub present: u32,
    pub total: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub groups: Vec<GroupDayStats>,
    /// Present/total summed over every visible group (only when more than one is visible)
    pub combined: Option<AttendanceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub year: i32,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    /// 0 = January .. 11 = December
    pub month: u32,
    pub label: String,
    pub children: u32,
    pub teens: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregateResponse {
    pub year: i32,
    pub groups: Vec<Group>,
    pub buckets: Vec<MonthlyBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupComparison {
    Available { children_total: u32, teens_total: u32 },
    AccessDenied { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthTotal {
    pub month: u32,
    pub label: String,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearStats {
    pub year: i32,
    pub total_sundays: u32,
    pub average_attendance: u32,
    pub best_sunday: Option<BestAttendance>,
    pub best_month: Option<MonthTotal>,
}

// ---------------------------------------------------------------------------
// Export / print API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDataResponse {
    pub filename: String,
    pub content: String,
    /// Number of data rows (title and header rows excluded)
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintDocumentResponse {
    pub title: String,
    pub html: String,
}

// ---------------------------------------------------------------------------
// Sync API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Local records examined
    pub examined: usize,
    pub migrated: usize,
    /// Already confirmed present remotely
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub stream: EntityStream,
    pub state: SyncState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusResponse {
    pub remote_available: bool,
    pub streams: Vec<StreamStatus>,
    pub last_migration: Option<MigrationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    pub year: i32,
    pub merged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    pub year: i32,
    pub pushed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrimRequest {
    pub keep_years: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimResponse {
    pub removed_years: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounds_and_guards_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_group_round_trips_through_str() {
        for group in Group::ALL {
            assert_eq!(group.as_str().parse::<Group>().unwrap(), group);
        }
        assert!("adults".parse::<Group>().is_err());
    }

    #[test]
    fn test_student_name_match_is_case_insensitive() {
        let student = Student {
            id: "1".to_string(),
            name: "Ana Gómez".to_string(),
            age: 9,
            phone: None,
            address: None,
            parents: None,
            notes: None,
            group: Group::Children,
            created_at: Utc::now(),
            last_modified_at: None,
            created_by: "Pastor".to_string(),
        };
        assert!(student.has_name("ana gómez"));
        assert!(student.has_name("  ANA GÓMEZ "));
        assert!(!student.has_name("Ana"));
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::ChildrenTeacher).unwrap();
        assert_eq!(json, "\"children_teacher\"");
        assert_eq!(Role::TeensTeacher.own_group(), Some(Group::Teens));
        assert_eq!(Role::Admin.own_group(), None);
    }
}
