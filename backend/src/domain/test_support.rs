//! Builders shared by the domain tests.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use shared::{AttendanceMark, AttendanceRecord, AttendanceSummary, Group, Role, Session, Student};
use std::sync::Arc;

use crate::domain::calendar::{CalendarService, FixedClock};
use crate::domain::models::find_user;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Calendar pinned to noon (Bogota) of the given day
pub fn calendar_on(year: i32, month: u32, day: u32) -> CalendarService {
    let instant = Utc.with_ymd_and_hms(year, month, day, 17, 0, 0).unwrap();
    CalendarService::with_clock(Arc::new(FixedClock::new(instant)))
}

/// 2024-03-10 is a Sunday
pub fn sunday_calendar() -> CalendarService {
    calendar_on(2024, 3, 10)
}

pub fn session_for(role: Role) -> Session {
    let username = match role {
        Role::Admin => "pastor",
        Role::ChildrenTeacher => "maestro_ninos",
        Role::TeensTeacher => "maestro_adolescentes",
    };
    find_user(username).unwrap().session()
}

pub fn admin() -> Session {
    session_for(Role::Admin)
}

pub fn student(id: &str, name: &str, group: Group) -> Student {
    Student {
        id: id.to_string(),
        name: name.to_string(),
        age: 10,
        phone: None,
        address: None,
        parents: None,
        notes: None,
        group,
        created_at: Utc::now(),
        last_modified_at: None,
        created_by: "Pastor".to_string(),
    }
}

fn bogota_noon(day: NaiveDate) -> DateTime<FixedOffset> {
    let offset = FixedOffset::west_opt(5 * 3600).unwrap();
    offset
        .from_local_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
        .unwrap()
}

/// Record with `present` of `total` students marked present
pub fn record(group: Group, day: NaiveDate, present: u32, total: u32) -> AttendanceRecord {
    let attendance: Vec<AttendanceMark> = (0..total)
        .map(|i| AttendanceMark {
            student_id: format!("{}-{}", group, i),
            student_name: format!("Estudiante {}", i),
            student_age: 10,
            present: i < present,
            date: day,
            timestamp: bogota_noon(day),
        })
        .collect();

    AttendanceRecord {
        date: day,
        group,
        summary: AttendanceSummary::from_marks(&attendance),
        attendance,
        saved_by: "Pastor".to_string(),
        saved_at: bogota_noon(day),
    }
}
