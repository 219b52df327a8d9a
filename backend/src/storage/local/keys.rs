//! Key names used in the local key-value store.

use chrono::NaiveDate;
use shared::Group;

/// Serialized session used to restore the logged-in user
pub const CURRENT_USER: &str = "currentUser";

/// The whole attendance database (year -> group -> date -> record)
pub const ATTENDANCE_DATABASE: &str = "attendance_database";

/// Roster of a group, e.g. `children_students`
pub fn roster(group: Group) -> String {
    format!("{}_students", group.as_str())
}

/// Marks captured for one group on one day, e.g. `attendance_teens_2024-03-10`
pub fn attendance_marks(group: Group, date: NaiveDate) -> String {
    format!("attendance_{}_{}", group.as_str(), date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(roster(Group::Children), "children_students");
        assert_eq!(roster(Group::Teens), "teens_students");
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(attendance_marks(Group::Teens, date), "attendance_teens_2024-03-10");
    }
}
