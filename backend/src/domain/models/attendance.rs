//! In-memory attendance database: year -> group -> date -> record.
//!
//! The whole structure is persisted as one value under `attendance_database`,
//! so its serialized shape is part of the local storage format:
//!
//! ```json
//! { "2024": { "children": { "2024-03-10": { ... } }, "teens": { }, "created_at": "..." } }
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{AttendanceRecord, Group};
use std::collections::{BTreeMap, BTreeSet};

/// Records of one year, one map per group keyed by calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearAttendance {
    #[serde(default)]
    pub children: BTreeMap<NaiveDate, AttendanceRecord>,
    #[serde(default)]
    pub teens: BTreeMap<NaiveDate, AttendanceRecord>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl YearAttendance {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            children: BTreeMap::new(),
            teens: BTreeMap::new(),
            created_at,
        }
    }

    pub fn group(&self, group: Group) -> &BTreeMap<NaiveDate, AttendanceRecord> {
        match group {
            Group::Children => &self.children,
            Group::Teens => &self.teens,
        }
    }

    pub fn group_mut(&mut self, group: Group) -> &mut BTreeMap<NaiveDate, AttendanceRecord> {
        match group {
            Group::Children => &mut self.children,
            Group::Teens => &mut self.teens,
        }
    }

    /// Every date with a record in at least one of `groups`
    pub fn dates(&self, groups: &[Group]) -> BTreeSet<NaiveDate> {
        groups
            .iter()
            .flat_map(|group| self.group(*group).keys().copied())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.children.len() + self.teens.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceDatabase {
    years: BTreeMap<i32, YearAttendance>,
}

impl AttendanceDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year(&self, year: i32) -> Option<&YearAttendance> {
        self.years.get(&year)
    }

    /// Get the bucket for `year`, creating it on first access
    pub fn ensure_year(&mut self, year: i32, now: DateTime<Utc>) -> &mut YearAttendance {
        self.years
            .entry(year)
            .or_insert_with(|| YearAttendance::new(now))
    }

    /// Store `record` under (year, group, date), replacing any existing record.
    /// Returns the record it replaced.
    pub fn insert(
        &mut self,
        year: i32,
        record: AttendanceRecord,
        now: DateTime<Utc>,
    ) -> Option<AttendanceRecord> {
        self.ensure_year(year, now)
            .group_mut(record.group)
            .insert(record.date, record)
    }

    pub fn get(&self, year: i32, group: Group, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.years.get(&year)?.group(group).get(&date)
    }

    /// Every record of a year, children first, each group in date order
    pub fn records(&self, year: i32) -> Vec<&AttendanceRecord> {
        match self.years.get(&year) {
            Some(bucket) => Group::ALL
                .iter()
                .flat_map(|group| bucket.group(*group).values())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn years(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    /// Drop every year before `oldest_kept`, returning the removed years
    pub fn trim(&mut self, oldest_kept: i32) -> Vec<i32> {
        let retained = self.years.split_off(&oldest_kept);
        let removed = std::mem::replace(&mut self.years, retained);
        removed.into_keys().collect()
    }
}
