//! Role-scoped aggregation over the attendance database.
//!
//! Every report goes through [`visible_groups`]: the administrator sees both
//! groups, a teacher only their own. The aggregation functions are pure; the
//! service only takes a read snapshot of the state.

use chrono::{Datelike, NaiveDate};
use shared::{
    AttendanceSummary, BestAttendance, Group, GroupAverage, GroupComparison,
    GroupDayStats, HistoryEntry, HistoryResponse, MonthTotal, MonthlyAggregateResponse,
    MonthlyBucket, ReportSummary, Role, Session, YearStats,
};
use std::collections::BTreeMap;

use crate::domain::auth_service::visible_groups;
use crate::domain::calendar::month_label;
use crate::domain::models::{AttendanceDatabase, YearAttendance};
use crate::domain::state::SharedState;

pub const GROUP_COMPARISON_DENIED: &str = "Solo disponible para el pastor";

/// Rounded mean, 0 when there is nothing to average
fn rounded_mean(sum: u32, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u32
}

/// Present count of every visible group summed per date
fn combined_by_date(bucket: &YearAttendance, groups: &[Group]) -> BTreeMap<NaiveDate, u32> {
    let mut totals = BTreeMap::new();
    for group in groups {
        for (date, record) in bucket.group(*group) {
            *totals.entry(*date).or_insert(0) += record.summary.present;
        }
    }
    totals
}

/// First entry with the highest non-zero value; later ties do not replace it
fn first_max<K: Copy, I: IntoIterator<Item = (K, u32)>>(entries: I) -> Option<(K, u32)> {
    let mut best: Option<(K, u32)> = None;
    for (key, count) in entries {
        if count > best.map_or(0, |(_, best_count)| best_count) {
            best = Some((key, count));
        }
    }
    best
}

pub fn summarize(db: &AttendanceDatabase, year: i32, role: Role) -> ReportSummary {
    let groups = visible_groups(role);
    let bucket = match db.year(year) {
        Some(bucket) => bucket,
        None => {
            return ReportSummary {
                year,
                sunday_count: 0,
                averages: groups
                    .iter()
                    .map(|group| GroupAverage {
                        group: *group,
                        sundays: 0,
                        average_present: 0,
                    })
                    .collect(),
                best_attendance: None,
            }
        }
    };

    let averages = groups
        .iter()
        .map(|group| {
            let records = bucket.group(*group);
            let present: u32 = records.values().map(|r| r.summary.present).sum();
            GroupAverage {
                group: *group,
                sundays: records.len() as u32,
                average_present: rounded_mean(present, records.len() as u32),
            }
        })
        .collect();

    let best_attendance = first_max(groups.iter().flat_map(|group| {
        bucket
            .group(*group)
            .iter()
            .map(|(date, record)| (*date, record.summary.present))
    }))
    .map(|(date, count)| BestAttendance { date, count });

    ReportSummary {
        year,
        sunday_count: bucket.dates(&groups).len() as u32,
        averages,
        best_attendance,
    }
}

/// Per-date stats, most recent first
pub fn history(db: &AttendanceDatabase, year: i32, role: Role) -> HistoryResponse {
    let groups = visible_groups(role);
    let bucket = match db.year(year) {
        Some(bucket) => bucket,
        None => {
            return HistoryResponse {
                year,
                entries: Vec::new(),
            }
        }
    };

    let entries = bucket
        .dates(&groups)
        .into_iter()
        .rev()
        .map(|date| {
            let stats: Vec<GroupDayStats> = groups
                .iter()
                .map(|group| {
                    let summary = bucket
                        .group(*group)
                        .get(&date)
                        .map(|r| r.summary)
                        .unwrap_or_default();
                    GroupDayStats {
                        group: *group,
                        present: summary.present,
                        total: summary.total,
                        percentage: summary.percentage,
                    }
                })
                .collect();

            let combined = (stats.len() > 1).then(|| {
                AttendanceSummary::new(
                    stats.iter().map(|s| s.present).sum(),
                    stats.iter().map(|s| s.total).sum(),
                )
            });

            HistoryEntry {
                date,
                groups: stats,
                combined,
            }
        })
        .collect();

    HistoryResponse { year, entries }
}

/// Present counts bucketed by calendar month (0 = January)
pub fn monthly_aggregate(db: &AttendanceDatabase, year: i32, role: Role) -> MonthlyAggregateResponse {
    let groups = visible_groups(role);
    let mut buckets: Vec<MonthlyBucket> = (0..12)
        .map(|month| MonthlyBucket {
            month,
            label: month_label(month).to_string(),
            children: 0,
            teens: 0,
            total: 0,
        })
        .collect();

    if let Some(bucket) = db.year(year) {
        for group in &groups {
            for (date, record) in bucket.group(*group) {
                let slot = &mut buckets[date.month0() as usize];
                match group {
                    Group::Children => slot.children += record.summary.present,
                    Group::Teens => slot.teens += record.summary.present,
                }
                slot.total += record.summary.present;
            }
        }
    }

    MonthlyAggregateResponse {
        year,
        groups,
        buckets,
    }
}

/// Yearly present totals per group; administrator only
pub fn group_aggregate(db: &AttendanceDatabase, year: i32, role: Role) -> GroupComparison {
    if role != Role::Admin {
        return GroupComparison::AccessDenied {
            message: GROUP_COMPARISON_DENIED.to_string(),
        };
    }

    let total = |group: Group| -> u32 {
        db.year(year)
            .map(|bucket| bucket.group(group).values().map(|r| r.summary.present).sum::<u32>())
            .unwrap_or(0)
    };

    GroupComparison::Available {
        children_total: total(Group::Children),
        teens_total: total(Group::Teens),
    }
}

pub fn year_stats(db: &AttendanceDatabase, year: i32, role: Role) -> YearStats {
    let groups = visible_groups(role);
    let daily = db
        .year(year)
        .map(|bucket| combined_by_date(bucket, &groups))
        .unwrap_or_default();

    let total_present: u32 = daily.values().sum();
    let best_sunday = first_max(daily.iter().map(|(date, count)| (*date, *count)))
        .map(|(date, count)| BestAttendance { date, count });

    let mut months = [0u32; 12];
    for (date, count) in &daily {
        months[date.month0() as usize] += count;
    }
    let best_month = first_max(months.iter().enumerate().map(|(m, total)| (m as u32, *total)))
        .map(|(month, total)| MonthTotal {
            month,
            label: month_label(month).to_string(),
            total,
        });

    YearStats {
        year,
        total_sundays: daily.len() as u32,
        average_attendance: rounded_mean(total_present, daily.len() as u32),
        best_sunday,
        best_month,
    }
}

/// Report read side over the shared state
#[derive(Clone)]
pub struct ReportService {
    state: SharedState,
}

impl ReportService {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    pub fn summary(&self, session: &Session, year: i32) -> ReportSummary {
        summarize(&self.state.read().attendance, year, session.role)
    }

    pub fn history(&self, session: &Session, year: i32) -> HistoryResponse {
        history(&self.state.read().attendance, year, session.role)
    }

    pub fn monthly(&self, session: &Session, year: i32) -> MonthlyAggregateResponse {
        monthly_aggregate(&self.state.read().attendance, year, session.role)
    }

    pub fn groups(&self, session: &Session, year: i32) -> GroupComparison {
        group_aggregate(&self.state.read().attendance, year, session.role)
    }

    pub fn year_stats(&self, session: &Session, year: i32) -> YearStats {
        year_stats(&self.state.read().attendance, year, session.role)
    }
}
