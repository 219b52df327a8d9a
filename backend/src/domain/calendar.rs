//! Calendar logic for attendance capture.
//!
//! "Today" is always the calendar day in Bogota (UTC-5, no daylight saving),
//! whatever the zone of the machine running the server, so every device
//! files a Sunday's attendance under the same date key.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use shared::CurrentDateResponse;
use std::sync::Arc;

/// Seconds west of UTC for America/Bogota
const BOGOTA_WEST_SECS: i32 = 5 * 3600;

const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.instant
    }
}

pub fn bogota_offset() -> FixedOffset {
    FixedOffset::west_opt(BOGOTA_WEST_SECS).unwrap_or_else(|| Utc.fix())
}

/// Short month label, `month` counted from 0 (January)
pub fn month_label(month: u32) -> &'static str {
    MONTH_LABELS.get(month as usize).copied().unwrap_or("")
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// Calendar service that resolves dates in the reference time zone
#[derive(Clone)]
pub struct CalendarService {
    clock: Arc<dyn Clock>,
}

impl Default for CalendarService {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarService {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Current instant in Bogota time
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now_utc().with_timezone(&bogota_offset())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn current_year(&self) -> i32 {
        self.today().year()
    }

    pub fn is_sunday(&self, date: NaiveDate) -> bool {
        date.weekday() == Weekday::Sun
    }

    /// e.g. "domingo, 7 de enero de 2024"
    pub fn format_long(&self, date: NaiveDate) -> String {
        format!(
            "{}, {} de {} de {}",
            weekday_name(date.weekday()),
            date.day(),
            MONTH_NAMES[date.month0() as usize],
            date.year()
        )
    }

    /// e.g. "7/1/2024"
    pub fn format_short(&self, date: NaiveDate) -> String {
        format!("{}/{}/{}", date.day(), date.month(), date.year())
    }

    pub fn current_date(&self, sunday_only: bool) -> CurrentDateResponse {
        let today = self.today();
        let is_sunday = self.is_sunday(today);

        CurrentDateResponse {
            year: today.year(),
            iso_date: today,
            formatted_date: self.format_long(today),
            is_sunday,
            capture_open: is_sunday || !sunday_only,
        }
    }
}
