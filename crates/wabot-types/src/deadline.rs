//! Deadline date arithmetic shared by the task listing and the daily sweep.
//!
//! Deadlines are stored as `DD.MM` with no year; every computation pins the
//! date to the current year.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MS_PER_DAY: i64 = 86_400_000;

/// `DD.MM`, two digits each. No calendar-validity check beyond the shape.
static DEADLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})\.(\d{2})$").expect("deadline regex is valid"));

/// Whether `s` matches the `DD.MM` deadline shape.
pub fn is_valid_deadline(s: &str) -> bool {
    DEADLINE_RE.is_match(s)
}

/// Split a `DD.MM` string into (day, month). `None` if the shape is wrong.
pub fn parse_deadline(s: &str) -> Option<(u32, u32)> {
    let caps = DEADLINE_RE.captures(s)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// The calendar date a deadline falls on, pinned to `year`.
///
/// Out-of-range day or month components roll over into adjacent months and
/// years, so `31.02` lands in early March rather than being rejected.
pub fn deadline_date(day: u32, month: u32, year: i32) -> Option<NaiveDate> {
    let months = i64::from(year) * 12 + i64::from(month) - 1;
    let y = i32::try_from(months.div_euclid(12)).ok()?;
    let m = u32::try_from(months.rem_euclid(12) + 1).ok()?;
    let first = NaiveDate::from_ymd_opt(y, m, 1)?;
    first.checked_add_signed(Duration::days(i64::from(day) - 1))
}

/// Days left until `deadline`, measured from `now` in local wall-clock time.
///
/// A deadline date already behind `now` yields 0, never a negative count.
/// Otherwise the distance to the deadline's midnight is divided into days
/// and rounded up, so a due date five calendar days out reads "5" all day.
pub fn remaining_days(deadline: &str, now: NaiveDateTime) -> i64 {
    let Some((day, month)) = parse_deadline(deadline) else {
        return 0;
    };
    let Some(date) = deadline_date(day, month, now.year()) else {
        return 0;
    };
    let midnight = date.and_time(NaiveTime::MIN);
    if midnight < now {
        return 0;
    }
    let diff_ms = (midnight - now).num_milliseconds();
    (diff_ms + MS_PER_DAY - 1) / MS_PER_DAY
}

/// Whether the daily sweep removes this task today.
///
/// A task is removed once its deadline month equals the current month and
/// its day component has been reached. A task whose month is already behind
/// stays until that month comes round again.
pub fn due_for_deletion(deadline: &str, today: NaiveDate) -> bool {
    match parse_deadline(deadline) {
        Some((day, month)) => {
            month == today.month() && i64::from(day) - i64::from(today.day()) <= 0
        }
        None => false,
    }
}

/// Wall-clock time at the given UTC offset (minutes east).
///
/// An out-of-range offset falls back to UTC.
pub fn local_now(utc_offset_minutes: i32) -> NaiveDateTime {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    Utc::now().with_timezone(&offset).naive_local()
}
