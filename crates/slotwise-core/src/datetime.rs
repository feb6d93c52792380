//! Date and time phrase resolution against an injected reference instant.
//!
//! Converts phrases such as "next Friday", "25th of January" or "3:30 pm"
//! into absolute calendar dates and clock times in the target zone. The
//! reference instant is always an explicit argument, so the same phrases
//! and instant resolve to the same values every time.
//!
//! # Date grammar
//!
//! - Keywords: `today`, `tonight`, `tomorrow`, `day after tomorrow`
//! - Offsets: `in 3 days`, `in two weeks`, `a week from today`
//! - Weekdays: bare or `this friday` → 0–6 days ahead; `next`/`coming
//!   friday` → 1–7 days ahead
//! - Explicit: `2026-10-23`, `23/10/2026` and `23/10` (day first), `23 Oct`,
//!   `23rd of October 2026`, `October 23`, `the 23rd`
//! - Explicit with a weekday: `Friday, 23 October`, `Fri the 23rd`; the
//!   weekday must agree with the date
//!
//! Phrases naming a span (`next week`, `sometime next week`, `friday or
//! saturday`) are reported as ranges rather than collapsed to an arbitrary
//! day.
//!
//! # Time grammar
//!
//! `3pm`, `3:30 p.m.`, `15:00`, `1530`, `noon`, `midnight`, `3 in the
//! afternoon`, and the period words `morning` (09:00), `afternoon` (14:00),
//! `evening` (18:00), `night` (20:00). `H:MM` without a meridiem is read as
//! a 24-hour clock; a bare hour from 1 to 12 without one is ambiguous.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc, Weekday};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::TargetZone;

/// Certainty of an explicit calendar date.
pub const EXPLICIT_DATE_CERTAINTY: f32 = 1.0;
/// Certainty of `today`/`tomorrow`/offset phrases.
pub const RELATIVE_DATE_CERTAINTY: f32 = 0.95;
/// Certainty of weekday-based phrases.
pub const WEEKDAY_CERTAINTY: f32 = 0.9;
/// Certainty of an explicit clock time.
pub const EXPLICIT_TIME_CERTAINTY: f32 = 1.0;
/// Certainty of `around 3pm`.
pub const APPROXIMATE_TIME_CERTAINTY: f32 = 0.85;
/// Certainty of `morning`, `evening`, etc.
pub const PERIOD_TIME_CERTAINTY: f32 = 0.8;

/// Why a present phrase could not be resolved to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unresolved {
    /// Names a span ("next week", "2-4pm"), not a point.
    Range,
    /// Not understood by the grammar.
    Unrecognized,
    /// Well-formed but impossible, e.g. 31 February.
    InvalidCalendarDate,
    /// Resolves to a day before the reference date.
    InPast,
    /// An hour from 1 to 12 with no am/pm.
    AmbiguousMeridiem,
    /// Names a weekday that the stated date does not fall on.
    WeekdayMismatch,
}

impl Unresolved {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Unrecognized => "unrecognized",
            Self::InvalidCalendarDate => "invalid_calendar_date",
            Self::InPast => "in_past",
            Self::AmbiguousMeridiem => "ambiguous_meridiem",
            Self::WeekdayMismatch => "weekday_mismatch",
        }
    }
}

/// A single resolved value and how sure the resolver is of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub certainty: f32,
    /// Derived from the reference date rather than stated outright.
    pub relative: bool,
}

/// Resolution state of one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldResolution<T> {
    Absent,
    Resolved(Resolved<T>),
    Unresolved { reason: Unresolved },
}

impl<T: Copy> FieldResolution<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Resolved(r) => Some(r.value),
            _ => None,
        }
    }

    pub fn certainty(&self) -> Option<f32> {
        match self {
            Self::Resolved(r) => Some(r.certainty),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    fn resolved(value: T, certainty: f32, relative: bool) -> Self {
        Self::Resolved(Resolved {
            value,
            certainty,
            relative,
        })
    }

    fn unresolved(reason: Unresolved) -> Self {
        Self::Unresolved { reason }
    }
}

/// Date and time resolved independently from their phrases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedDateTime {
    pub date: FieldResolution<NaiveDate>,
    pub time: FieldResolution<NaiveTime>,
}

impl ResolvedDateTime {
    /// Normalization confidence of this pair; see
    /// [`normalization_confidence`](crate::confidence::normalization_confidence).
    pub fn confidence(&self) -> f32 {
        crate::confidence::normalization_confidence(self.date.certainty(), self.time.certainty())
    }
}

/// Resolve optional date and time phrases against `reference` in `zone`.
///
/// Absent phrases stay absent; nothing is defaulted.
pub fn resolve(
    date_phrase: Option<&str>,
    time_phrase: Option<&str>,
    reference: DateTime<Utc>,
    zone: &TargetZone,
) -> ResolvedDateTime {
    let today = zone.today(reference);

    let date = match date_phrase {
        Some(phrase) => resolve_date(phrase, today),
        None => FieldResolution::Absent,
    };
    let time = match time_phrase {
        Some(phrase) => resolve_time(phrase),
        None => FieldResolution::Absent,
    };

    debug!(
        ?date_phrase,
        ?time_phrase,
        %today,
        date = ?date,
        time = ?time,
        "resolved date/time phrases"
    );

    ResolvedDateTime { date, time }
}

// ── Dates ──

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})([/.-])(\d{1,2})([/.-])(\d{2}|\d{4})$").expect("valid regex")
});

static DAY_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").expect("valid regex"));

static DAY_OF_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(st|nd|rd|th)?$").expect("valid regex"));

/// Words that turn a phrase into a span when no point grammar matched.
const RANGE_MARKERS: &[&str] = &[
    "week", "weeks", "weekend", "month", "months", "year", "sometime", "some", "between", "or",
    "and", "to", "until", "till", "early", "late", "mid", "end", "beginning", "start", "within",
    "after", "before", "by",
];

/// Filler words stripped from the front of a date phrase.
const DATE_FILLERS: &[&str] = &["on", "the", "for", "of"];

/// Resolve a date phrase relative to `today` (already in the target zone).
pub fn resolve_date(phrase: &str, today: NaiveDate) -> FieldResolution<NaiveDate> {
    let cleaned = clean_phrase(phrase);
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.first().is_some_and(|t| DATE_FILLERS.contains(t)) {
        tokens.remove(0);
    }
    if tokens.is_empty() {
        return FieldResolution::Absent;
    }

    if let Some(resolution) = keyword_date(&tokens, today)
        .or_else(|| offset_date(&tokens, today))
        .or_else(|| weekday_date(&tokens, today))
        .or_else(|| weekday_prefixed_date(&tokens, today))
        .or_else(|| explicit_date(&tokens, today))
    {
        return resolution;
    }

    if tokens.iter().any(|t| RANGE_MARKERS.contains(t)) {
        FieldResolution::unresolved(Unresolved::Range)
    } else {
        FieldResolution::unresolved(Unresolved::Unrecognized)
    }
}

fn keyword_date(tokens: &[&str], today: NaiveDate) -> Option<FieldResolution<NaiveDate>> {
    let days = match tokens {
        ["today"] | ["tonight"] => 0,
        ["tomorrow"] | ["tmrw"] => 1,
        ["day", "after", "tomorrow"] => 2,
        _ => return None,
    };
    Some(relative_days(today, days))
}

fn offset_date(tokens: &[&str], today: NaiveDate) -> Option<FieldResolution<NaiveDate>> {
    let (count, unit) = match tokens {
        ["in", n, unit] => (*n, *unit),
        [n, unit, "from", "now" | "today"] => (*n, *unit),
        _ => return None,
    };
    let count = parse_count(count)?;
    let per_unit = match unit {
        "day" | "days" => 1,
        "week" | "weeks" => 7,
        _ => return None,
    };
    Some(relative_days(today, count * per_unit))
}

fn relative_days(today: NaiveDate, days: u64) -> FieldResolution<NaiveDate> {
    match today.checked_add_days(Days::new(days)) {
        Some(date) => FieldResolution::resolved(date, RELATIVE_DATE_CERTAINTY, true),
        None => FieldResolution::unresolved(Unresolved::InvalidCalendarDate),
    }
}

fn weekday_date(tokens: &[&str], today: NaiveDate) -> Option<FieldResolution<NaiveDate>> {
    let (strictly_after, name) = match tokens {
        [name] | ["this", name] => (false, *name),
        ["next" | "coming" | "upcoming", name] | ["this", "coming", name] => (true, *name),
        _ => return None,
    };
    let weekday = parse_weekday(name)?;

    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (7 + target - current) % 7;
    if strictly_after && ahead == 0 {
        ahead = 7;
    }

    let date = today.checked_add_days(Days::new(u64::from(ahead)))?;
    Some(FieldResolution::resolved(date, WEEKDAY_CERTAINTY, true))
}

/// `friday 23 october`: resolve the explicit part, then hold it to the weekday.
fn weekday_prefixed_date(
    tokens: &[&str],
    today: NaiveDate,
) -> Option<FieldResolution<NaiveDate>> {
    let (first, rest) = tokens.split_first()?;
    let weekday = parse_weekday(first)?;
    let rest: Vec<&str> = rest
        .iter()
        .copied()
        .skip_while(|t| DATE_FILLERS.contains(t))
        .collect();

    Some(match explicit_date(&rest, today)? {
        FieldResolution::Resolved(r) if r.value.weekday() != weekday => {
            FieldResolution::unresolved(Unresolved::WeekdayMismatch)
        }
        other => other,
    })
}

fn explicit_date(tokens: &[&str], today: NaiveDate) -> Option<FieldResolution<NaiveDate>> {
    if let [token] = tokens {
        if let Some(caps) = ISO_DATE.captures(token) {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            return Some(dated(year, month, day, today));
        }
        if let Some(caps) = NUMERIC_DATE.captures(token) {
            // Separators must agree: 23/10/2026, not 23/10-2026.
            if caps[2] != caps[4] {
                return None;
            }
            let day = caps[1].parse().ok()?;
            let month = caps[3].parse().ok()?;
            let mut year: i32 = caps[5].parse().ok()?;
            if caps[5].len() == 2 {
                year += 2000;
            }
            return Some(dated(year, month, day, today));
        }
        if let Some(caps) = DAY_MONTH.captures(token) {
            let day = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            return Some(next_month_day(month, day, today));
        }
        if let Some(caps) = DAY_OF_MONTH.captures(token)
            && caps.get(2).is_some()
        {
            let day = parse_day(token)?;
            return Some(next_day_of_month(day, today));
        }
    }

    let tokens: Vec<&str> = tokens.iter().copied().filter(|t| *t != "of").collect();
    let (day, month, year) = match tokens.as_slice() {
        [a, b] => {
            let (day, month) = day_month(a, b).or_else(|| day_month(b, a))?;
            (day, month, None)
        }
        [a, b, y] => {
            let (day, month) = day_month(a, b).or_else(|| day_month(b, a))?;
            (day, month, Some(parse_year(y)?))
        }
        _ => return None,
    };

    Some(match year {
        Some(year) => dated(year, month, day, today),
        None => next_month_day(month, day, today),
    })
}

/// A fully stated date; rejected if impossible or already past.
fn dated(year: i32, month: u32, day: u32, today: NaiveDate) -> FieldResolution<NaiveDate> {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) if date < today => FieldResolution::unresolved(Unresolved::InPast),
        Some(date) => FieldResolution::resolved(date, EXPLICIT_DATE_CERTAINTY, false),
        None => FieldResolution::unresolved(Unresolved::InvalidCalendarDate),
    }
}

/// Next occurrence of `month`/`day` on or after `today`.
fn next_month_day(month: u32, day: u32, today: NaiveDate) -> FieldResolution<NaiveDate> {
    // Four years covers 29 February.
    (today.year()..=today.year() + 4)
        .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
        .find(|date| *date >= today)
        .map(|date| FieldResolution::resolved(date, EXPLICIT_DATE_CERTAINTY, false))
        .unwrap_or(FieldResolution::unresolved(Unresolved::InvalidCalendarDate))
}

/// Next occurrence of day-of-month `day` on or after `today`.
fn next_day_of_month(day: u32, today: NaiveDate) -> FieldResolution<NaiveDate> {
    let Some(first_of_month) = today.with_day(1) else {
        return FieldResolution::unresolved(Unresolved::InvalidCalendarDate);
    };
    (0..12)
        .filter_map(|m| first_of_month.checked_add_months(Months::new(m)))
        .filter_map(|month_start| month_start.with_day(day))
        .find(|date| *date >= today)
        .map(|date| FieldResolution::resolved(date, EXPLICIT_DATE_CERTAINTY, false))
        .unwrap_or(FieldResolution::unresolved(Unresolved::InvalidCalendarDate))
}

fn day_month(day: &str, month: &str) -> Option<(u32, u32)> {
    Some((parse_day(day)?, parse_month(month)?))
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    Some(match s {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    })
}

fn parse_month(s: &str) -> Option<u32> {
    Some(match s {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    })
}

/// `25`, `25th`, `1st` → day number in 1..=31.
fn parse_day(s: &str) -> Option<u32> {
    let caps = DAY_OF_MONTH.captures(s)?;
    let day: u32 = caps[1].parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() != 4 {
        return None;
    }
    s.parse().ok()
}

/// Small counts as digits or words.
fn parse_count(s: &str) -> Option<u64> {
    Some(match s {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        _ => return s.parse().ok().filter(|n| *n <= 366),
    })
}

// ── Times ──

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm)?$").expect("valid regex")
});

static MILITARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})(?:\s*(?:hrs|hours|h))?$").expect("valid regex"));

static OCLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s*o'?\s*clock$").expect("valid regex"));

static HOUR_IN_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?\s+in\s+the\s+(morning|afternoon|evening)$")
        .expect("valid regex")
});

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d\s*(?:am|pm)?\s*(?:-|–|\bto\b|\bor\b|\band\b|\buntil\b|\btill\b)\s*\d")
        .expect("valid regex")
});

const APPROXIMATE_PREFIXES: &[&str] = &["around", "about", "approximately", "approx", "roughly", "~"];

/// Resolve a time phrase to a clock time.
pub fn resolve_time(phrase: &str) -> FieldResolution<NaiveTime> {
    let mut cleaned = clean_phrase(phrase)
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("a.m", "am")
        .replace("p.m", "pm");
    if cleaned.ends_with('.') {
        cleaned.pop();
    }

    let mut rest = cleaned.trim();
    let mut approximate = false;
    loop {
        if let Some(stripped) = strip_word(rest, "at") {
            rest = stripped;
            continue;
        }
        if let Some(stripped) = APPROXIMATE_PREFIXES.iter().find_map(|p| strip_word(rest, p)) {
            rest = stripped;
            approximate = true;
            continue;
        }
        break;
    }
    if let Some(stripped) = rest.strip_suffix("ish") {
        rest = stripped.trim_end();
        approximate = true;
    }
    if rest.is_empty() {
        return FieldResolution::Absent;
    }

    if rest.contains("between") || TIME_RANGE.is_match(rest) {
        return FieldResolution::unresolved(Unresolved::Range);
    }

    let certainty = if approximate {
        APPROXIMATE_TIME_CERTAINTY
    } else {
        EXPLICIT_TIME_CERTAINTY
    };

    if let Some((hour, minute)) = named_time(rest) {
        return clock(hour, minute, certainty);
    }
    if let Some((hour, minute)) = period_time(rest) {
        return clock(hour, minute, PERIOD_TIME_CERTAINTY.min(certainty));
    }

    if let Some(caps) = CLOCK.captures(rest) {
        let hour: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let minute: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return match (caps.get(3).map(|m| m.as_str()), minute) {
            (Some(meridiem), minute) => {
                with_meridiem(hour, minute.unwrap_or(0), meridiem == "pm", certainty)
            }
            (None, Some(minute)) => clock(hour, minute, certainty),
            (None, None) => bare_hour(hour, certainty),
        };
    }

    if let Some(caps) = HOUR_IN_PERIOD.captures(rest) {
        let hour: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let pm = &caps[3] != "morning";
        return with_meridiem(hour, minute, pm, certainty);
    }

    if let Some(caps) = OCLOCK.captures(rest) {
        let hour: u32 = caps[1].parse().unwrap_or(u32::MAX);
        return bare_hour(hour, certainty);
    }

    if let Some(caps) = MILITARY.captures(rest) {
        let hour: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let minute: u32 = caps[2].parse().unwrap_or(u32::MAX);
        return clock(hour, minute, certainty);
    }

    FieldResolution::unresolved(Unresolved::Unrecognized)
}

fn named_time(s: &str) -> Option<(u32, u32)> {
    match s {
        "noon" | "midday" | "12 noon" | "12 midday" => Some((12, 0)),
        "midnight" | "12 midnight" => Some((0, 0)),
        _ => None,
    }
}

fn period_time(s: &str) -> Option<(u32, u32)> {
    let s = s
        .strip_prefix("in the ")
        .or_else(|| s.strip_prefix("this "))
        .unwrap_or(s);
    match s {
        "morning" => Some((9, 0)),
        "afternoon" => Some((14, 0)),
        "evening" => Some((18, 0)),
        "night" | "tonight" => Some((20, 0)),
        _ => None,
    }
}

fn with_meridiem(hour: u32, minute: u32, pm: bool, certainty: f32) -> FieldResolution<NaiveTime> {
    if !(1..=12).contains(&hour) {
        return FieldResolution::unresolved(Unresolved::Unrecognized);
    }
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    clock(hour, minute, certainty)
}

/// An hour with neither minutes nor meridiem.
fn bare_hour(hour: u32, certainty: f32) -> FieldResolution<NaiveTime> {
    match hour {
        1..=12 => FieldResolution::unresolved(Unresolved::AmbiguousMeridiem),
        _ => clock(hour, 0, certainty),
    }
}

fn clock(hour: u32, minute: u32, certainty: f32) -> FieldResolution<NaiveTime> {
    match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(time) => FieldResolution::resolved(time, certainty, false),
        None => FieldResolution::unresolved(Unresolved::Unrecognized),
    }
}

// ── Shared helpers ──

/// Lowercase, drop commas, trim a trailing period, collapse whitespace.
fn clean_phrase(phrase: &str) -> String {
    let lower = phrase.trim().to_lowercase().replace(',', " ");
    let lower = lower.trim_end_matches('.');
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a leading whole word followed by a space.
fn strip_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    s.strip_prefix(word)
        .filter(|rest| rest.starts_with(' '))
        .map(str::trim_start)
}
