//! Calendar dates and spans of time.
//!
//! Dates are `chrono::DateTime<FixedOffset>`; a date literal without an
//! explicit zone is interpreted in the local timezone. Durations keep each
//! calendar unit separately (like "1 month, 3 days") because a month is not a
//! fixed number of milliseconds; they only collapse to milliseconds for
//! comparison, using 30-day months and 365-day years.

use chrono::{
    DateTime, Datelike, FixedOffset, Local, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeDelta, TimeZone, Timelike,
};

use crate::value::format_number;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;
const MS_PER_WEEK: f64 = 7.0 * MS_PER_DAY;
const MS_PER_MONTH: f64 = 30.0 * MS_PER_DAY;
const MS_PER_YEAR: f64 = 365.0 * MS_PER_DAY;

/// Units a duration literal can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DurationUnit {
    /// Looks up a unit by any of its accepted spellings (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        let unit = match name.to_lowercase().as_str() {
            "year" | "years" | "yr" | "yrs" => DurationUnit::Year,
            "month" | "months" | "mo" | "mos" => DurationUnit::Month,
            "week" | "weeks" | "wk" | "wks" | "w" => DurationUnit::Week,
            "day" | "days" | "d" => DurationUnit::Day,
            "hour" | "hours" | "hr" | "hrs" | "h" => DurationUnit::Hour,
            "minute" | "minutes" | "min" | "mins" | "m" => DurationUnit::Minute,
            "second" | "seconds" | "sec" | "secs" | "s" => DurationUnit::Second,
            "millisecond" | "milliseconds" | "ms" => DurationUnit::Millisecond,
            _ => return None,
        };
        Some(unit)
    }

    fn label(self) -> &'static str {
        match self {
            DurationUnit::Year => "year",
            DurationUnit::Month => "month",
            DurationUnit::Week => "week",
            DurationUnit::Day => "day",
            DurationUnit::Hour => "hour",
            DurationUnit::Minute => "minute",
            DurationUnit::Second => "second",
            DurationUnit::Millisecond => "millisecond",
        }
    }
}

/// A signed span of time, stored per unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Duration {
    pub years: f64,
    pub months: f64,
    pub weeks: f64,
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub milliseconds: f64,
}

impl Duration {
    pub fn zero() -> Self {
        Self::default()
    }

    /// A duration of `count` units.
    pub fn of(unit: DurationUnit, count: f64) -> Self {
        let mut duration = Self::zero();
        *duration.component_mut(unit) = count;
        duration
    }

    /// Splits a millisecond count into days, hours, minutes, seconds and
    /// milliseconds. Every component carries the sign of the input.
    pub fn from_millis(total: f64) -> Self {
        let sign = if total < 0.0 { -1.0 } else { 1.0 };
        let mut rest = total.abs();

        let days = (rest / MS_PER_DAY).floor();
        rest -= days * MS_PER_DAY;
        let hours = (rest / MS_PER_HOUR).floor();
        rest -= hours * MS_PER_HOUR;
        let minutes = (rest / MS_PER_MINUTE).floor();
        rest -= minutes * MS_PER_MINUTE;
        let seconds = (rest / MS_PER_SECOND).floor();
        rest -= seconds * MS_PER_SECOND;

        Duration {
            days: sign * days,
            hours: sign * hours,
            minutes: sign * minutes,
            seconds: sign * seconds,
            milliseconds: sign * rest.round(),
            ..Self::zero()
        }
    }

    fn units(&self) -> [(DurationUnit, f64); 8] {
        [
            (DurationUnit::Year, self.years),
            (DurationUnit::Month, self.months),
            (DurationUnit::Week, self.weeks),
            (DurationUnit::Day, self.days),
            (DurationUnit::Hour, self.hours),
            (DurationUnit::Minute, self.minutes),
            (DurationUnit::Second, self.seconds),
            (DurationUnit::Millisecond, self.milliseconds),
        ]
    }

    fn component_mut(&mut self, unit: DurationUnit) -> &mut f64 {
        match unit {
            DurationUnit::Year => &mut self.years,
            DurationUnit::Month => &mut self.months,
            DurationUnit::Week => &mut self.weeks,
            DurationUnit::Day => &mut self.days,
            DurationUnit::Hour => &mut self.hours,
            DurationUnit::Minute => &mut self.minutes,
            DurationUnit::Second => &mut self.seconds,
            DurationUnit::Millisecond => &mut self.milliseconds,
        }
    }

    /// Approximate length in milliseconds (30-day months, 365-day years).
    pub fn as_millis(&self) -> f64 {
        self.years * MS_PER_YEAR
            + self.months * MS_PER_MONTH
            + self.weeks * MS_PER_WEEK
            + self.days * MS_PER_DAY
            + self.hours * MS_PER_HOUR
            + self.minutes * MS_PER_MINUTE
            + self.seconds * MS_PER_SECOND
            + self.milliseconds
    }

    pub fn as_seconds(&self) -> f64 {
        self.as_millis() / MS_PER_SECOND
    }

    pub fn is_zero(&self) -> bool {
        self.as_millis() == 0.0
    }

    fn zip(&self, other: &Duration, f: impl Fn(f64, f64) -> f64) -> Duration {
        Duration {
            years: f(self.years, other.years),
            months: f(self.months, other.months),
            weeks: f(self.weeks, other.weeks),
            days: f(self.days, other.days),
            hours: f(self.hours, other.hours),
            minutes: f(self.minutes, other.minutes),
            seconds: f(self.seconds, other.seconds),
            milliseconds: f(self.milliseconds, other.milliseconds),
        }
    }

    pub fn plus(&self, other: &Duration) -> Duration {
        self.zip(other, |a, b| a + b)
    }

    pub fn minus(&self, other: &Duration) -> Duration {
        self.zip(other, |a, b| a - b)
    }

    pub fn scale(&self, factor: f64) -> Duration {
        self.zip(&Duration::zero(), |a, _| a * factor)
    }

    /// Named component accessor used by `duration.days` style indexing.
    pub fn component(&self, name: &str) -> Option<f64> {
        let value = match name {
            "years" => self.years,
            "months" => self.months,
            "weeks" => self.weeks,
            "days" => self.days,
            "hours" => self.hours,
            "minutes" => self.minutes,
            "seconds" => self.seconds,
            "milliseconds" => self.milliseconds,
            _ => return None,
        };
        Some(value)
    }

    /// Minimal human form: non-zero units only, largest first.
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .units()
            .iter()
            .filter(|(_, count)| *count != 0.0)
            .map(|(unit, count)| {
                let plural = if count.abs() == 1.0 { "" } else { "s" };
                format!("{} {}{}", format_number(*count), unit.label(), plural)
            })
            .collect();

        if parts.is_empty() {
            "0 seconds".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// ISO-8601 span, e.g. `P1Y2DT3H`.
    pub fn to_iso(&self) -> String {
        let mut out = String::from("P");
        for (value, suffix) in [
            (self.years, "Y"),
            (self.months, "M"),
            (self.weeks, "W"),
            (self.days, "D"),
        ] {
            if value != 0.0 {
                out.push_str(&format!("{}{}", format_number(value), suffix));
            }
        }

        let seconds = self.seconds + self.milliseconds / MS_PER_SECOND;
        let time = [(self.hours, "H"), (self.minutes, "M"), (seconds, "S")];
        if time.iter().any(|(value, _)| *value != 0.0) {
            out.push('T');
            for (value, suffix) in time {
                if value != 0.0 {
                    out.push_str(&format!("{}{}", format_number(value), suffix));
                }
            }
        }

        if out.len() == 1 {
            out.push_str("T0S");
        }
        out
    }
}

/// Parses the body of a `dur(...)` literal: one or more `<number> <unit>`
/// segments separated by whitespace or commas, e.g. `1 day, 3 hours` or `5h`.
pub fn parse_duration_literal(text: &str) -> Option<Duration> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut pos = 0;
    let mut total = Duration::zero();
    let mut segments = 0;

    let skip_separators = |pos: &mut usize| {
        while *pos < chars.len() && (chars[*pos].is_whitespace() || chars[*pos] == ',') {
            *pos += 1;
        }
    };

    skip_separators(&mut pos);
    while pos < chars.len() {
        let start = pos;
        if chars[pos] == '-' || chars[pos] == '+' {
            pos += 1;
        }
        while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
            pos += 1;
        }
        let number: f64 = chars[start..pos].iter().collect::<String>().parse().ok()?;

        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }

        let unit_start = pos;
        while pos < chars.len() && chars[pos].is_alphabetic() {
            pos += 1;
        }
        let unit = DurationUnit::parse(&chars[unit_start..pos].iter().collect::<String>())?;

        total = total.plus(&Duration::of(unit, number));
        segments += 1;
        skip_separators(&mut pos);
    }

    (segments > 0).then_some(total)
}

/// Parses an ISO-like date literal with partial precision: `2021-04`,
/// `2021-04-18`, `2021-04-18T04`, `2021-04-18T04:19`, `2021-04-18T04:19:35`,
/// `2021-04-18T04:19:35.000`, each optionally followed by `Z` or `+hh:mm`.
pub fn parse_date_literal(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let (date_part, time_part) = match text.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };

    let pieces: Vec<&str> = date_part.split('-').collect();
    if pieces.len() < 2 || pieces.len() > 3 || pieces[0].len() != 4 {
        return None;
    }
    if !pieces.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let year: i32 = pieces[0].parse().ok()?;
    let month: u32 = pieces[1].parse().ok()?;
    let day: u32 = match pieces.get(2) {
        Some(day) => day.parse().ok()?,
        None if time_part.is_some() => return None,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let (time, offset) = match time_part {
        Some(time) => parse_time_with_zone(time)?,
        None => (NaiveTime::MIN, None),
    };

    localize(date.and_time(time), offset)
}

fn parse_time_with_zone(text: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let (clock, zone) = if let Some(clock) = text.strip_suffix('Z') {
        (clock, Some(FixedOffset::east_opt(0)?))
    } else if let Some(idx) = text.rfind(['+', '-']) {
        (&text[..idx], Some(parse_offset(&text[idx..])?))
    } else {
        (text, None)
    };

    let (hms, millis) = match clock.split_once('.') {
        Some((hms, frac)) => {
            if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{:0<3}", &frac[..frac.len().min(3)]);
            (hms, padded.parse::<u32>().ok()?)
        }
        None => (clock, 0),
    };

    let fields: Vec<u32> = hms
        .split(':')
        .map(|p| {
            if p.len() == 2 && p.chars().all(|c| c.is_ascii_digit()) {
                p.parse().ok()
            } else {
                None
            }
        })
        .collect::<Option<_>>()?;

    let (hour, minute, second) = match fields.as_slice() {
        [h] => (*h, 0, 0),
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };

    Some((NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?, zone))
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits: String = text[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn localize(naive: NaiveDateTime, offset: Option<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    match offset {
        Some(offset) => offset.from_local_datetime(&naive).single(),
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|date| date.fixed_offset()),
    }
}

/// Current local time.
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Resolves the named date shorthands relative to `now`.
pub fn parse_date_shorthand(
    name: &str,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let today = start_of_day(now);
    let date = match name {
        "now" => now,
        "today" => today,
        "yesterday" => today - TimeDelta::days(1),
        "tomorrow" => today + TimeDelta::days(1),
        "sow" => today - TimeDelta::days(now.weekday().num_days_from_monday() as i64),
        "eow" => {
            let start = today - TimeDelta::days(now.weekday().num_days_from_monday() as i64);
            end_of(start + TimeDelta::days(7))
        }
        "som" => today.with_day(1)?,
        "eom" => end_of(today.with_day(1)?.checked_add_months(Months::new(1))?),
        "soy" => today.with_day(1)?.with_month(1)?,
        "eoy" => end_of(today.with_day(1)?.with_month(1)?.checked_add_months(Months::new(12))?),
        _ => return None,
    };
    Some(date)
}

/// Parses either a shorthand (`today`, `eom`, ...) or a date literal.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    parse_date_shorthand(text, now()).or_else(|| parse_date_literal(text))
}

fn end_of(next_start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    next_start - TimeDelta::milliseconds(1)
}

/// Midnight at the start of the given date, same offset.
pub fn start_of_day(date: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let midnight = date.date_naive().and_time(NaiveTime::MIN);
    date.offset()
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or(date)
}

/// `date + sign * duration`. Years and months move along the calendar;
/// everything else is added as elapsed time.
pub fn shift(
    date: DateTime<FixedOffset>,
    duration: &Duration,
    sign: f64,
) -> Option<DateTime<FixedOffset>> {
    let months = sign * (duration.years * 12.0 + duration.months);
    if !months.is_finite() || months.abs() > f64::from(u32::MAX) {
        return None;
    }
    let whole_months = months.trunc();
    let leftover_days = (months - whole_months) * 30.0;

    let shifted = if whole_months >= 0.0 {
        date.checked_add_months(Months::new(whole_months as u32))?
    } else {
        date.checked_sub_months(Months::new((-whole_months) as u32))?
    };

    let millis = sign
        * (duration.weeks * MS_PER_WEEK
            + duration.days * MS_PER_DAY
            + duration.hours * MS_PER_HOUR
            + duration.minutes * MS_PER_MINUTE
            + duration.seconds * MS_PER_SECOND
            + duration.milliseconds)
        + leftover_days * MS_PER_DAY;

    // `as` saturates, so out-of-range values are rejected before the cast
    let millis = millis.round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    shifted.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}

/// `left - right` as a duration broken into days and smaller units.
pub fn difference(left: DateTime<FixedOffset>, right: DateTime<FixedOffset>) -> Duration {
    Duration::from_millis((left - right).num_milliseconds() as f64)
}

/// Named component accessor used by `date.year` style indexing.
pub fn date_component(date: &DateTime<FixedOffset>, name: &str) -> Option<f64> {
    let value = match name {
        "year" => date.year() as f64,
        "month" => date.month() as f64,
        "weekyear" => date.iso_week().year() as f64,
        "week" => date.iso_week().week() as f64,
        "weekday" => date.weekday().number_from_monday() as f64,
        "day" => date.day() as f64,
        "hour" => date.hour() as f64,
        "minute" => date.minute() as f64,
        "second" => date.second() as f64,
        "millisecond" => (date.nanosecond() / 1_000_000) as f64,
        _ => return None,
    };
    Some(value)
}
