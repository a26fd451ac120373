//! Publication date normalization.
//!
//! News sites print dates in many shapes. [`unify_date_format`] folds the
//! supported ones into a single canonical `DateTime<Utc>`:
//!
//! | Form | Example |
//! |------|---------|
//! | RFC 3339 / RFC 2822 | `2024-03-05T12:30:00+03:00`, `Tue, 5 Mar 2024 12:30:00 GMT` |
//! | ISO-like | `2024-03-05 12:30`, `2024-03-05` |
//! | Dotted | `05.03.2024 12:30`, `05.03.2024` |
//! | Month name | `5 March 2024`, `5 марта 2024, 12:30`, `March 5, 2024` |
//! | Leading time | `12:30, 5 марта 2024` |
//! | Relative | `3 hours ago`, `15 минут назад`, `yesterday, 18:05`, `сегодня в 09:10` |
//!
//! Timestamps without an offset are read as UTC. Relative forms resolve
//! against the supplied `now`, which the extractor sets to the fetch time.

use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta, TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+|an?|one)\s+(minutes?|mins?|hours?|hrs?|days?|weeks?)\s+ago$")
        .expect("relative en regex")
});

static RELATIVE_RU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s+(минут[уы]?|час(?:а|ов)?|д(?:ень|ня|ней)|недел[юиь])\s+назад$")
        .expect("relative ru regex")
});

static DAY_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(today|yesterday|сегодня|вчера)(?:[,\s]+(?:в\s+|at\s+)?(\d{1,2}):(\d{2}))?$")
        .expect("day word regex")
});

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{1,2})\s+([^\s\d,.]+)\.?,?\s+(\d{4})(?:\s*г\.?)?(?:\s*(?:,|в|at)?\s*(\d{1,2}):(\d{2}))?$",
    )
    .expect("day month year regex")
});

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\s\d,.]+)\.?\s+(\d{1,2}),?\s+(\d{4})(?:\s*(?:,|at)?\s*(\d{1,2}):(\d{2}))?$")
        .expect("month day year regex")
});

static LEADING_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*[,|/]?\s+(.+)$").expect("leading time regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y, %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Normalize a raw publication date string.
///
/// Returns `None` for anything outside the supported forms; callers treat
/// that as "no date" rather than an error.
pub fn unify_date_format(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }

    let lower = cleaned.to_lowercase();
    parse_relative(&lower, now)
        .or_else(|| parse_day_word(&lower, now))
        .or_else(|| parse_month_name(&lower))
        .or_else(|| parse_leading_time(&lower))
}

/// Render a timestamp in the canonical form, which [`unify_date_format`]
/// maps back to the same instant.
pub fn format_canonical(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if s == "just now" || s == "только что" {
        return Some(now);
    }

    let (amount, unit) = if let Some(c) = RELATIVE_EN.captures(s) {
        let amount = match &c[1] {
            "a" | "an" | "one" => 1,
            n => n.parse::<i64>().ok()?,
        };
        (amount, c[2].chars().next()?)
    } else if let Some(c) = RELATIVE_RU.captures(s) {
        let unit = match c[2].chars().next()? {
            'м' => 'm',
            'ч' => 'h',
            'д' => 'd',
            _ => 'w',
        };
        (c[1].parse::<i64>().ok()?, unit)
    } else {
        return None;
    };

    let delta = match unit {
        'm' => TimeDelta::try_minutes(amount)?,
        'h' => TimeDelta::try_hours(amount)?,
        'd' => TimeDelta::try_days(amount)?,
        _ => TimeDelta::try_weeks(amount)?,
    };
    now.checked_sub_signed(delta)
}

fn parse_day_word(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let c = DAY_WORD.captures(s)?;
    let day = match &c[1] {
        "yesterday" | "вчера" => now.date_naive().pred_opt()?,
        _ => now.date_naive(),
    };
    let time = match (c.get(2), c.get(3)) {
        (Some(h), Some(m)) => hm(h.as_str(), m.as_str())?,
        _ => NaiveTime::MIN,
    };
    Some(Utc.from_utc_datetime(&day.and_time(time)))
}

fn parse_month_name(s: &str) -> Option<DateTime<Utc>> {
    let (day, month, year, h, m) = if let Some(c) = DAY_MONTH_YEAR.captures(s) {
        (
            c.get(1)?.as_str(),
            month_number(c.get(2)?.as_str())?,
            c.get(3)?.as_str(),
            c.get(4),
            c.get(5),
        )
    } else if let Some(c) = MONTH_DAY_YEAR.captures(s) {
        (
            c.get(2)?.as_str(),
            month_number(c.get(1)?.as_str())?,
            c.get(3)?.as_str(),
            c.get(4),
            c.get(5),
        )
    } else {
        return None;
    };

    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)?;
    let time = match (h, m) {
        (Some(h), Some(m)) => hm(h.as_str(), m.as_str())?,
        _ => NaiveTime::MIN,
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn parse_leading_time(s: &str) -> Option<DateTime<Utc>> {
    let c = LEADING_TIME.captures(s)?;
    let time = hm(&c[1], &c[2])?;
    let date = parse_month_name(&c[3]).map(|dt| dt.date_naive()).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&c[3], fmt).ok())
    })?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn hm(h: &str, m: &str) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

/// Map an English or Russian month name (full, genitive or abbreviated) to 1..=12.
fn month_number(word: &str) -> Option<u32> {
    let n = match word.trim_end_matches('.') {
        "january" | "jan" | "январь" | "января" | "янв" => 1,
        "february" | "feb" | "февраль" | "февраля" | "фев" | "февр" => 2,
        "march" | "mar" | "март" | "марта" | "мар" => 3,
        "april" | "apr" | "апрель" | "апреля" | "апр" => 4,
        "may" | "май" | "мая" => 5,
        "june" | "jun" | "июнь" | "июня" | "июн" => 6,
        "july" | "jul" | "июль" | "июля" | "июл" => 7,
        "august" | "aug" | "август" | "августа" | "авг" => 8,
        "september" | "sep" | "sept" | "сентябрь" | "сентября" | "сен" | "сент" => 9,
        "october" | "oct" | "октябрь" | "октября" | "окт" => 10,
        "november" | "nov" | "ноябрь" | "ноября" | "ноя" | "нояб" => 11,
        "december" | "dec" | "декабрь" | "декабря" | "дек" => 12,
        _ => return None,
    };
    Some(n)
}
