//! Turns the free-form dates users give ("اليوم", "منذ يومين", "5/3/2025")
//! into UTC instants, relative to a caller-supplied "now".

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use regex::Regex;

static YMD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[ T](\d{1,2}):(\d{2}))?").unwrap()
});

static DMY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})(?:\s+(\d{1,2}):(\d{2}))?").unwrap()
});

static AGO_AR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:منذ|قبل)\s+(\d+\s+)?(دقيقتين|دقيقه|دقائق|ساعتين|ساعه|ساعات|يومين|يوم|ايام|اسبوعين|اسبوع|اسابيع|شهرين|شهر|اشهر|شهور)")
        .unwrap()
});

static AGO_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+|a|an|one)\s+(minute|hour|day|week|month)s?\s+ago").unwrap()
});

/// Interpret `input` relative to `now`. `None` when nothing recognizable is found.
pub fn interpret(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let digits = ascii_digits(input.trim());
    if digits.is_empty() {
        return None;
    }

    absolute(&digits).or_else(|| relative(&fold(&digits), now))
}

fn absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    if let Some(caps) = YMD.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if let Some(date) = date {
            return at_time(date, caps.get(4).zip(caps.get(5)).map(|(h, m)| (h.as_str(), m.as_str())));
        }
    }

    if let Some(caps) = DMY.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        );
        if let Some(date) = date {
            return at_time(date, caps.get(4).zip(caps.get(5)).map(|(h, m)| (h.as_str(), m.as_str())));
        }
    }

    None
}

/// Date-only values land at midnight UTC.
fn at_time(date: NaiveDate, time: Option<(&str, &str)>) -> Option<DateTime<Utc>> {
    let (hour, minute) = match time {
        Some((h, m)) => (h.parse().ok()?, m.parse().ok()?),
        None => (0, 0),
    };
    date.and_hms_opt(hour, minute, 0).map(|naive| Utc.from_utc_datetime(&naive))
}

fn relative(folded: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(caps) = AGO_AR.captures(folded) {
        let unit = &caps[2];
        let count = match caps.get(1) {
            Some(n) => n.as_str().trim().parse().ok()?,
            None if is_dual(unit) => 2,
            None => 1,
        };
        return shift_back(now, count, unit);
    }

    if let Some(caps) = AGO_EN.captures(folded) {
        let count = match &caps[1] {
            "a" | "an" | "one" => 1,
            n => n.parse().ok()?,
        };
        return shift_back(now, count, &caps[2]);
    }

    let has = |phrases: &[&str]| phrases.iter().any(|p| folded.contains(&format!(" {} ", p)));

    if has(&["اول امس", "قبل امس", "day before yesterday"]) {
        return Some(now - Duration::days(2));
    }
    if has(&["امس", "الامس", "بالامس", "البارحه", "yesterday"]) {
        return Some(now - Duration::days(1));
    }
    if has(&["غدا", "بكره", "tomorrow"]) {
        return Some(now + Duration::days(1));
    }
    if has(&["الاسبوع الماضي", "last week"]) {
        return Some(now - Duration::weeks(1));
    }
    if has(&["الشهر الماضي", "last month"]) {
        return now.checked_sub_months(Months::new(1));
    }
    if has(&["اليوم", "الان", "الحين", "هذا الصباح", "الليله", "today", "now", "tonight"]) {
        return Some(now);
    }

    None
}

fn is_dual(unit: &str) -> bool {
    matches!(unit, "دقيقتين" | "ساعتين" | "يومين" | "اسبوعين" | "شهرين")
}

fn shift_back(now: DateTime<Utc>, count: i64, unit: &str) -> Option<DateTime<Utc>> {
    // Counts come from user text; out-of-range values yield None.
    let delta = match unit {
        "دقيقتين" | "دقيقه" | "دقائق" | "minute" => TimeDelta::try_minutes(count)?,
        "ساعتين" | "ساعه" | "ساعات" | "hour" => TimeDelta::try_hours(count)?,
        "يومين" | "يوم" | "ايام" | "day" => TimeDelta::try_days(count)?,
        "اسبوعين" | "اسبوع" | "اسابيع" | "week" => TimeDelta::try_weeks(count)?,
        "شهرين" | "شهر" | "اشهر" | "شهور" | "month" => {
            return now.checked_sub_months(Months::new(u32::try_from(count).ok()?));
        }
        _ => return None,
    };
    now.checked_sub_signed(delta)
}

/// Map Arabic-Indic and Extended Arabic-Indic digits to ASCII.
fn ascii_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            _ => c,
        })
        .collect()
}

/// Lowercase, strip diacritics and tatweel, unify alef and taa marbuta forms,
/// and collapse punctuation to single spaces with a space at each end so
/// phrases can be matched on word boundaries.
fn fold(input: &str) -> String {
    let mapped: String = input
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\u{064B}'..='\u{0652}' | '\u{0640}'))
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            'ة' => 'ه',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect();

    format!(" {} ", mapped.split_whitespace().collect::<Vec<_>>().join(" "))
}
