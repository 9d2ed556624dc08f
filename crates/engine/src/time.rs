// ABOUTME: Normalizes free-text publish times into canonical `YYYY-MM-DD HH:MM:SS` strings.
// ABOUTME: Deterministic ladder: ISO-8601 with offset, fixed locale patterns, then digit-run fallback.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// The canonical output layout.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// Digit runs read by the fallback: year, month, day, hour, minute, second.
const MAX_DIGIT_RUNS: usize = 6;

/// Datetime layouts, most specific first. Input has CJK glyphs translated before matching.
const DATETIME_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
];

/// Date-only layouts, tried after every datetime layout has failed.
const DATE_PATTERNS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Layouts carrying an explicit numeric offset.
const OFFSET_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Converts date/time text into `YYYY-MM-DD HH:MM:SS`, or `None` when unparseable.
///
/// The same input always yields the same output; no clock or locale state is consulted.
pub fn normalize_time(text: &str) -> Option<String> {
    parse_time(text).map(|dt| dt.format(CANONICAL_FORMAT).to_string())
}

/// Parses date/time text into a naive wall-clock datetime.
///
/// Resolution order:
/// 1. ISO-8601 / RFC 3339 / RFC 2822 with an offset: the wall time is kept, the offset dropped.
/// 2. The fixed pattern list, after translating 年/月/日 (and 时/分/秒) into separators.
/// 3. Digit runs: the first three are year/month/day, the next three hour/minute/second.
///    Later runs are ignored.
///
/// Fullwidth digits are folded to ASCII first.
pub fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let text = fold_fullwidth_digits(text.trim());
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = parse_with_offset(&text) {
        return Some(dt);
    }

    let translated = translate_cjk(&text);
    if let Some(dt) = parse_with_patterns(&translated) {
        return Some(dt);
    }

    parse_digit_runs(&translated)
}

/// Normalizes a Unix timestamp in seconds, interpreted as UTC.
pub fn normalize_timestamp(seconds: i64) -> Option<String> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc().format(CANONICAL_FORMAT).to_string())
}

fn parse_with_offset(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for pattern in OFFSET_PATTERNS {
        if let Ok(dt) = DateTime::parse_from_str(text, pattern) {
            return Some(dt.naive_local());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }
    None
}

/// Maps U+FF10..=U+FF19 onto `0`..=`9`.
fn fold_fullwidth_digits(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\u{FF10}'..='\u{FF19}' => char::from(b'0' + (ch as u32 - 0xFF10) as u8),
            _ => ch,
        })
        .collect()
}

/// Replaces CJK date glyphs with ASCII separators and collapses whitespace.
fn translate_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '年' | '月' => out.push('-'),
            '日' | '号' => out.push(' '),
            '时' | '時' | '点' | '分' => out.push(':'),
            '秒' => {}
            _ => out.push(ch),
        }
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(':').trim().to_string()
}

fn parse_with_patterns(text: &str) -> Option<NaiveDateTime> {
    for pattern in DATETIME_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(dt);
        }
    }
    for pattern in DATE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// The first three runs must form a date. Time runs stop at the first one that is not a
/// valid hour, minute or second; missing components are zero.
fn parse_digit_runs(text: &str) -> Option<NaiveDateTime> {
    let runs: Vec<Option<u32>> = DIGIT_RUNS
        .find_iter(text)
        .take(MAX_DIGIT_RUNS)
        .map(|m| m.as_str().parse::<u32>().ok())
        .collect();
    if runs.len() < 3 {
        return None;
    }

    let year = i32::try_from(runs[0]?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, runs[1]?, runs[2]?)?;

    let mut hms = [0u32; 3];
    for (slot, (run, limit)) in hms.iter_mut().zip(runs[3..].iter().zip([24, 60, 60])) {
        match run {
            Some(value) if *value < limit => *slot = *value,
            _ => break,
        }
    }
    date.and_hms_opt(hms[0], hms[1], hms[2])
}
