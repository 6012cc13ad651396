// Text helpers for the report: block bars, durations, dates.

use chrono::{DateTime, NaiveDate, Utc};

const MAX_BLOCKS: f64 = 6.0;
const FULL_BLOCK: char = '█';
const HALF_BLOCK: char = '▌';

/// Bar for `value` relative to `maximum`: one full block per sixth, plus a half block when the
/// remainder is at least one half. A zero maximum renders nothing.
pub fn blocks(value: f64, maximum: f64) -> String {
    if maximum <= 0.0 {
        return String::new();
    }
    let count = MAX_BLOCKS * value / maximum;
    let full = count.floor().max(0.0) as usize;
    let mut out = FULL_BLOCK.to_string().repeat(full);
    if count.fract() >= 0.5 {
        out.push(HALF_BLOCK);
    }
    out
}

/// "<bar> <value>", or just the value when the bar is empty.
pub fn with_bar(value: u32, maximum: f64) -> String {
    let bar = blocks(value as f64, maximum);
    if bar.is_empty() {
        value.to_string()
    } else {
        format!("{} {}", bar, value)
    }
}

/// Leading unit and the one below it (dropped when zero), e.g. "2 days 3 hours", "4 minutes 10 seconds", "0 seconds".
pub fn duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let units = [
        (total / 86_400, "day"),
        ((total % 86_400) / 3_600, "hour"),
        ((total % 3_600) / 60, "minute"),
        (total % 60, "second"),
    ];
    let parts: Vec<String> = units
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .take(2)
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| {
            if *n == 1 {
                format!("1 {}", unit)
            } else {
                format!("{} {}s", n, unit)
            }
        })
        .collect();
    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}

/// e.g. "Mon Oct 19 2026"
pub fn day_label(day: NaiveDate) -> String {
    day.format("%a %b %d %Y").to_string()
}

/// e.g. "Mon, 19 Oct 2026 14:05:00 GMT"
pub fn utc_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
