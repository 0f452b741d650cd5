//! Value cleaning shared by the booking checks.

use once_cell::sync::Lazy;
use regex::Regex;

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d\d:\d\d$").expect("valid regex"));
static SHORT_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d:\d\d$").expect("valid regex"));
static MERIDIEM_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm)$").expect("valid regex")
});

/// Normalize a free-form time to `HH:MM` where possible.
///
/// "after"/"before" qualifiers are dropped, `am`/`pm` is folded into a
/// 24-hour clock and a single-digit hour is zero padded. Input that cannot
/// be interpreted is returned cleaned but otherwise as-is, so callers must
/// still check it with [`is_clock_time`].
pub fn clean_time(time: &str) -> String {
    let time = time
        .to_lowercase()
        .replace("after", "")
        .replace("before", "");
    let time = time.trim();

    if let Some(caps) = MERIDIEM_TIME.captures(time) {
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        if (1..=12).contains(&hour) && minute < 60 {
            let hour = match (&caps[3], hour) {
                ("am", 12) => 0,
                ("am", h) => h,
                ("pm", 12) => 12,
                (_, h) => h + 12,
            };
            return format!("{:02}:{:02}", hour, minute);
        }
    }

    let time = time.replace("am", "").replace("pm", "");
    let time = time.trim();
    if SHORT_TIME.is_match(time) {
        format!("0{}", time)
    } else {
        time.to_string()
    }
}

pub fn is_clock_time(time: &str) -> bool {
    CLOCK_TIME.is_match(time)
}

/// Canonical venue name used when resolving places by name
pub fn clean_name(name: &str) -> String {
    let mut name = name.trim().to_lowercase();
    if let Some(rest) = name.strip_prefix("the") {
        name = rest.to_string();
    }
    for suffix in ["restaurant", "hotel"] {
        if let Some(rest) = name.strip_suffix(suffix) {
            name = rest.to_string();
        }
    }
    name.trim().to_string()
}

/// A string of digits whose value is greater than zero
pub fn is_positive_integer(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit())
        && !value.trim_start_matches('0').is_empty()
}

pub fn is_weekday(value: &str) -> bool {
    WEEKDAYS.contains(&value)
}
