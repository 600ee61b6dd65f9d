//! Text normalisation for spreadsheet cells

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));

/// Google Forms timestamps, e.g. "2024/1/5 下午 3:04:05"
static FORMS_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})\s+(上午|下午)\s*(\d{1,2}):(\d{2})(?::(\d{2}))?$")
        .expect("valid timestamp regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Replace full-width digits and the full-width period with ASCII
pub fn normalize_fullwidth(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '．' => '.',
            '　' => ' ',
            _ => c,
        })
        .collect()
}

/// Keep only ASCII digits: "09-1234-5678" and "0912345678" normalize identically
pub fn normalize_phone(input: &str) -> String {
    normalize_fullwidth(input)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

/// First number in the text, ignoring thousands separators and currency
/// symbols. `None` when the text holds no digits.
pub fn extract_number(input: &str) -> Option<f64> {
    let normalized = normalize_fullwidth(input).replace(',', "");
    NUMBER_RE
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Money amount from a cell; 0 when unparsable, never negative
pub fn parse_amount(input: &str) -> f64 {
    extract_number(input).unwrap_or(0.0).max(0.0)
}

/// Quantity from a cell; unparsable defaults to 1, floor 1
pub fn parse_quantity(input: &str) -> u32 {
    match extract_number(input) {
        Some(n) if n >= 1.0 => n.trunc().min(u32::MAX as f64) as u32,
        _ => 1,
    }
}

/// Permissive date-time parsing. Naive values are read in `tz`.
pub fn parse_datetime(input: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let input = normalize_fullwidth(input.trim());
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&input) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = parse_forms_timestamp(&input)
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&input, fmt).ok())
        })
        .or_else(|| parse_date(&input).map(|d| d.and_time(NaiveTime::MIN)))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Date-only parsing; a trailing time part is ignored
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = normalize_fullwidth(input.trim());
    let date_part = input.split_whitespace().next()?;
    let date_part = date_part.split('T').next().unwrap_or(date_part);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

fn parse_forms_timestamp(input: &str) -> Option<NaiveDateTime> {
    let caps = FORMS_TIMESTAMP_RE.captures(input)?;
    let num = |i: usize| -> Option<u32> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };

    let date = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
    let mut hour = num(5)?;
    match caps.get(4).map(|m| m.as_str()) {
        Some("下午") if hour < 12 => hour += 12,
        Some("上午") if hour == 12 => hour = 0,
        _ => {}
    }
    let time = NaiveTime::from_hms_opt(hour, num(6)?, num(7)?)?;
    Some(date.and_time(time))
}
