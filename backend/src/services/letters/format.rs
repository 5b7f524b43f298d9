//! Typed value formatting.
//!
//! These primitives are shared by the resolver (which pre-formats every
//! resolved value) and the Handlebars helper library, so both template
//! syntaxes produce identical output for the same input.

use chrono::{DateTime, Datelike, Local, NaiveDate};
use common::model::placeholder::PlaceholderType;
use serde_json::Value;

pub const DEFAULT_DATE_FORMAT: &str = "DD/MM/YYYY";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Formats a resolved value according to its placeholder type.
pub fn format_value(placeholder_type: PlaceholderType, value: &Value, format: Option<&str>) -> String {
    match placeholder_type {
        PlaceholderType::Date => format_date(value, format.unwrap_or(DEFAULT_DATE_FORMAT)),
        PlaceholderType::Currency => format_currency(value),
        PlaceholderType::Number => format_number(value, format),
        PlaceholderType::Phone => format_phone(value),
        PlaceholderType::Email => coerce_string(value).to_lowercase(),
        PlaceholderType::Address => format_address(value),
        PlaceholderType::Text | PlaceholderType::List | PlaceholderType::Conditional => {
            coerce_string(value)
        }
    }
}

/// String coercion for scalar values. Arrays and objects are rendered as
/// compact JSON; they are normally consumed by list blocks instead.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            // Avoid the trailing ".0" serde_json gives whole floats.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    return format!("{}", f as i64);
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Attempts a numeric reading of a value: JSON numbers directly, strings via
/// parsing.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parses a date out of a value. Accepts ISO dates, RFC 3339 timestamps and
/// the default display format.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for pattern in ["%Y-%m-%d", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, pattern) {
            return Some(d);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, pattern) {
            return Some(dt.date());
        }
    }
    None
}

/// Token-substitution date formatter supporting `YYYY`, `YY`, `MMMM`, `MMM`,
/// `MM` and `DD`. Unparseable input passes through unchanged.
pub fn format_date(value: &Value, format: &str) -> String {
    let date = match parse_date(value) {
        Some(d) => d,
        None => return coerce_string(value),
    };
    render_date(date, format)
}

pub fn render_date(date: NaiveDate, format: &str) -> String {
    let month_name = MONTHS[(date.month0()) as usize];
    let mut out = String::with_capacity(format.len() + 4);
    let mut rest = format;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("YYYY") {
            out.push_str(&format!("{:04}", date.year()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("YY") {
            out.push_str(&format!("{:02}", date.year() % 100));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("MMMM") {
            out.push_str(month_name);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("MMM") {
            out.push_str(&month_name[..3]);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("MM") {
            out.push_str(&format!("{:02}", date.month()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("DD") {
            out.push_str(&format!("{:02}", date.day()));
            rest = tail;
        } else {
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        }
    }
    out
}

/// Currency formatting: absolute value, grouped thousands, no decimals,
/// `£`-prefixed. Non-numeric text keeps its text, loses a trailing `.00`
/// and gains the prefix when absent.
pub fn format_currency(value: &Value) -> String {
    if let Some(n) = numeric(value) {
        return format!("£{}", group_thousands(n.abs().round() as i64));
    }
    let text = coerce_string(value);
    if text.is_empty() {
        return text;
    }
    let trimmed = text.strip_suffix(".00").unwrap_or(&text);
    if trimmed.starts_with('£') {
        trimmed.to_string()
    } else {
        format!("£{}", trimmed)
    }
}

fn group_thousands(mut n: i64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut groups: Vec<String> = Vec::new();
    while n > 0 {
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    let mut out = groups
        .pop()
        .map(|g| g.trim_start_matches('0').to_string())
        .unwrap_or_default();
    if out.is_empty() {
        out.push('0');
    }
    for group in groups.iter().rev() {
        out.push(',');
        out.push_str(group);
    }
    out
}

/// Number formatting. Decimal places come from the fractional-digit count of
/// the format string (`0.00` → two places); without a format the value is
/// rendered as an integer string.
pub fn format_number(value: &Value, format: Option<&str>) -> String {
    let n = match numeric(value) {
        Some(n) => n,
        None => return coerce_string(value),
    };
    let decimals = format
        .and_then(|f| f.split_once('.'))
        .map(|(_, frac)| frac.chars().filter(|c| c.is_ascii_digit() || *c == '#').count())
        .unwrap_or(0);
    format!("{:.*}", decimals, n)
}

/// UK phone grouping for `44`-prefixed and `0`-prefixed numbers; anything
/// else passes through untouched.
pub fn format_phone(value: &Value) -> String {
    let raw = coerce_string(value);
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 12 && digits.starts_with("44") {
        return format!("+44 {} {}", &digits[2..6], &digits[6..]);
    }
    if digits.len() == 11 && digits.starts_with('0') {
        return format!("{} {}", &digits[..5], &digits[5..]);
    }
    raw.trim().to_string()
}

/// Joins the non-empty parts of an address object in fixed order. String
/// input passes through.
pub fn format_address(value: &Value) -> String {
    let obj = match value {
        Value::Object(obj) => obj,
        _ => return coerce_string(value),
    };
    ["line1", "line2", "city", "county", "postcode", "country"]
        .iter()
        .filter_map(|field| obj.get(*field))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truthiness used by conditional blocks and the logical helpers: booleans
/// as-is, collections by non-emptiness, numbers by non-zero, strings by
/// non-emptiness, null is false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.trim().is_empty(),
        Value::Null => false,
    }
}

/// Today's date in the process-local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
