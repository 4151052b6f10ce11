//! Display helpers shared by the panels. Pure functions, no I/O.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
const DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

pub const DEFAULT_ICON: &str = "📄";

/// Human-readable size with 1024-based units, e.g. `1536 -> "1.5 KB"`.
///
/// The value is rounded to two decimals and trailing zeros are dropped.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scale = 1u64;
    while unit + 1 < SIZE_UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        unit += 1;
    }

    let value = ((bytes as f64 / scale as f64) * 100.0).round() / 100.0;
    format!("{value} {}", SIZE_UNITS[unit])
}

/// Formats an upload timestamp for display in the local timezone.
pub fn format_date(value: &str) -> String {
    format_date_in(value, &Local)
}

/// Formats an upload timestamp as `"Jan 5, 2024, 03:07 PM"` in `tz`.
///
/// RFC 3339 timestamps are converted into `tz`. Timestamps without an
/// offset are shown with their wall-clock time unchanged. Anything
/// unparseable is returned as-is.
pub fn format_date_in<Tz>(value: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(value) {
        return dt.with_timezone(tz).format(DATE_FORMAT).to_string();
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return naive.format(DATE_FORMAT).to_string();
        }
    }

    value.to_string()
}

/// Glyph for a file extension (with leading dot). Case-insensitive;
/// unknown extensions get [`DEFAULT_ICON`].
pub fn file_icon(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        ".pdf" | ".txt" => "📄",
        ".doc" | ".docx" => "📝",
        ".xls" | ".xlsx" => "📊",
        ".jpg" | ".jpeg" | ".png" | ".gif" => "🖼️",
        ".mp4" => "🎥",
        ".mp3" => "🎵",
        ".zip" | ".rar" | ".tar" | ".gz" => "📦",
        _ => DEFAULT_ICON,
    }
}
