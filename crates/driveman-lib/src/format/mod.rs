//! Human-readable sizes, dates and item kinds for listings.

use std::fmt::Display;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::drive::model::{DriveItem, ItemKind};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB` ... using powers of 1024.
/// Two decimals at most, trailing zeros dropped. Sizes past TB stay in TB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Relative date label in the zone of `now`.
///
/// Same day: `Today, 14:05`. Previous day: `Yesterday, 09:30`.
/// Same year: `Mar 4`. Otherwise: `Mar 4, 2022`.
pub fn format_date<Tz>(when: &DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = when.with_timezone(&now.timezone());
    let day = local.date_naive();
    let today = now.date_naive();

    if day == today {
        return format!("Today, {}", local.format("%H:%M"));
    }
    if today.pred_opt() == Some(day) {
        return format!("Yesterday, {}", local.format("%H:%M"));
    }
    if local.year() == now.year() {
        format!("{} {}", local.format("%b"), local.day())
    } else {
        format!("{} {}, {}", local.format("%b"), local.day(), local.year())
    }
}

/// Parse an RFC 3339 timestamp from the API and format it against the local
/// clock. Unparsable input is shown as-is.
pub fn format_api_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => format_date(&parsed.with_timezone(&Utc), &chrono::Local::now()),
        Err(_) => raw.to_string(),
    }
}

/// Short label for the kind of an item, derived from its mime type.
pub fn kind_label(mime_type: &str) -> &'static str {
    if let Some(native) = mime_type.strip_prefix("application/vnd.google-apps.") {
        return match native {
            "folder" => "Folder",
            "document" => "Document",
            "spreadsheet" => "Spreadsheet",
            "presentation" => "Presentation",
            "form" => "Form",
            "drawing" => "Drawing",
            "shortcut" => "Shortcut",
            _ => "Google file",
        };
    }
    match mime_type {
        "application/pdf" => "PDF",
        "application/zip" | "application/x-zip-compressed" | "application/gzip"
        | "application/x-tar" | "application/x-7z-compressed" => "Archive",
        "application/json" | "application/xml" => "Data",
        m if m.starts_with("image/") => "Image",
        m if m.starts_with("video/") => "Video",
        m if m.starts_with("audio/") => "Audio",
        m if m.starts_with("text/") => "Text",
        _ => "File",
    }
}

/// Size column: `Folder` for folders, a formatted size when known, `-` otherwise.
pub fn size_column(item: &DriveItem) -> String {
    match (item.kind(), item.size) {
        (ItemKind::Folder, _) => "Folder".to_string(),
        (ItemKind::File, Some(size)) => format_file_size(size),
        (ItemKind::File, None) => "-".to_string(),
    }
}

/// Modified column: relative date or `-`.
pub fn modified_column(item: &DriveItem) -> String {
    item.modified_time
        .as_deref()
        .map(format_api_date)
        .unwrap_or_else(|| "-".to_string())
}
