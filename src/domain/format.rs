use crate::domain::ExtraData;
use humansize::{BINARY, format_size};
use time::OffsetDateTime;
use time::macros::format_description;

/// Binary-unit byte count for the detail table.
pub fn fmt_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// Seconds-resolution wall-clock rendering of a unix timestamp (UTC).
pub fn fmt_unix(unix_secs: f64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(unix_secs as i64)
        .ok()
        .and_then(|timestamp| timestamp.format(&format).ok())
        .unwrap_or_else(|| format!("{unix_secs}"))
}

/// Duration in seconds rendered as `h:mm:ss.mmm`, dropping leading zero
/// components.
pub fn fmt_duration(dur_secs: f64) -> String {
    let total = dur_secs.max(0.0);
    let hours = (total / 3600.0) as u64;
    let minutes = ((total % 3600.0) / 60.0) as u64;
    let seconds = total % 60.0;
    if hours == 0 {
        if minutes == 0 {
            format!("{seconds:.3}")
        } else {
            format!("{minutes}:{seconds:06.3}")
        }
    } else {
        format!("{hours}:{minutes:02}:{seconds:06.3}")
    }
}

/// Detail-table rows for the optional job metadata, in display order.
/// Absent fields are simply omitted.
pub fn extra_data_rows(extra: &ExtraData) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    if let Some(value) = &extra.snap_name {
        rows.push(("Snapshot Name", value.clone()));
    }
    if let Some(value) = &extra.cron {
        rows.push(("Cron", value.clone()));
    }
    if let Some(value) = extra.bytes_written {
        rows.push(("Bytes Written", fmt_bytes(value)));
    }
    if let Some(value) = extra.bytes_trimmed {
        rows.push(("Bytes Trimmed", fmt_bytes(value)));
    }
    if let Some(value) = extra.prep_start_time {
        rows.push(("Prep Start", fmt_unix(value)));
    }
    if let Some(value) = extra.prep_end_time {
        rows.push(("Prep End", fmt_unix(value)));
    }
    if let Some(value) = extra.prep_time {
        rows.push(("Prep Time", fmt_duration(value)));
    }
    if let Some(value) = extra.run_start_time {
        rows.push(("Run Start", fmt_unix(value)));
    }
    if let Some(value) = extra.run_end_time {
        rows.push(("Run End", fmt_unix(value)));
    }
    if let Some(value) = extra.run_time {
        rows.push(("Run Time", fmt_duration(value)));
    }
    rows
}
