use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Value as JsonValue};
use silksong_core::core_api::{FlagEntry, Session};
use silksong_core::history::{HistoryEntry, HistoryList};
use silksong_core::projector::FlagValue;

const NAME_COL_WIDTH: usize = 32;
const HISTORY_NAME_WIDTH: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

pub fn render_session_json(session: &Session, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(session_json(session)),
    }
}

pub fn render_history_json(list: &HistoryList, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            JsonValue::Array(list.iter().map(history_entry_json).collect())
        }
    }
}

/// Two-column flag table, one flag per line.
pub fn render_flags_text(flags: &[FlagEntry]) -> String {
    let mut out = String::new();
    for flag in flags {
        let _ = writeln!(
            out,
            "{:<width$}{}",
            flag.name,
            flag.value,
            width = NAME_COL_WIDTH
        );
    }
    out
}

pub fn render_history_text(list: &HistoryList) -> String {
    if list.is_empty() {
        return "No recent files.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        " #  {:<12}  {:<19}  {}",
        "fingerprint", "opened (UTC)", "file"
    );
    for (index, entry) in list.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}  {:<12}  {:<19}  {}",
            index + 1,
            entry.fingerprint.short(),
            format_timestamp(entry.timestamp_ms),
            truncate(&entry.display_name, HISTORY_NAME_WIDTH),
        );
    }
    out
}

/// Header lines followed by the stored report, as shown when an entry is
/// reopened.
pub fn render_history_entry_text(entry: &HistoryEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File:        {}", entry.display_name);
    let _ = writeln!(out, "Fingerprint: {}", entry.fingerprint);
    let _ = writeln!(out, "Opened:      {} UTC", format_timestamp(entry.timestamp_ms));
    out.push('\n');
    out.push_str(&entry.report_text);
    out
}

pub fn format_timestamp(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn session_json(session: &Session) -> JsonMap<String, JsonValue> {
    let snapshot = session.snapshot();
    let mut out = JsonMap::new();

    out.insert(
        "mode".to_string(),
        JsonValue::String(snapshot.mode.to_string()),
    );
    out.insert(
        "fingerprint".to_string(),
        JsonValue::String(snapshot.fingerprint.to_string()),
    );
    out.insert("modified".to_string(), JsonValue::Bool(snapshot.modified));
    out.insert(
        "document_len".to_string(),
        JsonValue::from(snapshot.document_len),
    );
    out.insert("malformed".to_string(), JsonValue::Bool(snapshot.malformed));

    let mut counts = JsonMap::new();
    counts.insert("true".to_string(), JsonValue::from(snapshot.flags_true));
    counts.insert("false".to_string(), JsonValue::from(snapshot.flags_false));
    counts.insert("n/a".to_string(), JsonValue::from(snapshot.flags_absent));
    out.insert("counts".to_string(), JsonValue::Object(counts));

    out.insert(
        "flags".to_string(),
        match session.flags() {
            Ok(flags) => flags_json(&flags),
            Err(_) => JsonValue::Null,
        },
    );

    out
}

fn flags_json(flags: &[FlagEntry]) -> JsonValue {
    let mut m = JsonMap::new();
    for flag in flags {
        m.insert(flag.name.to_string(), flag_value_json(flag.value));
    }
    JsonValue::Object(m)
}

fn flag_value_json(value: FlagValue) -> JsonValue {
    match value.as_bool() {
        Some(b) => JsonValue::Bool(b),
        None => JsonValue::Null,
    }
}

fn history_entry_json(entry: &HistoryEntry) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "fingerprint".to_string(),
        JsonValue::String(entry.fingerprint.to_string()),
    );
    m.insert(
        "display_name".to_string(),
        JsonValue::String(entry.display_name.clone()),
    );
    m.insert("timestamp_ms".to_string(), JsonValue::from(entry.timestamp_ms));
    m.insert(
        "opened".to_string(),
        JsonValue::String(format_timestamp(entry.timestamp_ms)),
    );
    JsonValue::Object(m)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
