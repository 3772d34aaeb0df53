use serde::{Deserialize, Serialize};
use silksong_core::codec::{self, Mode};
use silksong_core::core_api::{CoreError, CoreErrorCode, Engine};
use silksong_core::document;
use silksong_core::fingerprint::Fingerprint;
use silksong_core::history::{HistoryEntry, MemoryStorage, RecentFiles};
use silksong_core::projector::{self, FLEA_FLAGS};
use silksong_render::{JsonStyle, render_history_json, render_session_json};
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebDecodeOptions {
    pub mode_hint: Option<String>,
}

/// What the page needs after opening a file. `summary` is the same JSON the
/// CLI prints for `report --json`.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedSave {
    pub mode: Mode,
    pub document: String,
    pub report: String,
    pub fingerprint: String,
    pub summary: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebHistoryEntry {
    pub display_name: String,
    pub document: String,
    pub report: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone)]
struct WebError {
    code: &'static str,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct WebErrorPayload {
    code: String,
    message: String,
}

impl WebError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_js_value(&self) -> JsValue {
        let payload = WebErrorPayload {
            code: self.code.to_string(),
            message: self.message.clone(),
        };
        serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| {
            JsValue::from_str(&format!("{}: {}", payload.code, payload.message))
        })
    }
}

impl From<CoreError> for WebError {
    fn from(err: CoreError) -> Self {
        let code = match err.code {
            CoreErrorCode::Io => "io_failed",
            CoreErrorCode::Decode => "decode_failed",
            CoreErrorCode::Encode => "invalid_document",
            CoreErrorCode::MalformedDocument => "malformed_document",
            CoreErrorCode::ModeDetectionAmbiguous => "ambiguous_mode",
            CoreErrorCode::UnknownFlag => "unknown_flag",
            CoreErrorCode::Storage => "storage_failed",
        };
        Self::new(code, err.message)
    }
}

#[wasm_bindgen]
pub fn decode_save(save_bytes: &[u8], options: JsValue) -> Result<JsValue, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    let decoded =
        decode_save_impl(save_bytes, &parsed_options).map_err(|err| err.to_js_value())?;
    to_js(&decoded).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn apply_report(report: &str, document: &str) -> Result<String, JsValue> {
    apply_report_impl(report, document).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn encode_save(document: &str, mode: &str) -> Result<Vec<u8>, JsValue> {
    encode_save_impl(document, mode).map_err(|err| err.to_js_value())
}

/// Takes the history string the page keeps in browser storage and returns
/// the updated one.
#[wasm_bindgen]
pub fn history_insert(
    stored: Option<String>,
    entry: JsValue,
    capacity: usize,
) -> Result<String, JsValue> {
    let entry: WebHistoryEntry = serde_wasm_bindgen::from_value(entry).map_err(|err| {
        WebError::new(
            "invalid_options",
            format!("Failed to parse history entry: {err}"),
        )
        .to_js_value()
    })?;
    history_insert_impl(stored.as_deref(), entry, capacity).map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn history_remove(
    stored: Option<String>,
    fingerprint: &str,
    capacity: usize,
) -> Result<String, JsValue> {
    history_remove_impl(stored.as_deref(), fingerprint, capacity)
        .map_err(|err| err.to_js_value())
}

#[wasm_bindgen]
pub fn history_list(stored: Option<String>, capacity: usize) -> Result<String, JsValue> {
    history_list_impl(stored.as_deref(), capacity).map_err(|err| err.to_js_value())
}

fn decode_save_impl(save_bytes: &[u8], options: &WebDecodeOptions) -> Result<DecodedSave, WebError> {
    if save_bytes.is_empty() {
        return Err(WebError::new(
            "unsupported_file",
            "The uploaded file is empty. Please provide a user*.dat save file.",
        ));
    }

    let mode_hint = parse_mode_hint(options.mode_hint.as_deref())?;
    let session = Engine::new().open_bytes(save_bytes, mode_hint)?;

    Ok(DecodedSave {
        mode: session.mode(),
        document: session.working_text().to_string(),
        report: session.report(),
        fingerprint: session.fingerprint().to_string(),
        summary: render_session_json(&session, JsonStyle::CanonicalV1),
    })
}

fn apply_report_impl(report: &str, document_text: &str) -> Result<String, WebError> {
    let mut value = document::parse(document_text).map_err(|err| {
        WebError::new(
            "invalid_document",
            format!("The document is not valid JSON: {err}"),
        )
    })?;
    projector::merge_value(report, &mut value, &FLEA_FLAGS)
        .map_err(|err| WebError::from(CoreError::from(err)))?;
    Ok(document::to_canonical(&value))
}

fn encode_save_impl(document_text: &str, raw_mode: &str) -> Result<Vec<u8>, WebError> {
    let mode = parse_mode_hint(Some(raw_mode))?.unwrap_or(Mode::Encrypted);
    codec::encode(document_text, mode).map_err(|err| WebError::from(CoreError::from(err)))
}

fn history_insert_impl(
    stored: Option<&str>,
    entry: WebHistoryEntry,
    capacity: usize,
) -> Result<String, WebError> {
    let mut history = open_history(stored, capacity);
    history.insert(HistoryEntry::new(
        entry.display_name,
        entry.document,
        entry.report,
        entry.timestamp_ms,
    ));
    stored_string(&history)
}

fn history_remove_impl(
    stored: Option<&str>,
    raw_fingerprint: &str,
    capacity: usize,
) -> Result<String, WebError> {
    let fingerprint = Fingerprint::parse(raw_fingerprint).ok_or_else(|| {
        WebError::new(
            "invalid_options",
            format!("'{raw_fingerprint}' is not a fingerprint"),
        )
    })?;
    let mut history = open_history(stored, capacity);
    history.remove(&fingerprint);
    stored_string(&history)
}

fn history_list_impl(stored: Option<&str>, capacity: usize) -> Result<String, WebError> {
    let history = open_history(stored, capacity);
    let value = render_history_json(history.list(), JsonStyle::CanonicalV1);
    serde_json::to_string_pretty(&value).map_err(|err| {
        WebError::new(
            "render_failed",
            format!("failed to serialize history JSON: {err}"),
        )
    })
}

fn open_history(stored: Option<&str>, capacity: usize) -> RecentFiles<MemoryStorage> {
    let storage = match stored {
        Some(text) if !text.trim().is_empty() => MemoryStorage::with_bytes(text.as_bytes()),
        _ => MemoryStorage::new(),
    };
    RecentFiles::open(storage, capacity)
}

// The list is re-serialized even when nothing changed, so a malformed stored
// string is replaced by a clean one.
fn stored_string(history: &RecentFiles<MemoryStorage>) -> Result<String, WebError> {
    let bytes = history
        .list()
        .to_bytes()
        .map_err(|err| WebError::from(CoreError::from(err)))?;
    String::from_utf8(bytes)
        .map_err(|err| WebError::new("storage_failed", format!("history is not UTF-8: {err}")))
}

fn to_js(decoded: &DecodedSave) -> Result<JsValue, WebError> {
    decoded
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| {
            WebError::new(
                "render_failed",
                format!("failed to convert decoded save: {err}"),
            )
        })
}

fn parse_options(options: JsValue) -> Result<WebDecodeOptions, WebError> {
    if options.is_null() || options.is_undefined() {
        return Ok(WebDecodeOptions::default());
    }

    serde_wasm_bindgen::from_value(options).map_err(|err| {
        WebError::new(
            "invalid_options",
            format!("Failed to parse web decode options: {err}"),
        )
    })
}

fn parse_mode_hint(raw_hint: Option<&str>) -> Result<Option<Mode>, WebError> {
    let Some(raw_hint) = raw_hint else {
        return Ok(None);
    };
    if raw_hint.trim().is_empty() {
        return Ok(None);
    }

    Mode::parse(raw_hint).map(Some).ok_or_else(|| {
        WebError::new(
            "invalid_options",
            format!("Invalid mode '{raw_hint}'. Expected one of: encrypted, plain"),
        )
    })
}
