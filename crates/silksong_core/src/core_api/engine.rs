use tracing::debug;

use crate::codec::{self, Mode};
use crate::document;
use crate::fingerprint::Fingerprint;
use crate::history::HistoryEntry;
use crate::projector::{self, FLEA_FLAGS, FlagValue};

use super::error::{CoreError, CoreErrorCode};
use super::types::{FlagEntry, Snapshot};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// An opened save: the document as decoded and the working copy the user
/// edits. Flag edits are always merged against the original document.
#[derive(Debug, Clone)]
pub struct Session {
    mode: Mode,
    original: String,
    working: String,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        hint: Option<Mode>,
    ) -> Result<Session, CoreError> {
        let bytes = bytes.as_ref();

        match hint {
            Some(mode) => codec::decode(bytes, mode)
                .map(|text| Session::new(mode, text))
                .map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Decode,
                        format!("file could not be decoded as a {mode} save: {e}"),
                    )
                }),
            None => {
                let encrypted = codec::decode_encrypted(bytes);
                let plain = codec::decode_plain(bytes);

                match (encrypted, plain) {
                    (Ok(text), Err(_)) => Ok(Session::new(Mode::Encrypted, text)),
                    (Err(_), Ok(text)) => Ok(Session::new(Mode::Plain, text)),
                    (Ok(_), Ok(_)) => Err(CoreError::new(
                        CoreErrorCode::ModeDetectionAmbiguous,
                        "input decoded as both an encrypted and a plain save; supply a mode",
                    )),
                    (Err(e1), Err(e2)) => Err(CoreError::new(
                        CoreErrorCode::Decode,
                        format!("file could not be decoded: encrypted: {e1}; plain: {e2}"),
                    )),
                }
            }
        }
    }

    /// Reopens a history entry: its document is the original, and its
    /// report is applied to produce the working copy.
    pub fn open_history_entry(
        &self,
        entry: &HistoryEntry,
        mode: Mode,
    ) -> Result<Session, CoreError> {
        let original = document::canonicalize(&entry.document_text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Decode,
                format!("history entry '{}' is not a valid document: {e}", entry.display_name),
            )
        })?;
        let mut session = Session::new(mode, original);
        session.apply_report(&entry.report_text)?;
        Ok(session)
    }
}

impl Session {
    fn new(mode: Mode, text: String) -> Self {
        debug!(%mode, len = text.len(), "opened session");
        Self {
            mode,
            original: text.clone(),
            working: text,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn original_text(&self) -> &str {
        &self.original
    }

    pub fn working_text(&self) -> &str {
        &self.working
    }

    pub fn is_modified(&self) -> bool {
        self.original != self.working
    }

    pub fn report(&self) -> String {
        projector::project(&self.working, &FLEA_FLAGS)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.report())
    }

    pub fn flags(&self) -> Result<Vec<FlagEntry>, CoreError> {
        let value = document::parse(&self.working).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Encode,
                format!("invalid document, reset or fix it: {e}"),
            )
        })?;
        let report = projector::project_value(&value, &FLEA_FLAGS)?;
        Ok(report
            .entries()
            .iter()
            .map(|&(name, value)| FlagEntry { name, value })
            .collect())
    }

    pub fn snapshot(&self) -> Snapshot {
        let flags = self.flags();
        let malformed = flags.is_err();
        let flags = flags.unwrap_or_default();
        let count = |wanted: FlagValue| flags.iter().filter(|f| f.value == wanted).count();
        Snapshot {
            mode: self.mode,
            fingerprint: self.fingerprint(),
            modified: self.is_modified(),
            document_len: self.working.len(),
            malformed,
            flags_true: count(FlagValue::True),
            flags_false: count(FlagValue::False),
            flags_absent: count(FlagValue::Absent),
        }
    }

    /// Merges an edited report into the original document and makes the
    /// result the working copy. Returns how many edits the report carried.
    /// On error the working copy is untouched.
    pub fn apply_report(&mut self, report: &str) -> Result<usize, CoreError> {
        let mut value = document::parse(&self.original).map_err(|e| {
            CoreError::new(
                CoreErrorCode::MalformedDocument,
                format!("original document no longer parses: {e}"),
            )
        })?;
        let applied = projector::merge_value(report, &mut value, &FLEA_FLAGS)?;
        self.working = document::to_canonical(&value);
        debug!(applied, "applied flag report");
        Ok(applied)
    }

    pub fn set_flag(&mut self, name: &str, value: FlagValue) -> Result<(), CoreError> {
        let Some(flag) = projector::lookup_flag(name, &FLEA_FLAGS) else {
            return Err(CoreError::new(
                CoreErrorCode::UnknownFlag,
                format!("'{name}' is not an editable flag"),
            ));
        };
        let mut document = document::parse(&self.working).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Encode,
                format!("invalid document, reset or fix it: {e}"),
            )
        })?;
        projector::apply_edits(&mut document, &[(flag, value)])?;
        self.working = document::to_canonical(&document);
        Ok(())
    }

    /// Replaces the working copy verbatim. It is only validated when encoded.
    pub fn set_working_text(&mut self, text: impl Into<String>) {
        self.working = text.into();
    }

    pub fn reset(&mut self) {
        self.working = self.original.clone();
    }

    pub fn to_bytes(&self, mode: Mode) -> Result<Vec<u8>, CoreError> {
        Ok(codec::encode(&self.working, mode)?)
    }

    pub fn to_bytes_in_source_mode(&self) -> Result<Vec<u8>, CoreError> {
        self.to_bytes(self.mode)
    }

    pub fn to_encrypted_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.to_bytes(Mode::Encrypted)
    }

    pub fn to_plain_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.to_bytes(Mode::Plain)
    }

    pub fn history_entry(&self, display_name: impl Into<String>, timestamp_ms: u64) -> HistoryEntry {
        HistoryEntry::new(display_name, self.working.clone(), self.report(), timestamp_ms)
    }
}
