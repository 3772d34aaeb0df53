use std::error::Error;
use std::fmt;

use crate::error::{DecodeError, EncodeError, ProjectError, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Decode,
    Encode,
    MalformedDocument,
    ModeDetectionAmbiguous,
    UnknownFlag,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}

impl From<DecodeError> for CoreError {
    fn from(err: DecodeError) -> Self {
        Self::new(
            CoreErrorCode::Decode,
            format!("file could not be decoded: {err}"),
        )
    }
}

impl From<EncodeError> for CoreError {
    fn from(err: EncodeError) -> Self {
        Self::new(
            CoreErrorCode::Encode,
            format!("invalid document, reset or fix it: {err}"),
        )
    }
}

impl From<ProjectError> for CoreError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::Parse(inner) => EncodeError::InvalidDocument(inner).into(),
            other => Self::new(CoreErrorCode::MalformedDocument, other.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        Self::new(CoreErrorCode::Storage, err.to_string())
    }
}
