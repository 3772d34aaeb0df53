use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::codec::Mode;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input is {len} bytes, shorter than the {min}-byte minimum frame")]
    TooShort { len: usize, min: usize },
    #[error("save header does not match the expected record prologue")]
    BadHeader,
    #[error("record length prefix is malformed")]
    BadLengthPrefix,
    #[error("record declares {declared} payload bytes but {available} are present")]
    LengthMismatch { declared: usize, available: usize },
    #[error("record terminator is missing")]
    MissingTerminator,
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length {0} is not a positive multiple of the cipher block size")]
    BlockLength(usize),
    #[error("decrypted payload has invalid padding")]
    Padding,
    #[error("payload is not UTF-8 text: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("payload is not a valid save document: {0}")]
    Document(#[source] serde_json::Error),
    #[error("input looks like a {detected} save and cannot be decoded in {requested} mode")]
    WrongMode { requested: Mode, detected: Mode },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("document is not valid JSON: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("document root is not an object")]
    RootNotAnObject,
    #[error("`{0}` section is not an object")]
    SectionNotAnObject(&'static str),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("history storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("history storage is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error("history storage version {0} is not supported")]
    UnsupportedVersion(u32),
}
