//! Binary save codec.
//!
//! An encrypted save is a .NET BinaryFormatter stream holding one string
//! record:
//!
//! ```text
//! [22-byte header][7-bit length prefix][base64 payload][0x0B]
//! ```
//!
//! The base64 payload is AES-256-ECB ciphertext with PKCS#7 padding whose
//! plaintext is the JSON save document. Plain saves are the JSON document
//! with no framing at all.

use std::fmt;

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document;
use crate::error::{DecodeError, EncodeError};

pub const RECORD_HEADER: [u8; 22] = [
    0x00, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x06, 0x01, 0x00, 0x00, 0x00,
];
const RECORD_END: u8 = 0x0B;
/// Header, a one-byte length prefix and the terminator.
pub const MIN_FRAME_LEN: usize = RECORD_HEADER.len() + 2;
const MAX_PREFIX_BYTES: usize = 5;
const BLOCK_SIZE: usize = 16;
const SAVE_KEY: &[u8; 32] = b"UKu52ePUBwetZ9wNX88o54dnfKRu0T1l";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Encrypted,
    Plain,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypted => "encrypted",
            Self::Plain => "plain",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "encrypted" | "enc" | "dat" => Some(Self::Encrypted),
            "plain" | "plaintext" | "json" => Some(Self::Plain),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes `bytes` with the transform selected by `mode` and returns the
/// canonical document text.
pub fn decode(bytes: impl AsRef<[u8]>, mode: Mode) -> Result<String, DecodeError> {
    match mode {
        Mode::Encrypted => decode_encrypted(bytes.as_ref()),
        Mode::Plain => decode_plain(bytes.as_ref()),
    }
}

pub fn encode(text: &str, mode: Mode) -> Result<Vec<u8>, EncodeError> {
    match mode {
        Mode::Encrypted => encode_encrypted(text),
        Mode::Plain => encode_plain(text),
    }
}

/// Sniffs which mode `bytes` were written in without decoding them.
pub fn detect_mode(bytes: &[u8]) -> Option<Mode> {
    if bytes.starts_with(&RECORD_HEADER) {
        return Some(Mode::Encrypted);
    }
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Some(Mode::Plain),
        _ => None,
    }
}

pub fn decode_encrypted(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min: MIN_FRAME_LEN,
        });
    }
    if bytes[..RECORD_HEADER.len()] != RECORD_HEADER {
        return Err(DecodeError::BadHeader);
    }

    let (declared, prefix_len) = read_length_prefix(&bytes[RECORD_HEADER.len()..])?;
    let start = RECORD_HEADER.len() + prefix_len;
    if bytes.last() != Some(&RECORD_END) {
        return Err(DecodeError::MissingTerminator);
    }
    let available = bytes.len().saturating_sub(start + 1);
    if declared != available {
        return Err(DecodeError::LengthMismatch {
            declared,
            available,
        });
    }

    let ciphertext = STANDARD.decode(&bytes[start..start + declared])?;
    let plaintext = decrypt(ciphertext)?;
    let text = String::from_utf8(plaintext)?;
    let value = document::parse(&text).map_err(DecodeError::Document)?;
    debug!(
        file_len = bytes.len(),
        payload_len = text.len(),
        "decoded encrypted save"
    );
    Ok(document::to_canonical(&value))
}

pub fn decode_plain(bytes: &[u8]) -> Result<String, DecodeError> {
    if detect_mode(bytes) == Some(Mode::Encrypted) {
        return Err(DecodeError::WrongMode {
            requested: Mode::Plain,
            detected: Mode::Encrypted,
        });
    }

    let text = String::from_utf8(bytes.to_vec())?;
    let value = document::parse(&text).map_err(DecodeError::Document)?;
    debug!(file_len = bytes.len(), "decoded plain save");
    Ok(document::to_canonical(&value))
}

/// Frames and encrypts the document. The payload is written compactly, the
/// way the game writes it.
pub fn encode_encrypted(text: &str) -> Result<Vec<u8>, EncodeError> {
    let value = document::parse(text)?;
    let payload = document::to_compact(&value);

    let ciphertext = encrypt(payload.as_bytes());
    let encoded = STANDARD.encode(ciphertext);

    let mut out = Vec::with_capacity(MIN_FRAME_LEN + MAX_PREFIX_BYTES + encoded.len());
    out.extend_from_slice(&RECORD_HEADER);
    write_length_prefix(encoded.len(), &mut out);
    out.extend_from_slice(encoded.as_bytes());
    out.push(RECORD_END);

    debug!(
        payload_len = payload.len(),
        file_len = out.len(),
        "encoded encrypted save"
    );
    Ok(out)
}

pub fn encode_plain(text: &str) -> Result<Vec<u8>, EncodeError> {
    let value = document::parse(text)?;
    Ok(document::to_canonical(&value).into_bytes())
}

fn read_length_prefix(bytes: &[u8]) -> Result<(usize, usize), DecodeError> {
    let mut value = 0u32;
    for (index, &byte) in bytes.iter().take(MAX_PREFIX_BYTES).enumerate() {
        // The fifth byte only has room for the top four bits of an i32.
        if index == MAX_PREFIX_BYTES - 1 && byte > 0x07 {
            return Err(DecodeError::BadLengthPrefix);
        }
        value |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value as usize, index + 1));
        }
    }
    Err(DecodeError::BadLengthPrefix)
}

fn write_length_prefix(len: usize, out: &mut Vec<u8>) {
    let mut remaining = len;
    while remaining >= 0x80 {
        out.push((remaining as u8 & 0x7F) | 0x80);
        remaining >>= 7;
    }
    out.push(remaining as u8);
}

fn cipher() -> Aes256 {
    Aes256::new(GenericArray::from_slice(&SAVE_KEY[..]))
}

fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    let mut data = pkcs7_pad(plaintext);
    let cipher = cipher();
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    data
}

fn decrypt(mut data: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
    if data.is_empty() || !data.len().is_multiple_of(BLOCK_SIZE) {
        return Err(DecodeError::BlockLength(data.len()));
    }
    let cipher = cipher();
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    pkcs7_unpad(&mut data)?;
    Ok(data)
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

fn pkcs7_unpad(data: &mut Vec<u8>) -> Result<(), DecodeError> {
    let pad_len = usize::from(*data.last().ok_or(DecodeError::Padding)?);
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(DecodeError::Padding);
    }
    if !data[data.len() - pad_len..]
        .iter()
        .all(|&byte| usize::from(byte) == pad_len)
    {
        return Err(DecodeError::Padding);
    }
    data.truncate(data.len() - pad_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"playerData":{"geo":12,"SavedFlea_Ant_03":true},"sceneData":{}}"#;

    #[test]
    fn length_prefix_roundtrips_across_byte_boundaries() {
        for len in [0usize, 1, 0x7F, 0x80, 748, 0x3FFF, 0x4000, 1 << 21, (1 << 31) - 1] {
            let mut buf = Vec::new();
            write_length_prefix(len, &mut buf);
            let (value, consumed) = read_length_prefix(&buf).expect("prefix should parse");
            assert_eq!(value, len);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn length_prefix_matches_known_encoding() {
        let mut buf = Vec::new();
        write_length_prefix(748, &mut buf);
        assert_eq!(buf, vec![0xEC, 0x05]);
    }

    #[test]
    fn length_prefix_rejects_unterminated_and_oversized_values() {
        assert!(matches!(
            read_length_prefix(&[0x80, 0x80]),
            Err(DecodeError::BadLengthPrefix)
        ));
        assert!(matches!(
            read_length_prefix(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
            Err(DecodeError::BadLengthPrefix)
        ));
    }

    #[test]
    fn padding_always_adds_at_least_one_byte() {
        assert_eq!(pkcs7_pad(&[]).len(), BLOCK_SIZE);
        assert_eq!(pkcs7_pad(&[0u8; 15]).len(), BLOCK_SIZE);
        assert_eq!(pkcs7_pad(&[0u8; 16]).len(), BLOCK_SIZE * 2);

        let mut padded = pkcs7_pad(b"flea");
        pkcs7_unpad(&mut padded).expect("padding should strip");
        assert_eq!(padded, b"flea");
    }

    #[test]
    fn unpad_rejects_inconsistent_padding() {
        let mut data = vec![0u8; 15];
        data.push(3);
        assert!(matches!(pkcs7_unpad(&mut data), Err(DecodeError::Padding)));

        let mut zero = vec![0u8; 16];
        assert!(matches!(pkcs7_unpad(&mut zero), Err(DecodeError::Padding)));
    }

    #[test]
    fn encrypted_roundtrip_returns_canonical_text() {
        let bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        assert!(bytes.starts_with(&RECORD_HEADER));
        assert_eq!(bytes.last(), Some(&RECORD_END));

        let decoded = decode_encrypted(&bytes).expect("encoded sample should decode");
        assert_eq!(
            decoded,
            document::canonicalize(SAMPLE).expect("sample should canonicalize")
        );
    }

    #[test]
    fn plain_roundtrip_returns_canonical_text() {
        let bytes = encode_plain(SAMPLE).expect("sample should encode");
        let decoded = decode_plain(&bytes).expect("plain bytes should decode");
        assert_eq!(decoded.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn decode_rejects_short_input() {
        let err = decode_encrypted(&RECORD_HEADER).expect_err("bare header should fail");
        assert!(matches!(err, DecodeError::TooShort { len: 22, min: 24 }));
    }

    #[test]
    fn decode_rejects_bad_header() {
        let mut bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        bytes[5] = 0x00;
        assert!(matches!(
            decode_encrypted(&bytes),
            Err(DecodeError::BadHeader)
        ));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        bytes.truncate(bytes.len() - 10);
        assert!(decode_encrypted(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let mut bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        bytes.push(0x00);
        assert!(matches!(
            decode_encrypted(&bytes),
            Err(DecodeError::MissingTerminator)
        ));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        let last = bytes.len() - 1;
        bytes.insert(last, b'A');
        assert!(matches!(
            decode_encrypted(&bytes),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_tampered_ciphertext() {
        let mut bytes = encode_encrypted(SAMPLE).expect("sample should encode");
        // Flip a character inside the last base64 block so the padding breaks.
        let index = bytes.len() - 6;
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        assert!(decode_encrypted(&bytes).is_err());
    }

    #[test]
    fn modes_do_not_mix() {
        let encrypted = encode_encrypted(SAMPLE).expect("sample should encode");
        let err = decode_plain(&encrypted).expect_err("encrypted bytes are not plain");
        assert!(matches!(
            err,
            DecodeError::WrongMode {
                requested: Mode::Plain,
                detected: Mode::Encrypted
            }
        ));

        let plain = encode_plain(SAMPLE).expect("sample should encode");
        assert!(matches!(
            decode_encrypted(&plain),
            Err(DecodeError::BadHeader)
        ));
    }

    #[test]
    fn detect_mode_sniffs_both_formats() {
        let encrypted = encode_encrypted(SAMPLE).expect("sample should encode");
        assert_eq!(detect_mode(&encrypted), Some(Mode::Encrypted));
        assert_eq!(detect_mode(b"  \n{\"a\":1}"), Some(Mode::Plain));
        assert_eq!(detect_mode(b"\xEF\xBB\xBF{}"), Some(Mode::Plain));
        assert_eq!(detect_mode(b"garbage"), None);
    }

    #[test]
    fn encode_rejects_invalid_document() {
        assert!(encode_encrypted("{not json").is_err());
        assert!(encode_plain("").is_err());
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!(Mode::parse("Encrypted"), Some(Mode::Encrypted));
        assert_eq!(Mode::parse(" json "), Some(Mode::Plain));
        assert_eq!(Mode::parse("zip"), None);
    }
}
