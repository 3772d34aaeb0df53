use std::fs;
use std::path::PathBuf;

use silksong_core::codec::{self, MIN_FRAME_LEN, Mode};
use silksong_core::error::DecodeError;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_path(name: &str) -> PathBuf {
    workspace_root().join("tests/fixtures").join(name)
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = fixture_path(name);
    fs::read(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e))
}

fn canonical_fixture() -> String {
    String::from_utf8(fixture_bytes("user1.canonical.json")).expect("fixture should be UTF-8")
}

#[test]
fn encrypted_fixture_decodes_to_canonical_text() {
    let decoded = codec::decode(fixture_bytes("user1.dat"), Mode::Encrypted)
        .expect("captured save should decode");
    assert_eq!(decoded, canonical_fixture());
}

#[test]
fn plain_fixture_decodes_to_the_same_text() {
    let decoded = codec::decode(fixture_bytes("user1.json"), Mode::Plain)
        .expect("plain save should decode");
    assert_eq!(decoded, canonical_fixture());
}

#[test]
fn encoding_the_fixture_document_reproduces_the_captured_bytes() {
    let encoded =
        codec::encode(&canonical_fixture(), Mode::Encrypted).expect("document should encode");
    assert_eq!(encoded, fixture_bytes("user1.dat"));
}

#[test]
fn encode_then_decode_is_stable() {
    let bytes = fixture_bytes("user1.dat");
    let first = codec::decode(&bytes, Mode::Encrypted).expect("captured save should decode");
    let reencoded = codec::encode(&first, Mode::Encrypted).expect("document should encode");
    let second = codec::decode(&reencoded, Mode::Encrypted).expect("re-encoded save should decode");
    assert_eq!(first, second);

    let plain = codec::encode(&first, Mode::Plain).expect("document should encode as plain");
    assert_eq!(
        codec::decode(&plain, Mode::Plain).expect("plain output should decode"),
        first
    );
}

#[test]
fn truncated_fixture_fails_to_decode() {
    let mut bytes = fixture_bytes("user1.dat");
    bytes.truncate(MIN_FRAME_LEN - 1);
    assert!(matches!(
        codec::decode(&bytes, Mode::Encrypted),
        Err(DecodeError::TooShort { .. })
    ));

    let mut bytes = fixture_bytes("user1.dat");
    bytes.truncate(bytes.len() / 2);
    assert!(codec::decode(&bytes, Mode::Encrypted).is_err());
}

#[test]
fn fixtures_refuse_the_wrong_mode() {
    assert!(matches!(
        codec::decode(fixture_bytes("user1.dat"), Mode::Plain),
        Err(DecodeError::WrongMode { .. })
    ));
    assert!(matches!(
        codec::decode(fixture_bytes("user1.json"), Mode::Encrypted),
        Err(DecodeError::BadHeader)
    ));
}

#[test]
fn detect_mode_matches_fixtures() {
    assert_eq!(
        codec::detect_mode(&fixture_bytes("user1.dat")),
        Some(Mode::Encrypted)
    );
    assert_eq!(
        codec::detect_mode(&fixture_bytes("user1.json")),
        Some(Mode::Plain)
    );
}
