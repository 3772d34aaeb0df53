use std::path::PathBuf;

use silksong_core::core_api::{Engine, Session};
use silksong_core::history::{HistoryEntry, HistoryList};
use silksong_core::projector::{FLAG_COUNT, FLEA_FLAGS, FlagValue};
use silksong_render::{
    JsonStyle, render_flags_text, render_history_entry_text, render_history_json,
    render_history_text, render_session_json,
};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn session_from_fixture() -> Session {
    let bytes = std::fs::read(workspace_root().join("tests/fixtures/user1.dat"))
        .expect("fixture should be readable");
    Engine::new()
        .open_bytes(bytes, None)
        .expect("fixture should decode")
}

fn sample_history() -> HistoryList {
    let mut list = HistoryList::with_capacity(5);
    list.insert(HistoryEntry::new(
        "user1.dat",
        "{}",
        "SavedFlea_Ant_03: true\n",
        1_700_000_000_000,
    ));
    list.insert(HistoryEntry::new(
        "a-very-long-save-file-name-from-a-backup.dat",
        "{}",
        "SavedFlea_Ant_03: false\n",
        1_700_000_060_000,
    ));
    list
}

#[test]
fn session_json_uses_canonical_top_level_order() {
    let value = render_session_json(&session_from_fixture(), JsonStyle::CanonicalV1);
    let keys: Vec<&str> = value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        keys,
        vec![
            "mode",
            "fingerprint",
            "modified",
            "document_len",
            "malformed",
            "counts",
            "flags"
        ]
    );
}

#[test]
fn session_json_maps_absent_flags_to_null() {
    let value = render_session_json(&session_from_fixture(), JsonStyle::CanonicalV1);
    assert_eq!(value["mode"], "encrypted");
    assert_eq!(value["flags"]["SavedFlea_Ant_03"], true);
    assert_eq!(value["flags"]["SavedFlea_Bone_06"], false);
    assert!(value["flags"]["tamedGiantFlea"].is_null());
    assert_eq!(value["counts"]["true"], 2);
    assert_eq!(
        value["flags"].as_object().expect("flags object").len(),
        FLAG_COUNT
    );
}

#[test]
fn session_json_flags_are_null_for_broken_working_copy() {
    let mut session = session_from_fixture();
    session.set_working_text("[");
    let value = render_session_json(&session, JsonStyle::CanonicalV1);
    assert!(value["flags"].is_null());
    assert_eq!(value["modified"], true);
    assert_eq!(value["malformed"], true);
    assert_eq!(value["counts"]["n/a"], 0);
}

#[test]
fn flags_text_has_one_aligned_line_per_flag() {
    let flags = session_from_fixture().flags().expect("flags should read");
    let text = render_flags_text(&flags);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), FLEA_FLAGS.len());
    assert!(lines[0].starts_with("SavedFlea_Ant_03"));
    assert!(lines[0].ends_with("true"));
    assert_eq!(lines[0].find("true"), lines[1].find(FlagValue::Absent.as_str()));
}

#[test]
fn history_text_lists_newest_first() {
    let text = render_history_text(&sample_history());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("fingerprint"));
    assert!(lines[1].starts_with(" 1  "));
    assert!(lines[1].contains("2023-11-14 22:14:20"));
    assert!(lines[1].ends_with('…'));
    assert!(lines[2].ends_with("user1.dat"));
}

#[test]
fn history_text_for_empty_list() {
    assert_eq!(
        render_history_text(&HistoryList::with_capacity(3)),
        "No recent files.\n"
    );
}

#[test]
fn history_json_omits_document_bodies() {
    let value = render_history_json(&sample_history(), JsonStyle::CanonicalV1);
    let entries = value.as_array().expect("history json should be an array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["display_name"], "user1.dat");
    assert_eq!(entries[1]["opened"], "2023-11-14 22:13:20");
    assert!(entries[0].get("document_text").is_none());
    assert_eq!(
        entries[0]["fingerprint"]
            .as_str()
            .expect("fingerprint string")
            .len(),
        64
    );
}

#[test]
fn history_entry_text_ends_with_the_report() {
    let list = sample_history();
    let entry = &list.entries()[1];
    let text = render_history_entry_text(entry);
    assert!(text.starts_with("File:        user1.dat\n"));
    assert!(text.ends_with("\nSavedFlea_Ant_03: true\n"));
}
