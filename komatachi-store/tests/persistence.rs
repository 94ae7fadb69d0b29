//! Crash-tolerance tests for the conversation store.
//!
//! These simulate process death by tearing into the files a previous store
//! instance wrote, then loading with a fresh one.

use komatachi_core::{ContentBlock, Message};
use komatachi_store::{ConversationStore, StoreError, TRANSCRIPT_FILE};
use std::fs;
use std::path::Path;

fn store_in(dir: &Path) -> ConversationStore {
    ConversationStore::new(dir, "conversation")
}

#[test]
fn truncated_tail_loses_at_most_the_last_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(dir.path());
    store.initialize(None).unwrap();
    store.append_message(&Message::user("one")).unwrap();
    store.append_message(&Message::user("two")).unwrap();
    store.append_message(&Message::user("three")).unwrap();

    // Chop the final byte, as a crash mid-append would.
    let transcript = store.dir().join(TRANSCRIPT_FILE);
    let raw = fs::read(&transcript).unwrap();
    fs::write(&transcript, &raw[..raw.len() - 1]).unwrap();

    let mut fresh = store_in(dir.path());
    fresh.load().unwrap();
    let messages = fresh.messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].as_text(), Some("one"));
    assert_eq!(messages[1].as_text(), Some("two"));
}

#[test]
fn reload_yields_a_prefix_for_every_truncation_point() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(dir.path());
    store.initialize(None).unwrap();

    let appended: Vec<Message> = vec![
        Message::user("alpha"),
        Message::assistant(vec![ContentBlock::text("beta")]),
        Message::user("gamma"),
    ];
    for message in &appended {
        store.append_message(message).unwrap();
    }

    let transcript = store.dir().join(TRANSCRIPT_FILE);
    let raw = fs::read(&transcript).unwrap();

    for cut in 0..=raw.len() {
        fs::write(&transcript, &raw[..cut]).unwrap();
        let mut fresh = store_in(dir.path());
        fresh.load().unwrap();
        let loaded = fresh.messages().unwrap();
        assert!(
            loaded.len() <= appended.len(),
            "cut at {cut}: more messages than were appended"
        );
        assert_eq!(
            loaded,
            &appended[..loaded.len()],
            "cut at {cut}: not a prefix"
        );
    }
}

#[test]
fn mid_transcript_corruption_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(dir.path());
    store.initialize(None).unwrap();
    store.append_message(&Message::user("one")).unwrap();
    store.append_message(&Message::user("two")).unwrap();

    let transcript = store.dir().join(TRANSCRIPT_FILE);
    let raw = fs::read_to_string(&transcript).unwrap();
    let mangled = raw.replacen("{\"role\"", "{\"rol?", 1);
    fs::write(&transcript, mangled).unwrap();

    let mut fresh = store_in(dir.path());
    let err = fresh.load().unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[test]
fn metadata_and_transcript_survive_restart_intact() {
    let dir = tempfile::tempdir().unwrap();

    let (messages_before, metadata_before) = {
        let mut store = store_in(dir.path());
        store.initialize(Some("m1".to_string())).unwrap();
        store.append_message(&Message::user("Hi")).unwrap();
        store
            .append_message(&Message::assistant(vec![ContentBlock::text("Hello")]))
            .unwrap();
        (
            store.messages().unwrap().to_vec(),
            store.metadata().unwrap().clone(),
        )
    };

    let mut fresh = store_in(dir.path());
    fresh.load().unwrap();
    assert_eq!(fresh.messages().unwrap(), messages_before.as_slice());
    assert_eq!(fresh.metadata().unwrap(), &metadata_before);
}
