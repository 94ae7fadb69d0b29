//! Conversation store
//!
//! The loaded in-memory mirror of the transcript and its metadata, and the
//! sole writer to the conversation directory. The transcript is the source
//! of truth; `metadata.json` is advisory and may lag by one write after a
//! crash.

use crate::error::StoreError;
use crate::fs::Storage;
use komatachi_core::{ConversationMetadata, Message, MetadataPatch};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const METADATA_FILE: &str = "metadata.json";
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct Loaded {
    metadata: ConversationMetadata,
    messages: Vec<Message>,
}

/// Canonical in-memory transcript plus metadata, backed by one directory.
///
/// Exactly one store per conversation directory per process; no locking.
pub struct ConversationStore {
    storage: Storage,
    state: Option<Loaded>,
}

impl ConversationStore {
    /// A store over `<data_dir>/<conversation_dir>/`. Nothing is read until
    /// `load` or `initialize`.
    pub fn new(data_dir: impl Into<PathBuf>, conversation_dir: &str) -> Self {
        Self {
            storage: Storage::new(data_dir.into().join(conversation_dir)),
            state: None,
        }
    }

    /// Directory this store writes to.
    pub fn dir(&self) -> &Path {
        self.storage.root()
    }

    /// Create fresh metadata and an empty transcript.
    ///
    /// Fails with `AlreadyExists` when metadata is already present, so an
    /// existing conversation can never be silently overwritten. Leaves the
    /// store loaded.
    pub fn initialize(&mut self, model: Option<String>) -> Result<(), StoreError> {
        if self.storage.exists(METADATA_FILE) {
            return Err(StoreError::AlreadyExists {
                path: self.storage.resolve(METADATA_FILE),
            });
        }

        let now = now_ms();
        let metadata = ConversationMetadata {
            created_at: now,
            updated_at: now,
            compaction_count: 0,
            model,
        };
        self.storage.write_json(METADATA_FILE, &metadata)?;
        self.storage.write_jsonl::<Message>(TRANSCRIPT_FILE, &[])?;

        self.state = Some(Loaded {
            metadata,
            messages: Vec::new(),
        });
        Ok(())
    }

    /// Read both files into memory. Subsequent reads serve from memory.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let metadata: ConversationMetadata = self.storage.read_json(METADATA_FILE)?;
        let messages: Vec<Message> = self.storage.read_all_jsonl(TRANSCRIPT_FILE)?;
        self.state = Some(Loaded { metadata, messages });
        Ok(())
    }

    /// Append one message: disk first, then the mirror, then the advisory
    /// metadata timestamp.
    ///
    /// A failed append changes nothing. A failed metadata write leaves the
    /// message durable on disk and in memory.
    pub fn append_message(&mut self, message: &Message) -> Result<(), StoreError> {
        let state = self.state.as_mut().ok_or(StoreError::NotLoaded)?;

        self.storage.append_jsonl(TRANSCRIPT_FILE, message)?;
        state.messages.push(message.clone());
        state.metadata.updated_at = state.metadata.updated_at.max(now_ms());
        self.storage.write_json(METADATA_FILE, &state.metadata)?;
        Ok(())
    }

    /// Atomically rewrite the whole transcript. Compaction's tool.
    ///
    /// The caller's slice is copied, never retained.
    pub fn replace_transcript(&mut self, messages: &[Message]) -> Result<(), StoreError> {
        let state = self.state.as_mut().ok_or(StoreError::NotLoaded)?;

        self.storage.write_jsonl(TRANSCRIPT_FILE, messages)?;
        state.messages = messages.to_vec();
        state.metadata.updated_at = state.metadata.updated_at.max(now_ms());
        self.storage.write_json(METADATA_FILE, &state.metadata)?;
        Ok(())
    }

    /// Merge `compaction_count` / `model` into the metadata. `created_at`
    /// is immutable; `updated_at` advances.
    pub fn update_metadata(&mut self, patch: MetadataPatch) -> Result<(), StoreError> {
        let state = self.state.as_mut().ok_or(StoreError::NotLoaded)?;

        if let Some(count) = patch.compaction_count {
            state.metadata.compaction_count = count;
        }
        if let Some(model) = patch.model {
            state.metadata.model = Some(model);
        }
        state.metadata.updated_at = state.metadata.updated_at.max(now_ms());
        self.storage.write_json(METADATA_FILE, &state.metadata)?;
        Ok(())
    }

    /// In-memory transcript. `NotLoaded` before `load`/`initialize`.
    pub fn messages(&self) -> Result<&[Message], StoreError> {
        self.state
            .as_ref()
            .map(|state| state.messages.as_slice())
            .ok_or(StoreError::NotLoaded)
    }

    /// In-memory metadata. `NotLoaded` before `load`/`initialize`.
    pub fn metadata(&self) -> Result<&ConversationMetadata, StoreError> {
        self.state
            .as_ref()
            .map(|state| &state.metadata)
            .ok_or(StoreError::NotLoaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use komatachi_core::ContentBlock;

    fn store_in(dir: &Path) -> ConversationStore {
        ConversationStore::new(dir, "conversation")
    }

    #[test]
    fn test_access_before_load_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(store.messages(), Err(StoreError::NotLoaded)));
        assert!(matches!(store.metadata(), Err(StoreError::NotLoaded)));
    }

    #[test]
    fn test_initialize_writes_metadata_and_empty_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(Some("m1".to_string())).unwrap();

        let metadata = store.metadata().unwrap();
        assert_eq!(metadata.compaction_count, 0);
        assert_eq!(metadata.model.as_deref(), Some("m1"));
        assert_eq!(metadata.created_at, metadata.updated_at);
        assert!(store.messages().unwrap().is_empty());
        assert!(store.dir().join(TRANSCRIPT_FILE).exists());
    }

    #[test]
    fn test_initialize_twice_is_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(None).unwrap();

        let mut second = store_in(dir.path());
        let err = second.initialize(None).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[test]
    fn test_append_then_fresh_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(None).unwrap();

        store.append_message(&Message::user("Hi")).unwrap();
        store
            .append_message(&Message::assistant(vec![ContentBlock::text("Hello")]))
            .unwrap();

        let mut fresh = store_in(dir.path());
        fresh.load().unwrap();
        assert_eq!(fresh.messages().unwrap(), store.messages().unwrap());
        assert_eq!(fresh.metadata().unwrap(), store.metadata().unwrap());
    }

    #[test]
    fn test_replace_transcript_copies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(None).unwrap();
        store.append_message(&Message::user("one")).unwrap();
        store.append_message(&Message::user("two")).unwrap();

        let mut replacement = vec![Message::user("summary")];
        store.replace_transcript(&replacement).unwrap();

        // Mutating the caller's vector must not affect the store.
        replacement.push(Message::user("mutated after the fact"));
        assert_eq!(store.messages().unwrap().len(), 1);
        assert_eq!(store.messages().unwrap()[0].as_text(), Some("summary"));

        let mut fresh = store_in(dir.path());
        fresh.load().unwrap();
        assert_eq!(fresh.messages().unwrap(), store.messages().unwrap());
    }

    #[test]
    fn test_update_metadata_merges_without_touching_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(Some("m1".to_string())).unwrap();
        let created = store.metadata().unwrap().created_at;

        store
            .update_metadata(MetadataPatch {
                compaction_count: Some(2),
                model: None,
            })
            .unwrap();
        let metadata = store.metadata().unwrap();
        assert_eq!(metadata.created_at, created);
        assert_eq!(metadata.compaction_count, 2);
        assert_eq!(metadata.model.as_deref(), Some("m1"));

        store
            .update_metadata(MetadataPatch {
                compaction_count: None,
                model: Some("m2".to_string()),
            })
            .unwrap();
        let metadata = store.metadata().unwrap();
        assert_eq!(metadata.compaction_count, 2);
        assert_eq!(metadata.model.as_deref(), Some("m2"));
    }

    #[test]
    fn test_updated_at_is_non_decreasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.initialize(None).unwrap();

        let mut previous = store.metadata().unwrap().updated_at;
        for i in 0..5 {
            store.append_message(&Message::user(format!("m{i}"))).unwrap();
            let current = store.metadata().unwrap().updated_at;
            assert!(current >= previous);
            previous = current;
        }
    }
}
