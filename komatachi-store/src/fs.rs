//! Atomic filesystem primitives
//!
//! A stateless capability rooted at a base directory. Whole-file writes go
//! through a temp file in the target directory followed by a rename, the one
//! POSIX primitive that is atomic: after a crash the target holds either the
//! old contents or the new, never a mix. Appends tolerate exactly one partial
//! trailing line; anything worse is a different class of failure and must
//! surface.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Filesystem capability rooted at a base directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a relative one.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).exists()
    }

    /// Parse a whole JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T, StoreError> {
        let path = self.resolve(relative);
        let raw = fs::read_to_string(&path).map_err(|err| StoreError::from_io(path.clone(), err))?;
        serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
            path,
            detail: err.to_string(),
        })
    }

    /// Atomically replace a file with pretty-printed JSON plus a trailing
    /// newline. Parent directories are created as needed.
    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<(), StoreError> {
        let path = self.resolve(relative);
        let mut body = serde_json::to_string_pretty(value).map_err(|err| StoreError::Corrupt {
            path: path.clone(),
            detail: err.to_string(),
        })?;
        body.push('\n');
        self.write_atomic(&path, body.as_bytes())
    }

    /// Append one JSON-encoded entry plus `\n`. A crash mid-append may leave
    /// a partial trailing line, which the read side skips.
    pub fn append_jsonl<T: Serialize>(&self, relative: &str, entry: &T) -> Result<(), StoreError> {
        let path = self.resolve(relative);
        let mut line = serde_json::to_string(entry).map_err(|err| StoreError::Corrupt {
            path: path.clone(),
            detail: err.to_string(),
        })?;
        line.push('\n');

        create_parent(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| StoreError::from_io(path.clone(), err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| StoreError::from_io(path.clone(), err))?;
        file.flush()
            .map_err(|err| StoreError::from_io(path, err))?;
        Ok(())
    }

    /// Read every entry of a JSONL file.
    ///
    /// Empty lines are skipped. A parse failure on the last non-empty line is
    /// a crash artifact and is skipped silently; a failure on any earlier
    /// line is corruption and fails.
    pub fn read_all_jsonl<T: DeserializeOwned>(&self, relative: &str) -> Result<Vec<T>, StoreError> {
        let path = self.resolve(relative);
        let raw = fs::read_to_string(&path).map_err(|err| StoreError::from_io(path.clone(), err))?;

        let lines: Vec<&str> = raw.split('\n').filter(|line| !line.is_empty()).collect();
        let mut entries = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(_) if index + 1 == lines.len() => break,
                Err(err) => {
                    return Err(StoreError::Corrupt {
                        path,
                        detail: format!("line {}: {}", index + 1, err),
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Atomically rewrite a JSONL file. Empty input produces an empty file,
    /// not a missing one.
    pub fn write_jsonl<T: Serialize>(&self, relative: &str, entries: &[T]) -> Result<(), StoreError> {
        let path = self.resolve(relative);
        let mut body = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|err| StoreError::Corrupt {
                path: path.clone(),
                detail: err.to_string(),
            })?;
            body.push_str(&line);
            body.push('\n');
        }
        self.write_atomic(&path, body.as_bytes())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        create_parent(path)?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file");
        let tmp = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()?;
            drop(file);
            fs::rename(&tmp, path)
        })();

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                Err(StoreError::from_io(path.to_path_buf(), err))
            }
        }
    }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| StoreError::from_io(parent.to_path_buf(), err))?;
    }
    Ok(())
}
