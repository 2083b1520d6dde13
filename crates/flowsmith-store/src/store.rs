use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use tracing::debug;

use flowsmith_utils::atomic_write::{create_file_atomic, write_file_atomic};

use crate::error::StoreError;

/// A persistable record type
pub trait Record: Serialize + DeserializeOwned {
    /// Directory name under the store root
    const COLLECTION: &'static str;

    /// File stem the record is stored under
    fn key(&self) -> String;
}

/// One JSON file per record under `<root>/<collection>/`
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: Utf8PathBuf,
}

impl RecordStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(crate) fn collection_dir<R: Record>(&self) -> Utf8PathBuf {
        self.root.join(R::COLLECTION)
    }

    pub(crate) fn record_path<R: Record>(&self, key: &str) -> Result<Utf8PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.collection_dir::<R>().join(format!("{key}.json")))
    }

    /// Write a record, replacing any previous version
    pub fn save<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let path = self.record_path::<R>(&record.key())?;
        let json = encode(record, &path)?;
        write_file_atomic(&path, &json).map_err(|e| StoreError::Write {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!(collection = R::COLLECTION, key = %record.key(), "Saved record");
        Ok(())
    }

    /// Write a record only if no record with the same key exists.
    ///
    /// Returns `false` when the key was already taken.
    pub fn insert_new<R: Record>(&self, record: &R) -> Result<bool, StoreError> {
        let path = self.record_path::<R>(&record.key())?;
        let json = encode(record, &path)?;
        create_file_atomic(&path, &json).map_err(|e| StoreError::Write {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })
    }

    /// Load a record if it exists
    pub fn find<R: Record>(&self, key: &str) -> Result<Option<R>, StoreError> {
        let path = self.record_path::<R>(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => decode(&content, &path).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Load a record that must exist
    pub fn load<R: Record>(&self, key: &str) -> Result<R, StoreError> {
        self.find(key)?.ok_or_else(|| StoreError::NotFound {
            collection: R::COLLECTION.to_string(),
            id: key.to_string(),
        })
    }

    /// Every record in a collection, in file-name order
    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let dir = self.collection_dir::<R>();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: dir.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Read {
                path: dir.to_string(),
                reason: e.to_string(),
            })?;
            if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path())
                && path.extension() == Some("json")
            {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| {
                let content = fs::read_to_string(path).map_err(|e| StoreError::Read {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
                decode(&content, path)
            })
            .collect()
    }
}

fn encode<R: Record>(record: &R, path: &Utf8Path) -> Result<String, StoreError> {
    serde_json::to_string_pretty(record).map_err(|e| StoreError::Write {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn decode<R: Record>(content: &str, path: &Utf8Path) -> Result<R, StoreError> {
    serde_json::from_str(content).map_err(|e| StoreError::Corrupt {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Keys become file names; keep them to a portable character set
fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Record for Note {
        const COLLECTION: &'static str = "notes";
        fn key(&self) -> String {
            self.id.clone()
        }
    }

    fn store() -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, RecordStore::new(root))
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        store.save(&note("a", "first")).unwrap();
        store.save(&note("a", "second")).unwrap();
        let loaded: Note = store.load("a").unwrap();
        assert_eq!(loaded.body, "second");
        assert!(store.root().join("notes/a.json").exists());
    }

    #[test]
    fn test_missing_record() {
        let (_dir, store) = store();
        assert!(store.find::<Note>("nope").unwrap().is_none());
        let err = store.load::<Note>("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_insert_new_does_not_clobber() {
        let (_dir, store) = store();
        assert!(store.insert_new(&note("n", "winner")).unwrap());
        assert!(!store.insert_new(&note("n", "loser")).unwrap());
        assert_eq!(store.load::<Note>("n").unwrap().body, "winner");
    }

    #[test]
    fn test_list_empty_and_sorted() {
        let (_dir, store) = store();
        assert!(store.list::<Note>().unwrap().is_empty());
        store.save(&note("b", "2")).unwrap();
        store.save(&note("a", "1")).unwrap();
        let ids: Vec<String> = store.list::<Note>().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_corrupt_record() {
        let (_dir, store) = store();
        let path = store.root().join("notes");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("bad.json"), "{not json").unwrap();
        assert!(matches!(
            store.load::<Note>("bad").unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (_dir, store) = store();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(store.find::<Note>(key), Err(StoreError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }
    }
}
