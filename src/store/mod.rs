pub mod documents;

use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CATALOG_FILE: &str = "catalog.json";
pub const HISTORY_FILE: &str = "history.json";
pub const PLAYLIST_FILE: &str = "playlist.json";
pub const NOW_PLAYING_FILE: &str = "now_playing.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unexpected document shape in {path}: {message}")]
    Shape { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Whole-document JSON stores under one directory.
///
/// Every write replaces the full document through a temp file and a rename,
/// so a reader never sees a half-written file. Nothing coordinates writers
/// across processes: the last one wins.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Parsed document, or `None` when the file does not exist.
    pub fn read_document(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_of(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// Object document; a missing file reads as an empty object.
    pub fn read_object(&self, name: &str) -> Result<Map<String, Value>> {
        match self.read_document(name)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => {
                let message = format!("expected object, found {}", kind(&other));
                Err(self.shape_error(name, message))
            }
        }
    }

    /// Array document; a missing file reads as an empty array.
    pub fn read_array(&self, name: &str) -> Result<Vec<Value>> {
        match self.read_document(name)? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => {
                let message = format!("expected array, found {}", kind(&other));
                Err(self.shape_error(name, message))
            }
        }
    }

    /// Replace the document wholesale.
    pub fn write_document(&self, name: &str, value: &Value) -> Result<()> {
        let path = self.path_of(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        let body = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(body.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        std::fs::rename(&tmp, &path).map_err(io_err)?;

        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Read the object document, apply `delta` on top, and write it back.
    /// Existing keys keep their position and take the new value.
    pub fn merge_object(&self, name: &str, delta: Map<String, Value>) -> Result<()> {
        let mut doc = self.read_object(name)?;
        for (key, value) in delta {
            doc.insert(key, value);
        }
        self.write_document(name, &Value::Object(doc))
    }

    pub fn remove_document(&self, name: &str) -> Result<()> {
        let path = self.path_of(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn shape_error(&self, name: &str, message: String) -> StoreError {
        StoreError::Shape {
            path: self.path_of(name),
            message,
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_documents_read_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.read_document("nope.json").unwrap().is_none());
        assert!(store.read_object("nope.json").unwrap().is_empty());
        assert!(store.read_array("nope.json").unwrap().is_empty());
    }

    #[test]
    fn test_merge_keeps_order_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .write_document("doc.json", &json!({"b": 1, "a": 2}))
            .unwrap();

        let mut delta = Map::new();
        delta.insert("c".into(), json!(3));
        delta.insert("b".into(), json!(10));
        store.merge_object("doc.json", delta).unwrap();

        let doc = store.read_object("doc.json").unwrap();
        let keys: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(doc["b"], json!(10));
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }

    #[test]
    fn test_wrong_shape_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.write_document("list.json", &json!([1, 2])).unwrap();
        assert!(matches!(
            store.read_object("list.json"),
            Err(StoreError::Shape { .. })
        ));

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            store.read_object("broken.json"),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn test_remove_document_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.write_document("x.json", &json!({})).unwrap();
        store.remove_document("x.json").unwrap();
        store.remove_document("x.json").unwrap();
        assert!(!dir.path().join("x.json").exists());
    }
}
