use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{CATALOG_FILE, HISTORY_FILE, NOW_PLAYING_FILE, PLAYLIST_FILE, Result, Store, StoreError};
use crate::catalog::Catalog;
use crate::sequence::MergedSequence;

impl Store {
    pub fn load_catalog(&self) -> Result<Catalog> {
        let doc = self.read_object(CATALOG_FILE)?;
        doc.into_iter()
            .map(|(path, value)| {
                let bpm = self.bpm_value(CATALOG_FILE, &path, &value)?;
                Ok((path, bpm))
            })
            .collect()
    }

    /// Merge `catalog` into the stored catalog and write the whole document back.
    pub fn merge_save_catalog(&self, catalog: &Catalog) -> Result<()> {
        let delta: Map<String, Value> = catalog
            .iter()
            .map(|(path, bpm)| (path.clone(), Value::from(*bpm)))
            .collect();
        self.merge_object(CATALOG_FILE, delta)
    }

    /// Paths played in earlier sessions.
    pub fn load_history(&self) -> Result<HashSet<String>> {
        self.read_array(HISTORY_FILE)?
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(StoreError::Shape {
                    path: self.path_of(HISTORY_FILE),
                    message: format!("history entry is not a path: {}", other),
                }),
            })
            .collect()
    }

    /// Record one finished playback.
    pub fn append_history(&self, path: &str) -> Result<()> {
        let mut items = self.read_array(HISTORY_FILE)?;
        items.push(Value::from(path));
        self.write_document(HISTORY_FILE, &Value::Array(items))
    }

    /// The generated playlist, in play order.
    pub fn load_playlist(&self) -> Result<MergedSequence> {
        let doc = self.read_object(PLAYLIST_FILE)?;
        doc.into_iter()
            .map(|(path, value)| {
                let bpm = self.bpm_value(PLAYLIST_FILE, &path, &value)?;
                Ok((path, bpm))
            })
            .collect::<Result<Vec<_>>>()
            .map(|entries| entries.into_iter().collect())
    }

    pub fn merge_save_playlist(&self, playlist: &MergedSequence) -> Result<()> {
        let delta: Map<String, Value> = playlist
            .entries()
            .iter()
            .map(|(path, bpm)| (path.clone(), Value::from(*bpm)))
            .collect();
        self.merge_object(PLAYLIST_FILE, delta)
    }

    pub fn clear_playlist(&self) -> Result<()> {
        self.remove_document(PLAYLIST_FILE)
    }

    /// Point at the track being played and how far into it playback is.
    pub fn save_now_playing(&self, path: &str, position_secs: f64) -> Result<()> {
        let mut doc = Map::new();
        doc.insert(path.to_string(), Value::from(position_secs));
        self.write_document(NOW_PLAYING_FILE, &Value::Object(doc))
    }

    pub fn load_now_playing(&self) -> Result<Option<(String, f64)>> {
        if self.read_document(NOW_PLAYING_FILE)?.is_none() {
            return Ok(None);
        }
        let doc = self.read_object(NOW_PLAYING_FILE)?;
        if doc.len() != 1 {
            return Err(StoreError::Shape {
                path: self.path_of(NOW_PLAYING_FILE),
                message: format!("expected exactly one entry, found {}", doc.len()),
            });
        }
        let Some((path, value)) = doc.into_iter().next() else {
            return Ok(None);
        };
        let position = value.as_f64().ok_or_else(|| StoreError::Shape {
            path: self.path_of(NOW_PLAYING_FILE),
            message: format!("position for {} is not a number", path),
        })?;
        Ok(Some((path, position)))
    }

    fn bpm_value(&self, name: &str, key: &str, value: &Value) -> Result<u32> {
        value
            .as_f64()
            .filter(|b| b.is_finite() && *b >= 0.0 && *b <= u32::MAX as f64)
            .map(|b| b.round() as u32)
            .ok_or_else(|| StoreError::Shape {
                path: self.path_of(name),
                message: format!("BPM for {} is not a number: {}", key, value),
            })
    }
}
