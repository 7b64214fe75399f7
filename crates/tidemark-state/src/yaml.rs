//! YAML-document implementation of [`WatermarkStore`].
//!
//! Layout:
//!
//! ```yaml
//! LastFetchedTimestamp:
//!   Bucket:
//!     SUI_Bottle_Created: "2024-05-31T16:08:37.123Z"
//!   Navi:
//!     Navi_Deposit: "2024-05-31T16:09:00.000Z"
//! ```
//!
//! Every mutation reads the whole document, changes one key and writes the
//! whole document back through a temp file and rename. Other top-level keys
//! are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tidemark_types::stream::StreamKey;
use tidemark_types::watermark::Watermark;

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "LastFetchedTimestamp", default)]
    last_fetched: BTreeMap<String, BTreeMap<String, Option<String>>>,
    #[serde(flatten)]
    other: BTreeMap<String, serde_yaml::Value>,
}

/// Watermarks kept in a single YAML document on disk.
pub struct YamlWatermarkStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl YamlWatermarkStore {
    /// Store backed by the document at `path`. The file is created on the
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn load(&self) -> error::Result<Document> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Document::default());
        }
        match serde_yaml::from_str::<Option<Document>>(&content) {
            Ok(doc) => Ok(doc.unwrap_or_default()),
            Err(e) => Err(StateError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Load for a write. A corrupt document is moved aside so the write can
    /// start a fresh one instead of failing forever.
    fn load_for_update(&self) -> error::Result<Document> {
        match self.load() {
            Err(StateError::Corrupt { path, message }) => {
                let backup = sibling(&path, ".corrupt");
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %message,
                    "Watermark document is corrupt, starting a fresh one"
                );
                fs::rename(&path, &backup)?;
                Ok(Document::default())
            }
            other => other,
        }
    }

    fn save(&self, doc: &Document) -> error::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let rendered = serde_yaml::to_string(doc)?;
        let tmp = sibling(&self.path, ".tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(rendered.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl WatermarkStore for YamlWatermarkStore {
    fn get(&self, stream: &StreamKey) -> error::Result<Option<Watermark>> {
        let doc = self.load()?;
        let raw = doc
            .last_fetched
            .get(stream.protocol())
            .and_then(|streams| streams.get(stream.name()))
            .and_then(Option::as_deref);
        match raw {
            Some(raw) => Ok(Some(Watermark::parse_iso(raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, stream: &StreamKey, watermark: Watermark) -> error::Result<()> {
        let _guard = self.lock()?;
        let mut doc = self.load_for_update()?;
        doc.last_fetched
            .entry(stream.protocol().to_string())
            .or_default()
            .insert(stream.name().to_string(), Some(watermark.to_iso()));
        self.save(&doc)
    }

    fn list(&self) -> error::Result<Vec<(StreamKey, Watermark)>> {
        let doc = self.load()?;
        let mut out = Vec::new();
        for (protocol, streams) in &doc.last_fetched {
            for (name, raw) in streams {
                if let Some(raw) = raw {
                    out.push((StreamKey::new(protocol, name), Watermark::parse_iso(raw)?));
                }
            }
        }
        Ok(out)
    }

    fn clear(&self, stream: &StreamKey) -> error::Result<bool> {
        let _guard = self.lock()?;
        let mut doc = self.load_for_update()?;
        let removed = doc
            .last_fetched
            .get_mut(stream.protocol())
            .and_then(|streams| streams.remove(stream.name()))
            .is_some();
        if removed {
            self.save(&doc)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(protocol: &str, name: &str) -> StreamKey {
        StreamKey::new(protocol, name)
    }

    fn store() -> (tempfile::TempDir, YamlWatermarkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlWatermarkStore::new(dir.path().join("state").join("watermarks.yaml"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_as_absent() {
        let (_dir, store) = store();
        assert!(store.get(&key("Bucket", "SUI_Bottle_Created")).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let (_dir, store) = store();
        let k = key("Bucket", "SUI_Bottle_Created");
        store.set(&k, Watermark::from_millis(1_717_171_717_123)).unwrap();
        assert_eq!(
            store.get(&k).unwrap(),
            Some(Watermark::from_millis(1_717_171_717_123))
        );

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("LastFetchedTimestamp"));
        assert!(content.contains("2024-05-31T16:08:37.123Z"));
    }

    #[test]
    fn writes_preserve_other_streams_and_keys() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "Operator: alice\nLastFetchedTimestamp:\n  Bucket:\n    SUI_Bottle_Created: '2024-01-01T00:00:00.000Z'\n",
        )
        .unwrap();

        store
            .set(&key("Navi", "Navi_Deposit"), Watermark::from_millis(5))
            .unwrap();
        store
            .set(&key("Bucket", "BTC_Bottle_Created"), Watermark::from_millis(6))
            .unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(
            store.get(&key("Bucket", "SUI_Bottle_Created")).unwrap(),
            Some(Watermark::parse_iso("2024-01-01T00:00:00.000Z").unwrap())
        );
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("Operator: alice"), "got: {content}");
    }

    #[test]
    fn corrupt_document_fails_reads_and_is_replaced_on_write() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "LastFetchedTimestamp: [unterminated").unwrap();

        let k = key("Bucket", "Total_Fee_Value_From");
        assert!(matches!(store.get(&k), Err(StateError::Corrupt { .. })));

        store.set(&k, Watermark::from_millis(42)).unwrap();
        assert_eq!(store.get(&k).unwrap(), Some(Watermark::from_millis(42)));
        assert!(sibling(store.path(), ".corrupt").exists());
    }

    #[test]
    fn null_entries_read_as_absent() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "LastFetchedTimestamp:\n  Bucket:\n    SUI_Liquidation: ~\n",
        )
        .unwrap();
        assert!(store.get(&key("Bucket", "SUI_Liquidation")).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_only_one_stream() {
        let (_dir, store) = store();
        let a = key("Mole", "Mole_Saving_Deposit");
        let b = key("Mole", "Mole_Saving_Withdraw");
        store.set(&a, Watermark::from_millis(1)).unwrap();
        store.set(&b, Watermark::from_millis(2)).unwrap();

        assert!(store.clear(&a).unwrap());
        assert!(!store.clear(&a).unwrap());
        assert!(store.get(&a).unwrap().is_none());
        assert_eq!(store.get(&b).unwrap(), Some(Watermark::from_millis(2)));
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .set(&key("Bucket", &format!("T{i}_Bottle_Created")), Watermark::from_millis(i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.list().unwrap().len(), 8);
    }
}
