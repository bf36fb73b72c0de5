//! Entry-array JSON documents on disk.

use crate::error::PersistenceResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Document tag for the FSM snapshot map.
pub const FSM_DOC: &str = "fsm-v1";
/// Document tag for the per-mode signal states.
pub const SIGNAL_DOC: &str = "signal-v1";
/// Document tag for the trade state.
pub const TRADE_DOC: &str = "trade-v1";

/// One JSON file per document tag under a base directory.
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `base_dir`, creating it if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create data directory");
        }
        Self { base_dir }
    }

    fn path_of(&self, doc: &str) -> PathBuf {
        self.base_dir.join(format!("{doc}.json"))
    }

    /// Write a map as an entry array. The write goes to a sibling temp
    /// file first so a crash mid-write cannot truncate the document.
    pub fn save_map<K, V>(&self, doc: &str, map: &HashMap<K, V>) -> PersistenceResult<()>
    where
        K: Serialize,
        V: Serialize,
    {
        let entries: Vec<(&K, &V)> = map.iter().collect();
        self.save_entries(doc, &entries)
    }

    /// Write any serializable entry list as a document.
    pub fn save_entries<E: Serialize>(&self, doc: &str, entries: &[E]) -> PersistenceResult<()> {
        let path = self.path_of(doc);
        let tmp = self.base_dir.join(format!("{doc}.json.tmp"));

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, entries)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, &path)?;

        debug!(doc = %doc, entries = entries.len(), "Persisted document");
        Ok(())
    }

    /// Load a map document. Best-effort: a missing or malformed file
    /// yields an empty map.
    pub fn load_map<K, V>(&self, doc: &str) -> HashMap<K, V>
    where
        K: DeserializeOwned + Eq + Hash,
        V: DeserializeOwned,
    {
        let path = self.path_of(doc);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return HashMap::new(),
        };

        match serde_json::from_reader::<_, Vec<(K, V)>>(BufReader::new(file)) {
            Ok(entries) => entries.into_iter().collect(),
            Err(e) => {
                warn!(doc = %doc, ?e, "Malformed document, starting empty");
                HashMap::new()
            }
        }
    }

    /// Load a single-value document (used for the trade state).
    pub fn load_value<V: DeserializeOwned>(&self, doc: &str) -> Option<V> {
        let path = self.path_of(doc);
        let file = File::open(&path).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(doc = %doc, ?e, "Malformed document, starting empty");
                None
            }
        }
    }

    /// Write a single-value document.
    pub fn save_value<V: Serialize>(&self, doc: &str, value: &V) -> PersistenceResult<()> {
        let path = self.path_of(doc);
        let tmp = self.base_dir.join(format!("{doc}.json.tmp"));

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, &path)?;

        debug!(doc = %doc, "Persisted document");
        Ok(())
    }
}
