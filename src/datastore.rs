//! JSON-backed document store shared by every stage.
//!
//! The file is a single object with two partitions:
//!
//! ```json
//! { "documents": { "doc0": "raw text" }, "lemmas": { "doc0": "lemma text" } }
//! ```
//!
//! The store has no locking. Stages are expected to run one at a time against
//! a given path; two concurrent runs race and the last save wins.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{document_index, TextMap};
use crate::pipeline::PipelineState;

/// On-disk shape. Partitions that are absent or `null` come back empty.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    documents: Option<TextMap>,
    #[serde(default)]
    lemmas: Option<TextMap>,
}

/// Owns both partitions. Stages read copies and hand back maps to merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datastore {
    documents: TextMap,
    lemmas: TextMap,
}

impl Datastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path`, falling back to an empty store when it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let store = match Self::read(path) {
            Ok(store) => {
                info!("datastore read from {}", path.display());
                store
            }
            Err(e) => {
                error!("datastore read failed, continuing with an empty store: {}", e);
                Self::new()
            }
        };
        store.log_sizes();
        store
    }

    /// Like [`Datastore::load`] but returns the failure instead of an empty store.
    pub fn try_load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let store = Self::read(path)?;
        info!("datastore read from {}", path.display());
        store.log_sizes();
        Ok(store)
    }

    /// Picks [`Datastore::try_load`] when `strict`, [`Datastore::load`] otherwise.
    pub fn open(path: impl AsRef<Path>, strict: bool) -> PipelineResult<Self> {
        if strict {
            Self::try_load(path)
        } else {
            Ok(Self::load(path))
        }
    }

    fn read(path: &Path) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let file: StoreFile = serde_json::from_str(&raw).map_err(|source| PipelineError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Datastore {
            documents: file.documents.unwrap_or_default(),
            lemmas: file.lemmas.unwrap_or_default(),
        })
    }

    fn log_sizes(&self) {
        info!(
            "original documents loaded: {} - lemmatised documents loaded: {}",
            self.documents.len(),
            self.lemmas.len()
        );
    }

    /// Overwrites `path` with the full root object.
    pub fn save(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        let file = StoreFile {
            documents: Some(self.documents.clone()),
            lemmas: Some(self.lemmas.clone()),
        };

        let handle = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = BufWriter::new(handle);
        // Past the buffer size, write failures surface here rather than at flush.
        serde_json::to_writer(&mut writer, &file).map_err(|e| PipelineError::io(path, e.into()))?;
        writer.flush().map_err(|e| PipelineError::io(path, e))?;

        info!(
            "datastore saved to {} (documents={}, lemmas={})",
            path.display(),
            self.documents.len(),
            self.lemmas.len()
        );
        Ok(())
    }

    pub fn merge_documents<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.documents.extend(entries);
    }

    pub fn merge_lemmas<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.lemmas.extend(entries);
    }

    pub fn documents(&self) -> TextMap {
        self.documents.clone()
    }

    pub fn lemmas(&self) -> TextMap {
        self.lemmas.clone()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    /// Index the next appended `docN` id should use.
    pub fn next_document_index(&self) -> usize {
        self.documents
            .keys()
            .filter_map(|id| document_index(id))
            .max()
            .map_or(0, |max| max + 1)
    }

    pub fn state(&self) -> PipelineState {
        if !self.lemmas.is_empty() {
            PipelineState::Lemmatized
        } else if !self.documents.is_empty() {
            PipelineState::Ingested
        } else {
            PipelineState::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn save_then_load_round_trips_both_partitions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = Datastore::new();
        store.merge_documents(entries(&[("doc0", "Cats chase mice."), ("doc1", "Dogs chase cats.")]));
        store.merge_lemmas(entries(&[("doc0", "cat chase mouse")]));

        store.save(&path).unwrap();
        let loaded = Datastore::load(&path);

        assert_eq!(loaded, store);
        assert_eq!(loaded.documents().len(), 2);
        assert_eq!(loaded.lemmas()["doc0"], "cat chase mouse");
    }

    #[test]
    fn saved_file_always_has_both_partitions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        Datastore::new().save(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({ "documents": {}, "lemmas": {} }));
    }

    #[test]
    fn absent_or_null_partitions_load_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"documents": {"doc0": "hi"}, "lemmas": null}"#).unwrap();

        let store = Datastore::load(&path);
        assert_eq!(store.document_count(), 1);
        assert_eq!(store.lemma_count(), 0);

        fs::write(&path, r#"{}"#).unwrap();
        assert_eq!(Datastore::load(&path), Datastore::new());
    }

    #[test]
    fn malformed_or_missing_file_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Datastore::load(&path), Datastore::new());
        assert_eq!(Datastore::load(dir.path().join("absent.json")), Datastore::new());
    }

    #[test]
    fn strict_load_reports_parse_and_io_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(Datastore::try_load(&path), Err(PipelineError::Parse { .. })));
        assert!(matches!(Datastore::open(dir.path().join("absent.json"), true), Err(PipelineError::Io { .. })));
        assert!(Datastore::open(&path, false).is_ok());
    }

    #[test]
    fn merges_upsert_without_touching_the_other_partition() {
        let mut store = Datastore::new();
        store.merge_documents(entries(&[("doc0", "old"), ("doc1", "keep")]));
        store.merge_lemmas(entries(&[("doc0", "lemma")]));

        store.merge_documents(entries(&[("doc0", "new")]));

        let docs = store.documents();
        assert_eq!(docs["doc0"], "new");
        assert_eq!(docs["doc1"], "keep");
        assert_eq!(store.lemmas()["doc0"], "lemma");
    }

    #[test]
    fn save_to_unwritable_path_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        assert!(matches!(Datastore::new().save(&path), Err(PipelineError::Io { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_disk_during_serialization_is_an_io_error() {
        let mut store = Datastore::new();
        store.merge_documents(entries(&[("doc0", &"word ".repeat(4_000))]));

        let err = store.save("/dev/full").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn state_follows_partition_contents() {
        let mut store = Datastore::new();
        assert_eq!(store.state(), PipelineState::Empty);
        store.merge_documents(entries(&[("doc0", "a")]));
        assert_eq!(store.state(), PipelineState::Ingested);
        store.merge_lemmas(entries(&[("doc0", "a")]));
        assert_eq!(store.state(), PipelineState::Lemmatized);
    }

    #[test]
    fn next_index_follows_highest_doc_id() {
        let mut store = Datastore::new();
        assert_eq!(store.next_document_index(), 0);
        store.merge_documents(entries(&[("doc0", "a"), ("doc9", "b"), ("extra", "c")]));
        assert_eq!(store.next_document_index(), 10);
    }
}
