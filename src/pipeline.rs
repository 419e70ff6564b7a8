//! Store-level pipeline state and the helpers shared by every stage run.
//!
//! `Empty -> (ingest) -> Ingested -> (lemmatize) -> Lemmatized`. Statistics
//! and topic modeling read from either of the last two states and prefer
//! lemma text when it exists. No transition deletes data.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;

use crate::datastore::Datastore;
use crate::error::{PipelineError, PipelineResult};
use crate::models::TextMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Empty,
    Ingested,
    Lemmatized,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Empty => "EMPTY",
            PipelineState::Ingested => "INGESTED",
            PipelineState::Lemmatized => "LEMMATIZED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusSource {
    Lemmas,
    Documents,
}

/// Texts the downstream stages work on: the lemma partition when it is
/// non-empty, the raw documents otherwise.
pub fn select_corpus(store: &Datastore) -> (CorpusSource, TextMap) {
    let lemmas = store.lemmas();
    if !lemmas.is_empty() {
        return (CorpusSource::Lemmas, lemmas);
    }
    info!("lemma partition is empty, falling back to raw documents");
    (CorpusSource::Documents, store.documents())
}

pub fn require_extension(path: &Path, extension: &str, role: &str) -> PipelineResult<()> {
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == extension);
    if matches {
        Ok(())
    } else {
        Err(PipelineError::Argument(format!(
            "the {} must have a .{} extension, got {}",
            role,
            extension,
            path.display()
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Lemmatize,
    Statistics,
    TopicModeling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Lemmatize => "lemmatize",
            Stage::Statistics => "statistics",
            Stage::TopicModeling => "topic-modeling",
        };
        f.write_str(name)
    }
}

/// Timing record for one stage invocation.
#[derive(Debug, Clone)]
pub struct StageRun {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
}

impl StageRun {
    pub fn start(stage: Stage, store_path: &Path) -> Self {
        let run = StageRun {
            stage,
            started_at: Utc::now(),
        };
        info!("stage={} status=start store={} at={}", stage, store_path.display(), run.started_at.to_rfc3339());
        run
    }

    pub fn finish(self, state: PipelineState) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        info!(
            "stage={} status=done state={} elapsed_ms={}",
            self.stage,
            state,
            elapsed.num_milliseconds()
        );
    }
}
