//! Staged text-processing pipeline over a JSON document store.
//!
//! Each stage is an independent run that loads the store, changes one
//! partition and writes the whole file back:
//! ingest -> lemmatize -> statistics / topic modeling.

pub mod config;
pub mod datastore;
pub mod error;
pub mod ingest;
pub mod lda;
pub mod lemmatize;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod statistics;
pub mod stopwords;
pub mod topic_modeling;

pub use config::{FailurePolicy, PipelineConfig, TopicConfig};
pub use datastore::Datastore;
pub use error::{PipelineError, PipelineResult};
pub use ingest::{run_ingest, IngestReport};
pub use lda::{GibbsLda, LdaConfig};
pub use lemmatize::{clean, run_lemmatize, LemmatizeReport, Lemmatizer, RuleLemmatizer};
pub use pipeline::{select_corpus, CorpusSource, PipelineState};
pub use statistics::{run_statistics, StatisticsReport, WordCountTables};
pub use stopwords::StopwordSet;
pub use topic_modeling::{run_topic_modeling, InstanceList, Topic, TopicModel, TopicReport};
