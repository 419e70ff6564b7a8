use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid arguments: {0}")]
    Argument(String),

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed datastore {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("csv write failed for {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("annotation failed for {id}: {message}")]
    Annotation { id: String, message: String },

    #[error("topic engine failed: {0}")]
    Engine(String),

    #[error("flat corpus {} is missing or unreadable: {source}", .path.display())]
    FlatCorpus {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io { path: path.into(), source }
    }

    /// Errors that end the process with a non-zero status instead of being
    /// logged and tolerated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Argument(_) | PipelineError::FlatCorpus { .. })
    }
}
