use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, error, info};

use crate::config::PipelineConfig;
use crate::datastore::Datastore;
use crate::error::PipelineResult;
use crate::models::Document;
use crate::pipeline::{require_extension, Stage, StageRun};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub skipped_blank: usize,
    /// Set when the read stopped early; documents read before the failure are kept.
    pub truncated: bool,
}

/// Reads one document per non-blank line, numbering from `start_index`.
///
/// Blank lines do not consume an id. A read failure is logged and whatever
/// was read up to that point is returned.
pub fn read_documents(path: &Path, start_index: usize) -> (Vec<Document>, IngestReport) {
    let mut documents = Vec::new();
    let mut report = IngestReport::default();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("file load failed for {}: {}", path.display(), e);
            report.truncated = true;
            return (documents, report);
        }
    };

    info!("loading documents from {}", path.display());
    let mut counter = start_index;
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("file load failed for {} after {} documents: {}", path.display(), documents.len(), e);
                report.truncated = true;
                break;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            report.skipped_blank += 1;
            continue;
        }
        documents.push(Document::new(counter, text));
        counter += 1;
    }

    report.accepted = documents.len();
    info!("load complete, documents loaded: {}", report.accepted);
    for doc in &documents {
        debug!("{} has {} words", doc.id, doc.text.split_whitespace().count());
    }
    (documents, report)
}

/// Ingestion stage: text file in, document partition of `store_path` upserted.
pub fn run_ingest(
    input: &Path,
    store_path: &Path,
    config: &PipelineConfig,
    append: bool,
) -> PipelineResult<IngestReport> {
    require_extension(input, "txt", "input file")?;
    require_extension(store_path, "json", "datastore")?;
    let run = StageRun::start(Stage::Ingest, store_path);

    let mut store = if store_path.exists() {
        Datastore::open(store_path, config.strict_load)?
    } else {
        Datastore::new()
    };

    let start_index = if append { store.next_document_index() } else { 0 };
    let (documents, report) = read_documents(input, start_index);
    store.merge_documents(documents.into_iter().map(|doc| (doc.id, doc.text)));
    store.save(store_path)?;

    run.finish(store.state());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn blank_lines_do_not_consume_ids() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        fs::write(&input, "Cats chase mice.\n\n   \nDogs chase cats.\n").unwrap();

        let (docs, report) = read_documents(&input, 0);

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["doc0", "doc1"]);
        assert_eq!(docs[1].text, "Dogs chase cats.");
        assert_eq!(report, IngestReport { accepted: 2, skipped_blank: 2, truncated: false });
    }

    #[test]
    fn lines_are_trimmed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        fs::write(&input, "  padded line \t\r\n").unwrap();

        let (docs, _) = read_documents(&input, 0);
        assert_eq!(docs[0].text, "padded line");
    }

    #[test]
    fn missing_input_yields_no_documents() {
        let dir = tempdir().unwrap();
        let (docs, report) = read_documents(&dir.path().join("nope.txt"), 0);
        assert!(docs.is_empty());
        assert!(report.truncated);
    }

    #[test]
    fn invalid_utf8_keeps_documents_read_before_it() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        fs::write(&input, b"first\nsecond\n\xff\xfe broken\nnever read\n").unwrap();

        let (docs, report) = read_documents(&input, 0);
        assert_eq!(docs.len(), 2);
        assert!(report.truncated);
    }

    #[test]
    fn numbering_can_start_mid_sequence() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        fs::write(&input, "a\nb\n").unwrap();

        let (docs, _) = read_documents(&input, 5);
        assert_eq!(docs[0].id, "doc5");
        assert_eq!(docs[1].id, "doc6");
    }

    #[test]
    fn wrong_extensions_are_rejected_before_any_io() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store.json");
        let cfg = PipelineConfig::default();

        assert!(run_ingest(&dir.path().join("in.csv"), &store, &cfg, false).is_err());
        assert!(run_ingest(&dir.path().join("in.txt"), &dir.path().join("store.yaml"), &cfg, false).is_err());
        assert!(!store.exists());
    }
}
