use std::fs;
use std::path::{Path, PathBuf};

use counter::Counter;
use log::info;

use crate::datastore::Datastore;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{sorted_entries, TextMap};
use crate::pipeline::{require_extension, select_corpus, CorpusSource, Stage, StageRun};

pub const WORD_COUNT_FILE: &str = "word_count.csv";
pub const DOCUMENT_WORD_COUNT_FILE: &str = "documentWordCount.csv";

#[derive(Debug, Clone, Default)]
pub struct WordCountTables {
    /// Token -> frequency across the whole corpus.
    pub corpus: Counter<String>,
    /// Document id -> token count, in natural id order.
    pub per_document: Vec<(String, usize)>,
}

impl WordCountTables {
    pub fn compute(texts: &TextMap) -> Self {
        let mut corpus: Counter<String> = Counter::new();
        let mut per_document = Vec::with_capacity(texts.len());

        for (id, text) in sorted_entries(texts) {
            let mut tokens = 0;
            for token in text.split_whitespace() {
                corpus[&token.to_owned()] += 1;
                tokens += 1;
            }
            per_document.push((id.clone(), tokens));
        }

        WordCountTables { corpus, per_document }
    }

    /// Corpus rows by count descending, ties by word.
    pub fn ranked_words(&self) -> Vec<(String, usize)> {
        self.corpus.most_common_ordered()
    }

    pub fn total_tokens(&self) -> usize {
        self.per_document.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsReport {
    pub source: CorpusSource,
    pub documents: usize,
    pub distinct_words: usize,
    pub total_tokens: usize,
    pub word_count_path: PathBuf,
    pub document_word_count_path: PathBuf,
}

fn write_rows<I>(path: &Path, header: [&str; 2], rows: I) -> PipelineResult<()>
where
    I: IntoIterator<Item = (String, usize)>,
{
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for (key, count) in rows {
        writer.write_record([key, count.to_string()]).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn write_word_counts(path: &Path, tables: &WordCountTables) -> PipelineResult<()> {
    write_rows(path, ["Word", "Count"], tables.ranked_words())
}

pub fn write_document_word_counts(path: &Path, tables: &WordCountTables) -> PipelineResult<()> {
    write_rows(path, ["Document", "Count"], tables.per_document.iter().cloned())
}

/// Statistics stage: both CSV files are rewritten in `output_dir` on every run.
pub fn run_statistics(store_path: &Path, output_dir: &Path, strict_load: bool) -> PipelineResult<StatisticsReport> {
    require_extension(store_path, "json", "datastore")?;
    let run = StageRun::start(Stage::Statistics, store_path);

    let store = Datastore::open(store_path, strict_load)?;
    let (source, texts) = select_corpus(&store);
    let tables = WordCountTables::compute(&texts);

    fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;
    let word_count_path = output_dir.join(WORD_COUNT_FILE);
    let document_word_count_path = output_dir.join(DOCUMENT_WORD_COUNT_FILE);
    write_word_counts(&word_count_path, &tables)?;
    write_document_word_counts(&document_word_count_path, &tables)?;

    info!("top words:");
    for (i, (word, count)) in tables.ranked_words().iter().take(10).enumerate() {
        info!("  {:<2}. {:<15} {}", i + 1, word, count);
    }

    let report = StatisticsReport {
        source,
        documents: tables.per_document.len(),
        distinct_words: tables.corpus.len(),
        total_tokens: tables.total_tokens(),
        word_count_path,
        document_word_count_path,
    };
    info!(
        "statistics written: {} documents, {} distinct words, {} tokens",
        report.documents, report.distinct_words, report.total_tokens
    );

    run.finish(store.state());
    Ok(report)
}
