//! Topic-modeling stage.
//!
//! Texts are stopword-filtered, written to a flat corpus file
//! (`id<TAB>language<TAB>text`), read back, turned into feature sequences
//! and handed to a [`TopicModel`]. The top words of every topic are exported
//! as a `Topic,TopWords` CSV.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::datastore::Datastore;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{sorted_entries, TextMap};
use crate::pipeline::{require_extension, select_corpus, Stage, StageRun};
use crate::stopwords::StopwordSet;

/// Letter-bounded tokens of three or more characters; inner punctuation is kept.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}[\p{L}\p{P}]+\p{L}").expect("token pattern"));
/// name, label, data
static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S*)[\s,]*(\S*)[\s,]*(.*)$").expect("line pattern"));

/// Fits topics over a feature corpus. Backends are interchangeable.
pub trait TopicModel {
    fn fit(&self, corpus: &InstanceList, num_topics: usize, num_iterations: usize) -> PipelineResult<TopicReport>;
}

#[derive(Debug, Clone)]
pub struct Topic {
    pub index: usize,
    pub words: Vec<(String, f64)>, // Word and its probability in this topic
    pub documents: Vec<String>,    // Names of documents whose dominant topic this is
}

impl Topic {
    pub fn top_words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|(word, _)| word.as_str())
    }

    pub fn label(&self) -> String {
        let top: Vec<&str> = self.top_words().take(3).collect();
        if top.is_empty() {
            "Topic".to_string()
        } else {
            top.join("-")
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicReport {
    pub topics: Vec<Topic>,
}

impl TopicReport {
    pub fn write_csv(&self, path: &Path) -> PipelineResult<()> {
        let csv_err = |source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(["Topic", "TopWords"]).map_err(csv_err)?;
        for topic in &self.topics {
            let words: Vec<&str> = topic.top_words().collect();
            writer
                .write_record([format!("Topic {}", topic.index), words.join(" ")])
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        Ok(())
    }
}

/// Growable token -> feature index mapping.
#[derive(Debug, Clone, Default)]
pub struct Alphabet {
    index: HashMap<String, usize>,
    entries: Vec<String>,
}

impl Alphabet {
    pub fn lookup_or_add(&mut self, token: &str) -> usize {
        if let Some(&id) = self.index.get(token) {
            return id;
        }
        let id = self.entries.len();
        self.entries.push(token.to_string());
        self.index.insert(token.to_string(), id);
        id
    }

    pub fn lookup_index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn lookup_entry(&self, id: usize) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One parsed line of the flat corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub name: String,
    pub label: String,
    pub data: String,
}

impl FlatRecord {
    pub fn parse(line: &str) -> Option<Self> {
        let caps = LINE_PATTERN.captures(line)?;
        Some(FlatRecord {
            name: caps[1].to_string(),
            label: caps[2].to_string(),
            data: caps[3].to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub label: String,
    pub features: Vec<usize>,
}

/// Feature corpus handed to a [`TopicModel`].
#[derive(Debug, Clone, Default)]
pub struct InstanceList {
    pub alphabet: Alphabet,
    pub instances: Vec<Instance>,
}

pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_PATTERN.find_iter(text).map(|m| m.as_str())
}

impl InstanceList {
    /// Runs tokenization then token-to-feature mapping over every record.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FlatRecord>,
    {
        let mut list = InstanceList::default();
        for record in records {
            let features = tokenize(&record.data)
                .map(|token| list.alphabet.lookup_or_add(token))
                .collect();
            list.instances.push(Instance {
                name: record.name,
                label: record.label,
                features,
            });
        }
        list
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

pub fn filter_texts(texts: &TextMap, stopwords: &StopwordSet) -> TextMap {
    texts
        .iter()
        .map(|(id, text)| (id.clone(), stopwords.filter_text(text)))
        .collect()
}

/// Write failures surface as [`PipelineError::FlatCorpus`]: without the file the stage cannot go on.
pub fn write_flat_corpus(path: &Path, texts: &TextMap, language_tag: &str) -> PipelineResult<()> {
    let io_err = |source| PipelineError::FlatCorpus {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for (id, text) in sorted_entries(texts) {
        let flat = text.replace(['\r', '\n'], " ");
        writeln!(writer, "{}\t{}\t{}", id, language_tag, flat).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    info!("{} documents written to {}", texts.len(), path.display());
    Ok(())
}

/// Reads the flat corpus back. A missing or unreadable file is fatal for the stage.
pub fn read_flat_corpus(path: &Path) -> PipelineResult<Vec<FlatRecord>> {
    let contents = fs::read_to_string(path).map_err(|source| PipelineError::FlatCorpus {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("first lines of {}:", path.display());
    for line in contents.lines().take(5) {
        debug!("  {}", line);
    }

    let records: Vec<FlatRecord> = contents.lines().filter_map(FlatRecord::parse).collect();
    info!("instances loaded from flat corpus: {}", records.len());
    Ok(records)
}

/// Appends `.csv` unless the name already ends with it.
pub fn report_path(name: &str) -> PathBuf {
    let name = name.trim();
    if name.ends_with(".csv") {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{name}.csv"))
    }
}

/// Topic-modeling stage. Returns `Ok(None)` when the engine fails: the failure
/// is logged and no report is written.
pub fn run_topic_modeling(
    store_path: &Path,
    stopwords: &StopwordSet,
    config: &PipelineConfig,
    output: &Path,
    engine: &dyn TopicModel,
) -> PipelineResult<Option<TopicReport>> {
    require_extension(store_path, "json", "datastore")?;
    let run = StageRun::start(Stage::TopicModeling, store_path);

    let store = Datastore::open(store_path, config.strict_load)?;
    let (source, texts) = select_corpus(&store);
    info!("modeling topics over {} texts from {:?}", texts.len(), source);

    let filtered = filter_texts(&texts, stopwords);
    write_flat_corpus(&config.flat_corpus_path, &filtered, &config.language_tag)?;

    let records = read_flat_corpus(&config.flat_corpus_path)?;
    let corpus = InstanceList::from_records(records);
    info!(
        "feature corpus: {} instances, {} distinct features",
        corpus.len(),
        corpus.alphabet.len()
    );

    let topics = &config.topics;
    let report = match engine.fit(&corpus, topics.num_topics, topics.num_iterations) {
        Ok(report) => report,
        Err(e) => {
            error!("an error occurred during topic modeling: {}", e);
            run.finish(store.state());
            return Ok(None);
        }
    };

    info!("topic modeling complete");
    for topic in &report.topics {
        let words: Vec<&str> = topic.top_words().collect();
        info!("top words in topic {} ({}): {}", topic.index, topic.label(), words.join(" "));
    }

    report.write_csv(output)?;
    info!("topics saved to {}", output.display());

    run.finish(store.state());
    Ok(Some(report))
}
