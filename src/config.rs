use std::path::PathBuf;
use std::str::FromStr;

/// What the lemmatization stage does when the lemmatizer fails on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the document, leave its lemma record untouched, keep going.
    #[default]
    SkipDocument,
    /// Stop at the first failure; nothing from the run is saved.
    AbortBatch,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "skip_document" => Ok(FailurePolicy::SkipDocument),
            "abort" | "abort_batch" => Ok(FailurePolicy::AbortBatch),
            other => Err(format!("unknown failure policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicConfig {
    pub num_topics: usize,
    pub num_iterations: usize,
    pub num_workers: usize,
    pub top_words: usize,
    pub alpha_sum: f64,
    pub beta: f64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        TopicConfig {
            num_topics: 5,
            num_iterations: 50,
            num_workers: 2,
            top_words: 10,
            alpha_sum: 1.0,
            beta: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub stopwords_path: PathBuf,
    pub flat_corpus_path: PathBuf,
    pub output_dir: PathBuf,
    pub language_tag: String,
    pub strict_load: bool,
    pub failure_policy: FailurePolicy,
    pub topics: TopicConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            stopwords_path: PathBuf::from("stopwords.txt"),
            flat_corpus_path: PathBuf::from("topicdata.txt"),
            output_dir: PathBuf::from("."),
            language_tag: "en".into(),
            strict_load: false,
            failure_policy: FailurePolicy::default(),
            topics: TopicConfig::default(),
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `TEXTPIPE_*` keys; missing or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let topic_defaults = TopicConfig::default();

        let topics = TopicConfig {
            num_topics: parsed(&lookup, "TEXTPIPE_TOPICS").unwrap_or(topic_defaults.num_topics),
            num_iterations: parsed(&lookup, "TEXTPIPE_ITERATIONS").unwrap_or(topic_defaults.num_iterations),
            num_workers: parsed(&lookup, "TEXTPIPE_WORKERS").unwrap_or(topic_defaults.num_workers),
            top_words: parsed(&lookup, "TEXTPIPE_TOP_WORDS").unwrap_or(topic_defaults.top_words),
            alpha_sum: parsed(&lookup, "TEXTPIPE_ALPHA_SUM").unwrap_or(topic_defaults.alpha_sum),
            beta: parsed(&lookup, "TEXTPIPE_BETA").unwrap_or(topic_defaults.beta),
        };

        PipelineConfig {
            stopwords_path: lookup("TEXTPIPE_STOPWORDS").map(PathBuf::from).unwrap_or(defaults.stopwords_path),
            flat_corpus_path: lookup("TEXTPIPE_FLAT_CORPUS").map(PathBuf::from).unwrap_or(defaults.flat_corpus_path),
            output_dir: lookup("TEXTPIPE_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            language_tag: lookup("TEXTPIPE_LANGUAGE").unwrap_or(defaults.language_tag),
            strict_load: lookup("TEXTPIPE_STRICT_LOAD").is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
            failure_policy: parsed(&lookup, "TEXTPIPE_FAILURE_POLICY").unwrap_or(defaults.failure_policy),
            topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_lookup_gives_defaults() {
        let cfg = PipelineConfig::from_lookup(|_| None);
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.stopwords_path, PathBuf::from("stopwords.txt"));
        assert_eq!(cfg.flat_corpus_path, PathBuf::from("topicdata.txt"));
        assert_eq!(cfg.topics.num_topics, 5);
        assert_eq!(cfg.topics.num_workers, 2);
        assert_eq!(cfg.topics.num_iterations, 50);
    }

    #[test]
    fn lookup_reads_all_keys() {
        let vars: HashMap<&str, &str> = [
            ("TEXTPIPE_STOPWORDS", "/tmp/stop.txt"),
            ("TEXTPIPE_FLAT_CORPUS", "/tmp/flat.txt"),
            ("TEXTPIPE_OUTPUT_DIR", "/tmp/out"),
            ("TEXTPIPE_LANGUAGE", "de"),
            ("TEXTPIPE_STRICT_LOAD", "true"),
            ("TEXTPIPE_FAILURE_POLICY", "abort"),
            ("TEXTPIPE_TOPICS", "8"),
            ("TEXTPIPE_ITERATIONS", "200"),
            ("TEXTPIPE_WORKERS", "4"),
            ("TEXTPIPE_TOP_WORDS", "3"),
            ("TEXTPIPE_BETA", "0.1"),
        ]
        .into_iter()
        .collect();

        let cfg = PipelineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.stopwords_path, PathBuf::from("/tmp/stop.txt"));
        assert_eq!(cfg.flat_corpus_path, PathBuf::from("/tmp/flat.txt"));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.language_tag, "de");
        assert!(cfg.strict_load);
        assert_eq!(cfg.failure_policy, FailurePolicy::AbortBatch);
        assert_eq!(cfg.topics.num_topics, 8);
        assert_eq!(cfg.topics.num_iterations, 200);
        assert_eq!(cfg.topics.num_workers, 4);
        assert_eq!(cfg.topics.top_words, 3);
        assert_eq!(cfg.topics.alpha_sum, 1.0);
        assert_eq!(cfg.topics.beta, 0.1);
    }

    #[test]
    fn unparsable_numbers_keep_defaults() {
        let cfg = PipelineConfig::from_lookup(|k| (k == "TEXTPIPE_TOPICS").then(|| "many".to_string()));
        assert_eq!(cfg.topics.num_topics, 5);
    }

    #[test]
    fn failure_policy_accepts_short_and_long_names() {
        assert_eq!("abort_batch".parse::<FailurePolicy>(), Ok(FailurePolicy::AbortBatch));
        assert_eq!(" Skip ".parse::<FailurePolicy>(), Ok(FailurePolicy::SkipDocument));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
