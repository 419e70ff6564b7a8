//! Text cleaning, lemmatization and stopword filtering.
//!
//! Lemmatization itself sits behind the [`Lemmatizer`] trait. The bundled
//! [`RuleLemmatizer`] is a small English rule set (irregular forms plus
//! suffix rules); heavier annotators plug in through the same trait.

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::FailurePolicy;
use crate::datastore::Datastore;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{sorted_entries, TextMap};
use crate::pipeline::{require_extension, Stage, StageRun};
use crate::stopwords::StopwordSet;

pub type AnnotationResult = Result<Vec<String>, Box<dyn Error + Send + Sync>>;

/// Maps cleaned text to its lemma tokens, in input order.
pub trait Lemmatizer {
    fn lemmatize(&self, text: &str) -> AnnotationResult;
}

impl<F> Lemmatizer for F
where
    F: Fn(&str) -> AnnotationResult,
{
    fn lemmatize(&self, text: &str) -> AnnotationResult {
        self(text)
    }
}

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[[:punct:]]").expect("punctuation pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Punctuation to spaces, whitespace runs collapsed, trimmed, lowercased.
pub fn clean(text: &str) -> String {
    let spaced = PUNCTUATION.replace_all(text, " ");
    let collapsed = WHITESPACE.replace_all(&spaced, " ");
    collapsed.trim().to_lowercase()
}

const IRREGULAR_FORMS: &[(&str, &str)] = &[
    ("mice", "mouse"),
    ("lice", "louse"),
    ("geese", "goose"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("people", "person"),
    ("oxen", "ox"),
    ("is", "be"),
    ("are", "be"),
    ("am", "be"),
    ("was", "be"),
    ("were", "be"),
    ("been", "be"),
    ("being", "be"),
    ("has", "have"),
    ("had", "have"),
    ("having", "have"),
    ("does", "do"),
    ("did", "do"),
    ("done", "do"),
    ("went", "go"),
    ("gone", "go"),
    ("goes", "go"),
    ("ran", "run"),
    ("saw", "see"),
    ("seen", "see"),
    ("took", "take"),
    ("taken", "take"),
    ("made", "make"),
    ("said", "say"),
    ("got", "get"),
    ("came", "come"),
    ("knew", "know"),
    ("known", "know"),
    ("thought", "think"),
    ("ate", "eat"),
    ("eaten", "eat"),
    ("wrote", "write"),
    ("written", "write"),
];

/// Words ending in `s` that are not plurals.
const INVARIANT_WORDS: &[&str] = &[
    "always", "perhaps", "news", "series", "species", "lens", "yes", "thus", "whereas", "towards",
    "afterwards", "besides", "physics", "mathematics", "politics", "economics",
];

pub struct RuleLemmatizer {
    irregular: HashMap<&'static str, &'static str>,
}

impl Default for RuleLemmatizer {
    fn default() -> Self {
        RuleLemmatizer {
            irregular: IRREGULAR_FORMS.iter().copied().collect(),
        }
    }
}

impl RuleLemmatizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lemma(&self, token: &str) -> String {
        if let Some(base) = self.irregular.get(token) {
            return (*base).to_string();
        }
        if token.len() <= 3 || INVARIANT_WORDS.contains(&token) {
            return token.to_string();
        }

        if let Some(stem) = token.strip_suffix("ies") {
            if stem.len() > 1 {
                return format!("{stem}y");
            }
        }
        if token.ends_with("sses") {
            return token[..token.len() - 2].to_string();
        }
        for suffix in ["xes", "ches", "shes", "zzes"] {
            if token.ends_with(suffix) {
                return token[..token.len() - 2].to_string();
            }
        }
        for suffix in ["ing", "ed"] {
            if let Some(stem) = token.strip_suffix(suffix) {
                if let Some(undoubled) = undouble(stem) {
                    return undoubled.to_string();
                }
            }
        }
        if token.ends_with('s') && !["ss", "us", "is"].iter().any(|s| token.ends_with(s)) {
            return token[..token.len() - 1].to_string();
        }
        token.to_string()
    }
}

/// `runn` -> `run`, `stopp` -> `stop`; only for doubled consonants other than l, s, z.
fn undouble(stem: &str) -> Option<&str> {
    let mut chars = stem.chars().rev();
    let last = chars.next()?;
    let before = chars.next()?;
    let is_consonant = last.is_ascii_alphabetic() && !"aeiouy".contains(last);
    if last == before && is_consonant && !"lsz".contains(last) && stem.len() >= 3 {
        Some(&stem[..stem.len() - 1])
    } else {
        None
    }
}

impl Lemmatizer for RuleLemmatizer {
    fn lemmatize(&self, text: &str) -> AnnotationResult {
        Ok(text.split_whitespace().map(|token| self.lemma(token)).collect())
    }
}

/// Clean, lemmatize, drop stopwords, join with single spaces.
pub fn lemmatize_text(
    text: &str,
    lemmatizer: &dyn Lemmatizer,
    stopwords: &StopwordSet,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let cleaned = clean(text);
    let lemmas = lemmatizer.lemmatize(&cleaned)?;
    debug!("lemmatized tokens: {:?}", lemmas);
    Ok(stopwords.filter_tokens(lemmas.iter().map(String::as_str)).join(" "))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LemmatizeReport {
    pub processed: Vec<String>,
    pub failed: Vec<String>,
}

/// Lemmatizes every document independently. Under [`FailurePolicy::AbortBatch`]
/// the first failure is returned and nothing else is produced.
pub fn lemmatize_documents(
    documents: &TextMap,
    lemmatizer: &dyn Lemmatizer,
    stopwords: &StopwordSet,
    policy: FailurePolicy,
) -> PipelineResult<(TextMap, LemmatizeReport)> {
    let mut lemmas = TextMap::new();
    let mut report = LemmatizeReport::default();

    for (id, text) in sorted_entries(documents) {
        match lemmatize_text(text, lemmatizer, stopwords) {
            Ok(lemma_text) => {
                debug!("processed document {}: {}", id, lemma_text);
                lemmas.insert(id.clone(), lemma_text);
                report.processed.push(id.clone());
            }
            Err(e) => {
                let failure = PipelineError::Annotation {
                    id: id.clone(),
                    message: e.to_string(),
                };
                match policy {
                    FailurePolicy::AbortBatch => return Err(failure),
                    FailurePolicy::SkipDocument => {
                        warn!("{}; skipping document", failure);
                        report.failed.push(id.clone());
                    }
                }
            }
        }
    }

    Ok((lemmas, report))
}

/// Lemmatization stage: reads the document partition, upserts the lemma partition.
pub fn run_lemmatize(
    store_path: &Path,
    stopwords: &StopwordSet,
    lemmatizer: &dyn Lemmatizer,
    policy: FailurePolicy,
    strict_load: bool,
) -> PipelineResult<LemmatizeReport> {
    require_extension(store_path, "json", "datastore")?;
    let run = StageRun::start(Stage::Lemmatize, store_path);

    let mut store = Datastore::open(store_path, strict_load)?;
    let documents = store.documents();

    let (lemmas, report) = match lemmatize_documents(&documents, lemmatizer, stopwords, policy) {
        Ok(result) => result,
        Err(e) => {
            error!("lemmatization aborted, nothing saved: {}", e);
            return Err(e);
        }
    };

    store.merge_lemmas(lemmas);
    store.save(store_path)?;
    info!(
        "lemmatized {} documents ({} failed)",
        report.processed.len(),
        report.failed.len()
    );

    run.finish(store.state());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(pairs: &[(&str, &str)]) -> TextMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn clean_strips_punctuation_and_case() {
        assert_eq!(clean("Hello, World!!"), "hello world");
        assert_eq!(clean("  tabs\tand\n\nnewlines... "), "tabs and newlines");
        assert_eq!(clean("don't"), "don t");
        assert_eq!(clean("!!!"), "");
    }

    #[test]
    fn rule_lemmatizer_handles_common_forms() {
        let lem = RuleLemmatizer::new();
        let cases = [
            ("cats", "cat"),
            ("mice", "mouse"),
            ("chase", "chase"),
            ("running", "run"),
            ("stopped", "stop"),
            ("cities", "city"),
            ("boxes", "box"),
            ("churches", "church"),
            ("classes", "class"),
            ("glass", "glass"),
            ("famous", "famous"),
            ("analysis", "analysis"),
            ("always", "always"),
            ("falling", "falling"),
            ("was", "be"),
            ("gas", "gas"),
        ];
        for (input, expected) in cases {
            assert_eq!(lem.lemma(input), expected, "lemma of {input}");
        }
    }

    #[test]
    fn lemmatize_text_keeps_order_and_drops_stopwords() {
        let stop = StopwordSet::from_words(["the", "a"]);
        let out = lemmatize_text("Cats chase mice.", &RuleLemmatizer::new(), &stop).unwrap();
        assert_eq!(out, "cat chase mouse");

        let out = lemmatize_text("The dogs chase a ball", &RuleLemmatizer::new(), &stop).unwrap();
        assert_eq!(out, "dog chase ball");
    }

    #[test]
    fn closures_can_stand_in_for_a_lemmatizer() {
        let upper = |text: &str| -> AnnotationResult { Ok(text.split(' ').map(str::to_uppercase).collect()) };
        let out = lemmatize_text("a b", &upper, &StopwordSet::empty()).unwrap();
        assert_eq!(out, "A B");
    }

    fn failing_on_dogs(text: &str) -> AnnotationResult {
        if text.contains("dogs") {
            Err("annotator crashed".into())
        } else {
            RuleLemmatizer::new().lemmatize(text)
        }
    }

    #[test]
    fn skip_policy_isolates_the_failing_document() {
        let documents = docs(&[("doc0", "Cats chase mice."), ("doc1", "Dogs chase cats."), ("doc2", "Birds sing.")]);
        let (lemmas, report) =
            lemmatize_documents(&documents, &failing_on_dogs, &StopwordSet::empty(), FailurePolicy::SkipDocument)
                .unwrap();

        assert_eq!(lemmas.len(), 2);
        assert_eq!(lemmas["doc2"], "bird sing");
        assert_eq!(report.failed, vec!["doc1".to_string()]);
        assert_eq!(report.processed, vec!["doc0".to_string(), "doc2".to_string()]);
    }

    #[test]
    fn abort_policy_stops_the_batch() {
        let documents = docs(&[("doc0", "Cats chase mice."), ("doc1", "Dogs chase cats.")]);
        let err = lemmatize_documents(&documents, &failing_on_dogs, &StopwordSet::empty(), FailurePolicy::AbortBatch)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Annotation { ref id, .. } if id == "doc1"));
    }
}
