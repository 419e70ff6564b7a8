//! Stopword list backed by a plain text file, one token per line.
//!
//! The loader never fails its caller: a missing file is bootstrapped with
//! [`DEFAULT_STOPWORDS`], and a read failure degrades to an empty set so
//! filtering becomes a no-op.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{error, info, warn};

pub const DEFAULT_STOPWORDS: [&str; 8] = ["the", "is", "in", "and", "of", "a", "to", "it"];

/// Immutable set of lowercase stopwords, passed explicitly to every stage that filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        StopwordSet { words }
    }

    pub fn defaults() -> Self {
        Self::from_words(DEFAULT_STOPWORDS)
    }

    /// Loads the set from `path`, creating the file with the default list if it is absent.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!("{} not found, creating the default stopword list", path.display());
            let mut contents = DEFAULT_STOPWORDS.join("\n");
            contents.push('\n');
            if let Err(e) = fs::write(path, contents) {
                error!("failed to create {}: {}; proceeding without stopword removal", path.display(), e);
                return Self::empty();
            }
            info!("default stopword list written to {}", path.display());
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let set = Self::from_words(contents.lines());
                info!("stopwords loaded from {}: {}", path.display(), set.len());
                set
            }
            Err(e) => {
                error!("failed to read {}: {}; proceeding without stopword removal", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        if self.words.contains(token) {
            return true;
        }
        self.words.contains(&token.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn filter_tokens<'a, I>(&self, tokens: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens.into_iter().filter(|t| !self.contains(t)).collect()
    }

    /// Drops stopwords from whitespace-separated `text`, keeping the remaining words as written.
    pub fn filter_text(&self, text: &str) -> String {
        self.filter_tokens(text.split_whitespace()).join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_exactly_the_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stopwords.txt");

        let set = StopwordSet::load(&path);

        assert_eq!(set, StopwordSet::defaults());
        assert_eq!(set.len(), 8);
        let written: Vec<String> = fs::read_to_string(&path).unwrap().lines().map(String::from).collect();
        assert_eq!(written, DEFAULT_STOPWORDS.to_vec());
    }

    #[test]
    fn existing_file_is_case_folded_and_blank_lines_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stop.txt");
        fs::write(&path, "The\n  Cat \n\nDOG\n").unwrap();

        let set = StopwordSet::load(&path);

        assert_eq!(set.len(), 3);
        assert!(set.contains("the"));
        assert!(set.contains("cat"));
        assert!(set.contains("Dog"));
    }

    #[test]
    fn unreadable_file_yields_empty_set() {
        let dir = tempdir().unwrap();
        // A directory exists but cannot be read as text.
        let set = StopwordSet::load(dir.path());
        assert!(set.is_empty());
    }

    #[test]
    fn filtering_is_case_insensitive_and_idempotent() {
        let set = StopwordSet::from_words(["the", "a"]);
        let once = set.filter_text("The cat  sat on A mat");
        assert_eq!(once, "cat sat on mat");
        assert_eq!(set.filter_text(&once), once);
    }

    #[test]
    fn empty_set_keeps_everything() {
        let set = StopwordSet::empty();
        assert_eq!(set.filter_text("the end"), "the end");
    }
}
