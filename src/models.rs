use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DOCUMENT_ID_PREFIX: &str = "doc";

/// Partition contents keyed by document id.
pub type TextMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Document {
            id: document_id(index),
            text: text.into(),
        }
    }
}

pub fn document_id(index: usize) -> String {
    format!("{}{}", DOCUMENT_ID_PREFIX, index)
}

/// Index part of a `docN` id, if the id has that shape.
pub fn document_index(id: &str) -> Option<usize> {
    id.strip_prefix(DOCUMENT_ID_PREFIX)?.parse().ok()
}

/// Orders `doc2` before `doc10`; ids without a numeric suffix sort after, by string.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (document_index(a), document_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Entries of a partition in natural id order.
pub fn sorted_entries(map: &TextMap) -> Vec<(&String, &String)> {
    let mut entries: Vec<(&String, &String)> = map.iter().collect();
    entries.sort_by(|a, b| compare_ids(a.0, b.0));
    entries
}
