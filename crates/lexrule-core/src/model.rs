//! Records flowing through the pipeline: source rows, lexicon entries, the
//! index, and morphology tables.

use crate::category::{Category, UnknownCategory};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

const LEGACY_LEMMA_FIELD: &str = "lemma_guess";

/// Schema version written to the index file.
pub const INDEX_SCHEMA_VERSION: &str = "1";

/// One row of the source spreadsheet, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub lemma: String,
    pub category: Category,
    /// Non-empty pass-through columns, keyed by header.
    pub attributes: BTreeMap<String, String>,
    /// 1-based line in the CSV file (header is line 1).
    pub line: u64,
}

impl SourceRecord {
    pub fn into_entry(self) -> LexiconEntry {
        LexiconEntry {
            lemma: self.lemma,
            category: self.category,
            lex_id: None,
            attributes: self
                .attributes
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        }
    }
}

/// An entry in a category rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub lemma: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lex_id: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl LexiconEntry {
    /// Canonicalization key: the pair that identifies one logical vocabulary item.
    pub fn key(&self) -> (String, Category) {
        (self.lemma.clone(), self.category)
    }

    /// String value of an attribute, if present and scalar.
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Deterministic ordering key within a category file.
    pub fn sort_key(&self) -> (String, String, String) {
        let tiebreak = self
            .category
            .tiebreak_attribute()
            .and_then(|attr| self.attribute_str(attr))
            .unwrap_or_default()
            .to_string();
        (self.lemma.to_lowercase(), tiebreak, self.lemma.clone())
    }
}

/// Where an identifier lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub lemma: String,
    pub category: Category,
    /// Category file, relative to the rule tree root.
    pub source_file: String,
}

/// The authoritative lex_id → entry mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconIndex {
    pub schema_version: String,
    #[serde(default)]
    pub entries: BTreeMap<String, IndexEntry>,
    /// Identifiers issued in the past whose entries were removed. Never re-issued.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub retired: BTreeSet<String>,
}

impl Default for LexiconIndex {
    fn default() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            entries: BTreeMap::new(),
            retired: BTreeSet::new(),
        }
    }
}

impl LexiconIndex {
    pub fn contains(&self, lex_id: &str) -> bool {
        self.entries.contains_key(lex_id)
    }

    /// Every identifier this index has ever issued (live or retired).
    pub fn issued(&self) -> BTreeSet<String> {
        self.entries
            .keys()
            .chain(self.retired.iter())
            .cloned()
            .collect()
    }
}

/// One conjugation or inflection record in a morphology table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    /// Optional hint restricting which category the lemma may link to. Kept
    /// as written; see [`MorphologyRecord::category_hint`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma_lex_id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl MorphologyRecord {
    /// Lemma with surrounding whitespace removed; `None` when absent or blank.
    ///
    /// Older tables carry the lemma as `lemma_guess`; that key is read but
    /// left untouched on write.
    pub fn lemma_text(&self) -> Option<&str> {
        self.lemma
            .as_deref()
            .or_else(|| self.fields.get(LEGACY_LEMMA_FIELD).and_then(Value::as_str))
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Parsed category hint, accepting the same spellings as the source CSV.
    /// A blank hint counts as no hint.
    pub fn category_hint(&self) -> Result<Option<Category>, UnknownCategory> {
        match self.category.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(hint) => hint.parse().map(Some),
        }
    }

    pub fn table_id(&self) -> Option<String> {
        match self.fields.get("table_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
