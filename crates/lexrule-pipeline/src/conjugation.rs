//! Conjugation-class annotation for verb entries.
//!
//! Classes come only from explicit lists in the grammar rules
//! (`examples.sample_lemmas` of `verbs_irregular.yaml` and
//! `verbs_stemchange.yaml`); a verb on neither list is `regular`.

use lexrule_core::Category;
use lexrule_core::error::LexResult;
use lexrule_core::model::LexiconEntry;
use lexrule_core::storage;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::path::Path;

pub const CONJUGATION_ATTRIBUTE: &str = "conjugation_class";

const IRREGULAR_FILE: &str = "verbs_irregular.yaml";
const STEMCHANGE_FILE: &str = "verbs_stemchange.yaml";

/// Sample-lemma lists loaded from the grammar directory.
#[derive(Debug, Clone, Default)]
pub struct ConjugationLists {
    pub irregular: BTreeSet<String>,
    pub stemchange: BTreeSet<String>,
}

impl ConjugationLists {
    /// Load both lists. `Ok(None)` when neither grammar file exists.
    pub fn load(grammar_dir: &Path) -> LexResult<Option<Self>> {
        let irregular_path = grammar_dir.join(IRREGULAR_FILE);
        let stem_path = grammar_dir.join(STEMCHANGE_FILE);
        if !irregular_path.is_file() && !stem_path.is_file() {
            return Ok(None);
        }
        Ok(Some(Self {
            irregular: load_sample_lemmas(&irregular_path)?,
            stemchange: load_sample_lemmas(&stem_path)?,
        }))
    }

    pub fn classify(&self, lemma: &str) -> &'static str {
        let lemma = lemma.trim();
        if self.irregular.contains(lemma) {
            "irregular"
        } else if self.stemchange.contains(lemma) {
            "stemchange"
        } else {
            "regular"
        }
    }
}

fn load_sample_lemmas(path: &Path) -> LexResult<BTreeSet<String>> {
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }
    let doc: Value = storage::read_yaml(path)?;
    let samples = doc
        .get("examples")
        .and_then(|ex| ex.get("sample_lemmas"))
        .and_then(Value::as_sequence);

    Ok(samples
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Set `conjugation_class` on verb entries that lack one. Returns how many changed.
pub fn annotate_verbs(entries: &mut [LexiconEntry], lists: &ConjugationLists) -> usize {
    let mut annotated = 0;
    for entry in entries
        .iter_mut()
        .filter(|e| e.category == Category::Verb)
    {
        if entry.attributes.contains_key(CONJUGATION_ATTRIBUTE) {
            continue;
        }
        let class = lists.classify(&entry.lemma);
        entry.attributes.insert(
            CONJUGATION_ATTRIBUTE.to_string(),
            Value::String(class.to_string()),
        );
        annotated += 1;
    }
    annotated
}
