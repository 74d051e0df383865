//! Vocabulary coverage statistics over the generated lexicon.

use lexrule_core::Category;
use lexrule_core::error::LexResult;
use lexrule_core::model::MorphologyRecord;
use lexrule_core::storage::{self, RuleTree};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize)]
pub struct LexiconStats {
    pub per_category: BTreeMap<Category, usize>,
    pub total_entries: usize,
    pub unique_lemmas: usize,
    /// Entries outside noun, verb and adjective.
    pub function_words: usize,
    pub morphology_records: usize,
    pub morphology_linked: usize,
}

impl LexiconStats {
    pub fn count(&self, category: Category) -> usize {
        self.per_category.get(&category).copied().unwrap_or(0)
    }

    /// Linked share of morphology records, 0.0 when there are none.
    pub fn morphology_coverage(&self) -> f64 {
        if self.morphology_records == 0 {
            0.0
        } else {
            self.morphology_linked as f64 / self.morphology_records as f64
        }
    }
}

/// Collect statistics without modifying anything.
pub fn collect_stats(tree: &RuleTree) -> LexResult<LexiconStats> {
    let mut stats = LexiconStats::default();
    let mut lemmas = BTreeSet::new();

    for (category, path) in tree.existing_category_files() {
        let entries = storage::load_category_file(&path, category)?;
        stats.per_category.insert(category, entries.len());
        stats.total_entries += entries.len();
        if !category.is_content_word() {
            stats.function_words += entries.len();
        }
        lemmas.extend(entries.into_iter().map(|e| e.lemma));
    }
    stats.unique_lemmas = lemmas.len();

    for path in tree.morphology_files()? {
        let records: Vec<MorphologyRecord> = storage::read_yaml(&path)?;
        stats.morphology_records += records.len();
        stats.morphology_linked += records
            .iter()
            .filter(|r| r.lemma_lex_id.is_some())
            .count();
    }
    Ok(stats)
}
