//! Morphology Linker: attach `lemma_lex_id` to morphology records.
//!
//! Links are a pure function of the record's lemma (and optional category
//! hint) and the current index. A record that matches nothing, or matches
//! more than one entry in the deciding category, is left unlinked and
//! reported; that is an expected outcome, not an error.

use lexrule_core::Category;
use lexrule_core::category::UnknownCategory;
use lexrule_core::config::LinkerConfig;
use lexrule_core::error::{LexError, LexResult};
use lexrule_core::model::{LexiconIndex, MorphologyRecord};
use lexrule_core::normalize::normalize_lemma;
use lexrule_core::storage::{self, RuleTree, StagedWrites};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Why a record stayed unlinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    NoLemma,
    Unmatched,
    Ambiguous { candidates: Vec<String> },
    UnknownCategory { category: String },
}

/// One unlinked morphology record.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub file: String,
    /// 1-based position in the table.
    pub position: usize,
    pub lemma: Option<String>,
    pub table_id: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Summary of one linker run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkReport {
    pub files: usize,
    pub records: usize,
    pub linked: usize,
    /// Records whose `lemma_lex_id` changed (set, replaced, or cleared).
    pub changed: usize,
    pub skipped: Vec<SkippedRecord>,
    pub files_written: Vec<String>,
}

/// Outcome of resolving one lemma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Linked(String),
    Unmatched,
    Ambiguous(Vec<String>),
}

/// Normalized-lemma view of the index.
#[derive(Debug, Default)]
pub struct LemmaLookup {
    by_lemma: HashMap<String, BTreeMap<Category, Vec<String>>>,
}

impl LemmaLookup {
    pub fn from_index(index: &LexiconIndex) -> Self {
        let mut by_lemma: HashMap<String, BTreeMap<Category, Vec<String>>> = HashMap::new();
        for (lex_id, entry) in &index.entries {
            by_lemma
                .entry(normalize_lemma(&entry.lemma))
                .or_default()
                .entry(entry.category)
                .or_default()
                .push(lex_id.clone());
        }
        Self { by_lemma }
    }

    /// Resolve a lemma. With a category hint only that category is considered;
    /// otherwise `preferred` is tried first, then the remaining categories in
    /// canonical order. The first category with any candidate decides.
    pub fn resolve(
        &self,
        lemma: &str,
        hint: Option<Category>,
        preferred: &[Category],
    ) -> Resolution {
        let Some(by_category) = self.by_lemma.get(&normalize_lemma(lemma)) else {
            return Resolution::Unmatched;
        };

        let order: Vec<Category> = match hint {
            Some(category) => vec![category],
            None => {
                let mut order = preferred.to_vec();
                order.extend(Category::ALL.iter().filter(|c| !preferred.contains(c)));
                order
            }
        };

        for category in order {
            match by_category.get(&category).map(Vec::as_slice) {
                None | Some([]) => {}
                Some([only]) => return Resolution::Linked(only.clone()),
                Some(many) => return Resolution::Ambiguous(many.to_vec()),
            }
        }
        Resolution::Unmatched
    }
}

struct LinkedFile {
    path: PathBuf,
    rel: String,
    records: Vec<MorphologyRecord>,
    linked: usize,
    changed: usize,
    skipped: Vec<SkippedRecord>,
}

fn link_file(
    path: &Path,
    rel: String,
    lookup: &LemmaLookup,
    preferred: &[Category],
) -> LexResult<LinkedFile> {
    let mut records: Vec<MorphologyRecord> = storage::read_yaml(path)?;
    let mut linked = 0;
    let mut changed = 0;
    let mut skipped = Vec::new();

    for (i, record) in records.iter_mut().enumerate() {
        let Some(lemma) = record.lemma_text() else {
            skipped.push(SkippedRecord {
                file: rel.clone(),
                position: i + 1,
                lemma: None,
                table_id: record.table_id(),
                reason: SkipReason::NoLemma,
            });
            if record.lemma_lex_id.take().is_some() {
                changed += 1;
            }
            continue;
        };
        let resolution = match record.category_hint() {
            Ok(hint) => lookup.resolve(lemma, hint, preferred),
            Err(UnknownCategory(category)) => {
                skipped.push(skipped_record(
                    &rel,
                    i,
                    record,
                    SkipReason::UnknownCategory { category },
                ));
                if record.lemma_lex_id.take().is_some() {
                    changed += 1;
                }
                continue;
            }
        };

        let new_id = match resolution {
            Resolution::Linked(id) => {
                linked += 1;
                Some(id)
            }
            Resolution::Unmatched => {
                skipped.push(skipped_record(&rel, i, record, SkipReason::Unmatched));
                None
            }
            Resolution::Ambiguous(candidates) => {
                skipped.push(skipped_record(
                    &rel,
                    i,
                    record,
                    SkipReason::Ambiguous { candidates },
                ));
                None
            }
        };
        if record.lemma_lex_id != new_id {
            record.lemma_lex_id = new_id;
            changed += 1;
        }
    }

    Ok(LinkedFile {
        path: path.to_path_buf(),
        rel,
        records,
        linked,
        changed,
        skipped,
    })
}

fn skipped_record(
    rel: &str,
    index: usize,
    record: &MorphologyRecord,
    reason: SkipReason,
) -> SkippedRecord {
    SkippedRecord {
        file: rel.to_string(),
        position: index + 1,
        lemma: record.lemma_text().map(str::to_string),
        table_id: record.table_id(),
        reason,
    }
}

/// Run the linker over every morphology table in `tree`.
pub fn link_morphology(tree: &RuleTree, options: &LinkerConfig) -> LexResult<LinkReport> {
    let index_path = tree.index_path();
    let index = storage::load_index(&index_path)?.ok_or_else(|| LexError::MissingInput {
        stage: "link",
        path: index_path.clone(),
    })?;
    let lookup = LemmaLookup::from_index(&index);

    let files = tree.morphology_files()?;
    let linked_files: Vec<LinkedFile> = files
        .par_iter()
        .map(|path| {
            link_file(
                path,
                tree.relative(path),
                &lookup,
                &options.preferred_categories,
            )
        })
        .collect::<LexResult<_>>()?;

    let mut report = LinkReport {
        files: linked_files.len(),
        ..LinkReport::default()
    };
    let mut staged = StagedWrites::new();
    for file in linked_files {
        report.records += file.records.len();
        report.linked += file.linked;
        report.changed += file.changed;
        report.skipped.extend(file.skipped);
        if file.changed > 0 {
            staged.stage_yaml(file.path, &file.records)?;
            report.files_written.push(file.rel);
        }
    }
    if !staged.is_empty() {
        staged.commit()?;
    }

    for skip in &report.skipped {
        tracing::warn!(
            "unlinked morphology record {}#{} (lemma {:?}): {:?}",
            skip.file,
            skip.position,
            skip.lemma.as_deref().unwrap_or("-"),
            skip.reason
        );
    }
    tracing::info!(
        "link: {}/{} records linked across {} files ({} unlinked)",
        report.linked,
        report.records,
        report.files,
        report.skipped.len()
    );
    Ok(report)
}
