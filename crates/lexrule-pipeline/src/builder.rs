//! Lexicon Builder: source spreadsheet → one rule file per category.
//!
//! This is a destructive regeneration. Every managed category file is
//! rewritten from the spreadsheet (or removed when its category is now
//! empty); manual edits to those files are discarded. Identifiers are not
//! assigned here, so the output carries no `lex_id`.

use crate::conjugation::{ConjugationLists, annotate_verbs};
use lexrule_core::Category;
use lexrule_core::config::BuildConfig;
use lexrule_core::error::{LexError, LexResult};
use lexrule_core::model::{LexiconEntry, SourceRecord};
use lexrule_core::storage::{RuleTree, StagedWrites};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const LEMMA_COLUMN: &str = "lemma";
const CATEGORY_COLUMN: &str = "category";

/// Summary of one builder run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub rows_read: usize,
    /// Identical repeated rows folded into one entry.
    pub duplicates_collapsed: usize,
    pub entries_per_category: BTreeMap<Category, usize>,
    pub verbs_annotated: usize,
    pub files_written: Vec<String>,
    pub files_removed: Vec<String>,
}

impl BuildReport {
    pub fn total_entries(&self) -> usize {
        self.entries_per_category.values().sum()
    }
}

/// Parse the source spreadsheet into validated records.
///
/// Fails on the first row with an empty lemma or an unrecognized category.
pub fn read_source(path: &Path) -> LexResult<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, &e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, &e))?
        .iter()
        .map(str::to_string)
        .collect();
    let lemma_idx = column(&headers, LEMMA_COLUMN, path)?;
    let category_idx = column(&headers, CATEGORY_COLUMN, path)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, &e))?;
        let line = row.position().map_or(0, csv::Position::line);

        let lemma = row.get(lemma_idx).unwrap_or_default();
        if lemma.is_empty() {
            return Err(LexError::malformed(
                path,
                format!("line {line}"),
                "row has no lemma",
            ));
        }
        let category: Category = row
            .get(category_idx)
            .unwrap_or_default()
            .parse()
            .map_err(|e| LexError::malformed(path, format!("line {line}"), format!("{e}")))?;

        let attributes = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, (name, value))| {
                *i != lemma_idx && *i != category_idx && !name.is_empty() && !value.is_empty()
            })
            .map(|(_, (name, value))| (name.clone(), value.to_string()))
            .collect();

        records.push(SourceRecord {
            lemma: lemma.to_string(),
            category,
            attributes,
            line,
        });
    }
    Ok(records)
}

fn column(headers: &[String], name: &str, path: &Path) -> LexResult<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            LexError::malformed(path, "line 1", format!("missing required column '{name}'"))
        })
}

fn csv_error(path: &Path, err: &csv::Error) -> LexError {
    let location = err
        .position()
        .map_or_else(|| "header".to_string(), |p| format!("line {}", p.line()));
    LexError::malformed(path, location, err.to_string())
}

/// Group records by category, folding identical duplicates.
///
/// Returns the buckets and the number of collapsed rows. Two rows with the
/// same (lemma, category) but different attributes are a duplicate-key error.
pub fn bucket_records(
    records: Vec<SourceRecord>,
    source: &Path,
) -> LexResult<(BTreeMap<Category, Vec<LexiconEntry>>, usize)> {
    let mut seen: HashMap<(String, Category), (u64, BTreeMap<String, String>)> = HashMap::new();
    let mut buckets: BTreeMap<Category, Vec<LexiconEntry>> = BTreeMap::new();
    let mut collapsed = 0;

    for record in records {
        let key = (record.lemma.clone(), record.category);
        if let Some((first_line, first_attrs)) = seen.get(&key) {
            if *first_attrs == record.attributes {
                tracing::warn!(
                    "{}: line {} repeats line {} ({}, {}); collapsed",
                    source.display(),
                    record.line,
                    first_line,
                    record.lemma,
                    record.category
                );
                collapsed += 1;
                continue;
            }
            return Err(LexError::DuplicateKey {
                lemma: record.lemma,
                category: record.category,
                first: format!("{}:{}", source.display(), first_line),
                second: format!("{}:{}", source.display(), record.line),
            });
        }
        seen.insert(key, (record.line, record.attributes.clone()));
        buckets
            .entry(record.category)
            .or_default()
            .push(record.into_entry());
    }

    Ok((buckets, collapsed))
}

/// Sort each bucket by its deterministic key.
pub fn sort_buckets(buckets: &mut BTreeMap<Category, Vec<LexiconEntry>>) {
    buckets
        .par_iter_mut()
        .for_each(|(_, entries)| entries.sort_by_cached_key(LexiconEntry::sort_key));
}

/// Run the builder: read `source_csv`, regenerate the category files under `tree`.
pub fn build_lexicon(
    source_csv: &Path,
    tree: &RuleTree,
    options: &BuildConfig,
) -> LexResult<BuildReport> {
    if !source_csv.is_file() {
        return Err(LexError::MissingInput {
            stage: "build",
            path: source_csv.to_path_buf(),
        });
    }

    let records = read_source(source_csv)?;
    let rows_read = records.len();
    let (mut buckets, duplicates_collapsed) = bucket_records(records, source_csv)?;
    sort_buckets(&mut buckets);

    let mut verbs_annotated = 0;
    if options.annotate_conjugation
        && let Some(lists) = ConjugationLists::load(tree.grammar_dir())?
        && let Some(verbs) = buckets.get_mut(&Category::Verb)
    {
        verbs_annotated = annotate_verbs(verbs, &lists);
    }

    let mut report = BuildReport {
        rows_read,
        duplicates_collapsed,
        verbs_annotated,
        ..BuildReport::default()
    };

    let mut staged = StagedWrites::new();
    for category in Category::ALL {
        let path = tree.category_path(category);
        match buckets.get(&category) {
            Some(entries) if !entries.is_empty() => {
                staged.stage_yaml(path.clone(), entries)?;
                report.entries_per_category.insert(category, entries.len());
                report.files_written.push(tree.relative(&path));
            }
            _ => {
                if path.exists() {
                    report.files_removed.push(tree.relative(&path));
                }
                staged.stage_removal(path);
            }
        }
    }
    staged.commit()?;

    tracing::info!(
        "build: {} rows -> {} entries in {} category files ({} duplicates collapsed)",
        report.rows_read,
        report.total_entries(),
        report.files_written.len(),
        report.duplicates_collapsed
    );
    Ok(report)
}
