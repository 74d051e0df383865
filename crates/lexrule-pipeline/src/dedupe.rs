//! Merge duplicate morphology tables.
//!
//! Two records are duplicates when they share a lemma and the same `forms`
//! mapping (values trimmed, key order ignored). The first record survives and
//! collects the `sources` of the others.

use lexrule_core::error::LexResult;
use lexrule_core::model::MorphologyRecord;
use lexrule_core::storage::{self, RuleTree, StagedWrites};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::HashMap;

const FORMS_FIELD: &str = "forms";
const SOURCES_FIELD: &str = "sources";
const SOURCE_FIELD: &str = "source";

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupeReport {
    pub files: usize,
    pub before: usize,
    pub after: usize,
    pub files_written: Vec<String>,
}

type Signature = (String, Vec<(String, String)>);

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// `None` for records that have no lemma or no `forms` mapping; those are never merged.
fn signature(record: &MorphologyRecord) -> Option<Signature> {
    let lemma = record.lemma_text()?;
    let forms = record.fields.get(FORMS_FIELD)?.as_mapping()?;
    let mut pairs: Vec<(String, String)> = forms
        .iter()
        .map(|(k, v)| (scalar(k), scalar(v)))
        .collect();
    pairs.sort();
    Some((lemma.to_string(), pairs))
}

/// Fold a singular `source` mapping into the `sources` list.
fn normalize_sources(record: &mut MorphologyRecord) {
    let single = record.fields.remove(SOURCE_FIELD);
    let has_list = matches!(record.fields.get(SOURCES_FIELD), Some(Value::Sequence(_)));
    if has_list {
        return;
    }
    let sources = match single {
        Some(source @ Value::Mapping(_)) => vec![source],
        _ => Vec::new(),
    };
    record
        .fields
        .insert(SOURCES_FIELD.to_string(), Value::Sequence(sources));
}

fn merge_sources(into: &mut MorphologyRecord, from: &MorphologyRecord) {
    let Some(Value::Sequence(extra)) = from.fields.get(SOURCES_FIELD) else {
        return;
    };
    if let Some(Value::Sequence(existing)) = into.fields.get_mut(SOURCES_FIELD) {
        for source in extra {
            if !existing.contains(source) {
                existing.push(source.clone());
            }
        }
    }
}

/// Merge duplicates, keeping first-occurrence order.
pub fn dedupe_records(records: Vec<MorphologyRecord>) -> Vec<MorphologyRecord> {
    let mut kept: Vec<MorphologyRecord> = Vec::with_capacity(records.len());
    let mut by_signature: HashMap<Signature, usize> = HashMap::new();

    for mut record in records {
        let Some(sig) = signature(&record) else {
            kept.push(record);
            continue;
        };
        normalize_sources(&mut record);
        match by_signature.get(&sig) {
            Some(&pos) => merge_sources(&mut kept[pos], &record),
            None => {
                by_signature.insert(sig, kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

/// De-duplicate every morphology table in `tree`, rewriting only changed files.
pub fn dedupe_morphology(tree: &RuleTree) -> LexResult<DedupeReport> {
    let mut report = DedupeReport::default();
    let mut staged = StagedWrites::new();

    for path in tree.morphology_files()? {
        let records: Vec<MorphologyRecord> = storage::read_yaml(&path)?;
        let before = records.len();
        let original = records.clone();
        let deduped = dedupe_records(records);

        report.files += 1;
        report.before += before;
        report.after += deduped.len();
        if deduped != original {
            tracing::debug!(
                "{}: {} -> {} records",
                path.display(),
                before,
                deduped.len()
            );
            report.files_written.push(tree.relative(&path));
            staged.stage_yaml(path, &deduped)?;
        }
    }
    if !staged.is_empty() {
        staged.commit()?;
    }

    tracing::info!(
        "dedupe: {} -> {} morphology records across {} files",
        report.before,
        report.after,
        report.files
    );
    Ok(report)
}
