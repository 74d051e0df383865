//! Integrity Validator: read-only consistency check of the whole rule tree.
//!
//! Every problem is collected into the report; nothing short of a missing
//! rule tree aborts the scan.

use globset::GlobSet;
use lexrule_core::Category;
use lexrule_core::config::ValidatorConfig;
use lexrule_core::error::{LexError, LexResult};
use lexrule_core::model::{LexiconEntry, LexiconIndex};
use lexrule_core::storage::{self, RuleTree};
use rayon::prelude::*;
use serde::Serialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueKind {
    MalformedInput,
    DuplicateKey,
    OrphanedReference,
    StaleIndexEntry,
    MissingIdentifier,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::MalformedInput => "MalformedInput",
            IssueKind::DuplicateKey => "DuplicateKey",
            IssueKind::OrphanedReference => "OrphanedReference",
            IssueKind::StaleIndexEntry => "StaleIndexEntry",
            IssueKind::MissingIdentifier => "MissingIdentifier",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One integrity violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// File relative to the rule tree root.
    pub file: String,
    /// Field path (`[0].lemma_lex_id`), entry number, or parse position.
    pub location: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lex_id: Option<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{}: {}",
            self.kind, self.file, self.location, self.message
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub files_scanned: usize,
    pub files_with_references: usize,
    pub references_checked: usize,
    pub index_entries: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Zero issues: the tree may be treated as consistent.
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    fn push(
        &mut self,
        kind: IssueKind,
        file: &str,
        location: impl Into<String>,
        message: impl Into<String>,
        lex_id: Option<&str>,
    ) {
        self.issues.push(ValidationIssue {
            kind,
            file: file.to_string(),
            location: location.into(),
            message: message.into(),
            lex_id: lex_id.map(str::to_string),
        });
    }

    fn push_error(&mut self, file: &str, err: &LexError) {
        let (location, message) = match err {
            LexError::MalformedInput {
                location, message, ..
            } => (location.clone(), message.clone()),
            other => ("document".to_string(), other.to_string()),
        };
        self.push(IssueKind::MalformedInput, file, location, message, None);
    }
}

/// A reference-shaped field found while scanning a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRef {
    path: String,
    key: String,
    value: Option<String>,
}

const LEX_ID_KEY: &str = "lex_id";

/// Matches `lex_id` itself, whatever the configured suffix, and any key ending in the suffix.
fn is_reference_key(key: &str, suffix: &str) -> bool {
    key == LEX_ID_KEY || key.ends_with(suffix)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Collect every reference field under `value`. `value: None` marks a
/// non-scalar reference.
fn collect_references(value: &Value, path: &str, suffix: &str, out: &mut Vec<FieldRef>) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let Some(key) = k.as_str() else {
                    continue;
                };
                let here = child_path(path, key);
                if is_reference_key(key, suffix) {
                    match v {
                        Value::Null => {}
                        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
                            out.push(FieldRef {
                                path: here,
                                key: key.to_string(),
                                value: None,
                            });
                        }
                        scalar => out.push(FieldRef {
                            path: here,
                            key: key.to_string(),
                            value: scalar_text(scalar),
                        }),
                    }
                } else {
                    collect_references(v, &here, suffix, out);
                }
            }
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_references(item, &format!("{path}[{i}]"), suffix, out);
            }
        }
        Value::Tagged(tagged) => collect_references(&tagged.value, path, suffix, out),
        _ => {}
    }
}

/// Rule files under the tree root, sorted, minus excluded ones and the index.
fn rule_files(
    tree: &RuleTree,
    exclude: &GlobSet,
    report: &mut ValidationReport,
) -> Vec<(PathBuf, String)> {
    let index_path = tree.index_path();
    let mut files = Vec::new();
    for entry in WalkDir::new(tree.root()).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let file = e
                    .path()
                    .map_or_else(|| ".".to_string(), |p| tree.relative(p));
                report.push(IssueKind::MalformedInput, &file, "document", e.to_string(), None);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !storage::is_yaml(path) || path == index_path {
            continue;
        }
        let rel = tree.relative(path);
        if exclude.is_match(&rel) {
            tracing::debug!("excluded {rel}");
            continue;
        }
        files.push((path.to_path_buf(), rel));
    }
    files
}

fn category_of(tree: &RuleTree, path: &Path) -> Option<Category> {
    if path.parent() != Some(tree.lexicon_dir()) {
        return None;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(Category::from_file_name)
}

fn load_index_for_validation(
    tree: &RuleTree,
    report: &mut ValidationReport,
) -> Option<LexiconIndex> {
    let index_path = tree.index_path();
    let rel = tree.relative(&index_path);
    if index_path.is_file() {
        report.files_scanned += 1;
    }
    match storage::load_index(&index_path) {
        Ok(Some(index)) => Some(index),
        Ok(None) => {
            report.push(
                IssueKind::MalformedInput,
                &rel,
                "document",
                "index file is missing; references cannot be resolved",
                None,
            );
            None
        }
        Err(e) => {
            report.push_error(&rel, &e);
            None
        }
    }
}

/// Identity checks specific to category files.
fn check_category_file(
    value: &Value,
    category: Category,
    rel: &str,
    seen: &mut HashMap<String, String>,
    report: &mut ValidationReport,
) {
    if value.is_null() {
        return;
    }
    let entries: Vec<LexiconEntry> = match serde_yaml::from_value(value.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            report.push(
                IssueKind::MalformedInput,
                rel,
                "document",
                format!("not a list of lexicon entries: {e}"),
                None,
            );
            return;
        }
    };
    for (i, entry) in entries.iter().enumerate() {
        let location = format!("[{i}]");
        if entry.category != category {
            report.push(
                IssueKind::MalformedInput,
                rel,
                &location,
                format!(
                    "entry '{}' has category {} in the {} file",
                    entry.lemma, entry.category, category
                ),
                None,
            );
        }
        match entry.lex_id.as_deref() {
            None => report.push(
                IssueKind::MissingIdentifier,
                rel,
                &location,
                format!("entry ({}, {}) has no lex_id", entry.lemma, entry.category),
                None,
            ),
            Some(id) => {
                let here = format!("{rel}:{location}");
                if let Some(first) = seen.get(id) {
                    report.push(
                        IssueKind::DuplicateKey,
                        rel,
                        &location,
                        format!("lex_id {id} is also used at {first}"),
                        Some(id),
                    );
                } else {
                    seen.insert(id.to_string(), here);
                }
            }
        }
    }
}

/// Validate every rule file in `tree`.
///
/// Returns `Err` only when the tree root does not exist; every integrity
/// problem is an issue in the report.
pub fn validate_tree(tree: &RuleTree, options: &ValidatorConfig) -> LexResult<ValidationReport> {
    if !tree.root().is_dir() {
        return Err(LexError::MissingInput {
            stage: "validate",
            path: tree.root().to_path_buf(),
        });
    }
    let exclude = options
        .exclude_set()
        .map_err(|e| LexError::malformed("lexrule.toml", "validator.exclude", e.to_string()))?;

    let mut report = ValidationReport::default();
    let index = load_index_for_validation(tree, &mut report);
    if let Some(index) = &index {
        report.index_entries = index.entries.len();
    }

    let files = rule_files(tree, &exclude, &mut report);
    let parsed: Vec<LexResult<Value>> = files
        .par_iter()
        .map(|(path, _)| storage::read_yaml::<Value>(path))
        .collect();

    let suffix = options.reference_suffix.as_str();
    let mut seen_ids: HashMap<String, String> = HashMap::new();
    // File -> identifiers it declares under a `lex_id` key.
    let mut declared: HashMap<String, HashSet<String>> = HashMap::new();

    for ((path, rel), result) in files.iter().zip(parsed) {
        report.files_scanned += 1;
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                report.push_error(rel, &e);
                continue;
            }
        };

        if let Some(category) = category_of(tree, path) {
            check_category_file(&value, category, rel, &mut seen_ids, &mut report);
        }

        let mut refs = Vec::new();
        collect_references(&value, "", suffix, &mut refs);
        if !refs.is_empty() {
            report.files_with_references += 1;
        }
        let ids = declared.entry(rel.clone()).or_default();
        for field in refs {
            let Some(id) = field.value else {
                report.push(
                    IssueKind::MalformedInput,
                    rel,
                    field.path,
                    format!("reference field {} must hold a scalar", field.key),
                    None,
                );
                continue;
            };
            report.references_checked += 1;
            if field.key == LEX_ID_KEY {
                ids.insert(id.clone());
            }
            if let Some(index) = &index
                && !index.contains(&id)
            {
                report.push(
                    IssueKind::OrphanedReference,
                    rel,
                    field.path,
                    format!("{} {id} is not in the index", field.key),
                    Some(&id),
                );
            }
        }
    }

    if let Some(index) = &index {
        let index_rel = tree.relative(&tree.index_path());
        for (lex_id, entry) in &index.entries {
            let location = format!("entries.{lex_id}");
            if !tree.resolve(&entry.source_file).is_file() {
                report.push(
                    IssueKind::StaleIndexEntry,
                    &index_rel,
                    location,
                    format!("source file {} does not exist", entry.source_file),
                    Some(lex_id),
                );
            } else if let Some(ids) = declared.get(&entry.source_file)
                && !ids.contains(lex_id)
            {
                report.push(
                    IssueKind::StaleIndexEntry,
                    &index_rel,
                    location,
                    format!("{} does not contain {lex_id}", entry.source_file),
                    Some(lex_id),
                );
            }
        }
    }

    if report.passed() {
        tracing::info!(
            "validate: OK ({} files, {} references, {} index entries)",
            report.files_scanned,
            report.references_checked,
            report.index_entries
        );
    } else {
        tracing::warn!(
            "validate: {} issues across {} files",
            report.issues.len(),
            report.files_scanned
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn refs_of(yaml: &str) -> Vec<FieldRef> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mut out = Vec::new();
        collect_references(&value, "", "_lex_id", &mut out);
        out
    }

    #[test]
    fn test_collect_references_paths() {
        let refs = refs_of(
            "rules:\n- target_lex_id: LEX.VERB.GEHEN\n  nested:\n    lex_id: LEX.NOUN.HUND\n- note: x\n  other_lex_id: null\n",
        );
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].path, "rules[0].target_lex_id");
        assert_eq!(refs[0].value.as_deref(), Some("LEX.VERB.GEHEN"));
        assert_eq!(refs[1].path, "rules[0].nested.lex_id");
    }

    #[test]
    fn test_collect_references_flags_non_scalar() {
        let refs = refs_of("a_lex_id: [x, y]\n");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].value.is_none());
    }

    #[test]
    fn test_is_reference_key() {
        assert!(is_reference_key("lex_id", "_lex_id"));
        assert!(is_reference_key("lemma_lex_id", "_lex_id"));
        assert!(!is_reference_key("lex_identity", "_lex_id"));
        assert!(!is_reference_key("lexid", "_lex_id"));
        assert!(is_reference_key("lex_id", "_ref"));
        assert!(is_reference_key("lemma_ref", "_ref"));
        assert!(!is_reference_key("lemma_lex_id", "_ref"));
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    const INDEX: &str = "schema_version: '1'\nentries:\n  LEX.VERB.GEHEN:\n    lemma: gehen\n    category: verb\n    source_file: lexicon/verbs.yaml\n";
    const VERBS: &str = "- lemma: gehen\n  category: verb\n  lex_id: LEX.VERB.GEHEN\n";

    #[test]
    fn test_consistent_tree_passes() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/index.yaml", INDEX);
        write(tmp.path(), "lexicon/verbs.yaml", VERBS);
        write(
            tmp.path(),
            "morphology/conjugation_tables.yaml",
            "- lemma: gehen\n  lemma_lex_id: LEX.VERB.GEHEN\n- lemma: laufen\n",
        );
        let tree = RuleTree::with_root(tmp.path());
        let report = validate_tree(&tree, &ValidatorConfig::default()).unwrap();
        assert!(report.passed(), "{:?}", report.issues);
        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.references_checked, 2);
        assert_eq!(report.files_with_references, 2);
    }

    #[test]
    fn test_custom_suffix_still_reads_declared_ids() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/index.yaml", INDEX);
        write(tmp.path(), "lexicon/verbs.yaml", VERBS);
        write(tmp.path(), "grammar/rules.yaml", "subject_ref: LEX.VERB.GEHEN
");
        let tree = RuleTree::with_root(tmp.path());
        let options = ValidatorConfig {
            reference_suffix: "_ref".to_string(),
            ..ValidatorConfig::default()
        };
        let report = validate_tree(&tree, &options).unwrap();
        assert!(report.passed(), "{:?}", report.issues);
        assert_eq!(report.references_checked, 2);
    }

    #[test]
    fn test_index_entry_missing_from_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/index.yaml", INDEX);
        write(
            tmp.path(),
            "lexicon/verbs.yaml",
            "- lemma: laufen\n  category: verb\n  lex_id: LEX.VERB.LAUFEN\n",
        );
        let tree = RuleTree::with_root(tmp.path());
        let report = validate_tree(&tree, &ValidatorConfig::default()).unwrap();
        assert_eq!(report.issues.len(), 2, "{:?}", report.issues);

        let stale: Vec<_> = report.issues_of(IssueKind::StaleIndexEntry).collect();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].lex_id.as_deref(), Some("LEX.VERB.GEHEN"));
        assert_eq!(stale[0].file, "lexicon/index.yaml");
        assert_eq!(stale[0].location, "entries.LEX.VERB.GEHEN");

        let orphan = report.issues_of(IssueKind::OrphanedReference).next().unwrap();
        assert_eq!(orphan.lex_id.as_deref(), Some("LEX.VERB.LAUFEN"));
        assert_eq!(orphan.file, "lexicon/verbs.yaml");
    }

    #[test]
    fn test_reports_every_issue() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "lexicon/index.yaml",
            &format!(
                "{INDEX}  LEX.NOUN.HUND:\n    lemma: Hund\n    category: noun\n    source_file: lexicon/nouns.yaml\n"
            ),
        );
        write(
            tmp.path(),
            "lexicon/verbs.yaml",
            "- lemma: gehen\n  category: verb\n  lex_id: LEX.VERB.GEHEN\n- lemma: laufen\n  category: verb\n",
        );
        write(tmp.path(), "grammar/rules.yaml", "example_lex_id: LEX.ADJ.NONE\n");
        write(tmp.path(), "grammar/broken.yaml", "key: [unclosed\n");

        let tree = RuleTree::with_root(tmp.path());
        let report = validate_tree(&tree, &ValidatorConfig::default()).unwrap();
        let counts = report.counts_by_kind();
        assert_eq!(counts.get(&IssueKind::MalformedInput), Some(&1));
        assert_eq!(counts.get(&IssueKind::OrphanedReference), Some(&1));
        assert_eq!(counts.get(&IssueKind::MissingIdentifier), Some(&1));
        assert_eq!(counts.get(&IssueKind::StaleIndexEntry), Some(&1));

        let broken = report.issues_of(IssueKind::MalformedInput).next().unwrap();
        assert_eq!(broken.file, "grammar/broken.yaml");
        assert!(broken.location.starts_with("line "));
        let orphan = report.issues_of(IssueKind::OrphanedReference).next().unwrap();
        assert_eq!(orphan.lex_id.as_deref(), Some("LEX.ADJ.NONE"));
        assert_eq!(orphan.location, "example_lex_id");
    }

    #[test]
    fn test_duplicate_lex_id_across_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/index.yaml", INDEX);
        write(tmp.path(), "lexicon/verbs.yaml", VERBS);
        write(
            tmp.path(),
            "lexicon/nouns.yaml",
            "- lemma: Gehen\n  category: noun\n  lex_id: LEX.VERB.GEHEN\n",
        );
        let tree = RuleTree::with_root(tmp.path());
        let report = validate_tree(&tree, &ValidatorConfig::default()).unwrap();
        assert_eq!(report.issues_of(IssueKind::DuplicateKey).count(), 1);
    }

    #[test]
    fn test_missing_index_skips_reference_checks() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/verbs.yaml", VERBS);
        let tree = RuleTree::with_root(tmp.path());
        let report = validate_tree(&tree, &ValidatorConfig::default()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::MalformedInput);
        assert_eq!(report.issues[0].file, "lexicon/index.yaml");
        assert_eq!(report.files_scanned, 1);
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lexicon/index.yaml", INDEX);
        write(tmp.path(), "lexicon/verbs.yaml", VERBS);
        write(tmp.path(), "drafts/wip.yaml", "x_lex_id: NOPE\n");
        let tree = RuleTree::with_root(tmp.path());
        let options = ValidatorConfig {
            exclude: vec!["drafts/**".to_string()],
            ..ValidatorConfig::default()
        };
        let report = validate_tree(&tree, &options).unwrap();
        assert!(report.passed(), "{:?}", report.issues);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tree = RuleTree::with_root(tmp.path().join("absent"));
        let err = validate_tree(&tree, &ValidatorConfig::default()).unwrap_err();
        assert!(matches!(err, LexError::MissingInput { stage: "validate", .. }));
    }
}
