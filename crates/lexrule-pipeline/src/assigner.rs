//! Identifier Assigner: stable `lex_id`s for every lexicon entry, plus the index.
//!
//! Identity is keyed on (lemma, category) and looked up in the previous
//! index before anything is minted, so entries keep their identifier across
//! rebuilds regardless of position or attribute changes. Minted identifiers
//! avoid everything the index ever issued, including retired ones.

use lexrule_core::Category;
use lexrule_core::error::{LexError, LexResult};
use lexrule_core::model::{IndexEntry, LexiconEntry, LexiconIndex};
use lexrule_core::normalize::base_lex_id;
use lexrule_core::storage::{self, RuleTree, StagedWrites};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Summary of one assigner run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignReport {
    pub entries: usize,
    pub reused: usize,
    pub minted: Vec<String>,
    /// Identifiers that lost their entry in this run.
    pub newly_retired: Vec<String>,
    pub files_written: Vec<String>,
}

/// Mints identifiers that were never issued before.
#[derive(Debug)]
pub struct IdMinter {
    issued: BTreeSet<String>,
}

impl IdMinter {
    pub fn new(issued: BTreeSet<String>) -> Self {
        Self { issued }
    }

    /// Next unissued identifier for the key: the base id, then `.2`, `.3`, ….
    pub fn mint(&mut self, category: Category, lemma: &str) -> String {
        let base = base_lex_id(category, lemma);
        let mut candidate = base.clone();
        let mut n = 2u32;
        while self.issued.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        self.issued.insert(candidate.clone());
        candidate
    }
}

/// (lemma, category) → lex_id view of an index.
fn key_lookup(
    index: &LexiconIndex,
    index_path: &std::path::Path,
) -> LexResult<HashMap<(String, Category), String>> {
    let mut lookup: HashMap<(String, Category), String> = HashMap::new();
    for (lex_id, entry) in &index.entries {
        let key = (entry.lemma.clone(), entry.category);
        if let Some(first) = lookup.get(&key) {
            return Err(LexError::DuplicateKey {
                lemma: entry.lemma.clone(),
                category: entry.category,
                first: format!("{}#{}", index_path.display(), first),
                second: format!("{}#{}", index_path.display(), lex_id),
            });
        }
        lookup.insert(key, lex_id.clone());
    }
    Ok(lookup)
}

/// Reject two entries with the same (lemma, category) across all category files.
pub fn check_unique_keys(files: &[(Category, PathBuf, Vec<LexiconEntry>)]) -> LexResult<()> {
    let mut seen: HashMap<(String, Category), String> = HashMap::new();
    for (_, path, entries) in files {
        for (i, entry) in entries.iter().enumerate() {
            let location = format!("{}#{}", path.display(), i + 1);
            if let Some(first) = seen.insert(entry.key(), location.clone()) {
                return Err(LexError::DuplicateKey {
                    lemma: entry.lemma.clone(),
                    category: entry.category,
                    first,
                    second: location,
                });
            }
        }
    }
    Ok(())
}

/// Run the assigner over the category files in `tree`.
pub fn assign_identifiers(tree: &RuleTree) -> LexResult<AssignReport> {
    if !tree.lexicon_dir().is_dir() {
        return Err(LexError::MissingInput {
            stage: "assign",
            path: tree.lexicon_dir().to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for (category, path) in tree.existing_category_files() {
        let entries = storage::load_category_file(&path, category)?;
        files.push((category, path, entries));
    }
    check_unique_keys(&files)?;

    let index_path = tree.index_path();
    let previous = storage::load_index(&index_path)?.unwrap_or_default();
    let lookup = key_lookup(&previous, &index_path)?;
    let mut minter = IdMinter::new(previous.issued());

    let mut report = AssignReport::default();
    let mut index = LexiconIndex {
        retired: previous.retired.clone(),
        ..LexiconIndex::default()
    };

    for (_, path, entries) in &mut files {
        let source_file = tree.relative(path.as_path());
        for entry in entries.iter_mut() {
            let lex_id = match lookup.get(&entry.key()) {
                Some(id) => {
                    report.reused += 1;
                    id.clone()
                }
                None => {
                    let id = minter.mint(entry.category, &entry.lemma);
                    tracing::debug!("minted {} for ({}, {})", id, entry.lemma, entry.category);
                    report.minted.push(id.clone());
                    id
                }
            };
            entry.lex_id = Some(lex_id.clone());
            index.entries.insert(
                lex_id,
                IndexEntry {
                    lemma: entry.lemma.clone(),
                    category: entry.category,
                    source_file: source_file.clone(),
                },
            );
        }
        report.entries += entries.len();
    }

    for lex_id in previous.entries.keys() {
        if !index.entries.contains_key(lex_id) {
            index.retired.insert(lex_id.clone());
            report.newly_retired.push(lex_id.clone());
        }
    }

    // Category files first, index last.
    let mut staged = StagedWrites::new();
    for (_, path, entries) in &files {
        staged.stage_yaml(path.clone(), entries)?;
        report.files_written.push(tree.relative(path));
    }
    staged.stage_yaml(index_path.clone(), &index)?;
    report.files_written.push(tree.relative(&index_path));
    staged.commit()?;

    tracing::info!(
        "assign: {} entries ({} reused, {} minted, {} retired)",
        report.entries,
        report.reused,
        report.minted.len(),
        report.newly_retired.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_minter_skips_issued() {
        let issued: BTreeSet<String> = ["LEX.VERB.GEHEN", "LEX.VERB.GEHEN.2"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut minter = IdMinter::new(issued);
        assert_eq!(minter.mint(Category::Verb, "gehen"), "LEX.VERB.GEHEN.3");
        assert_eq!(minter.mint(Category::Verb, "laufen"), "LEX.VERB.LAUFEN");
        assert_eq!(minter.mint(Category::Verb, "Laufen"), "LEX.VERB.LAUFEN.2");
    }

    fn tree_with(files: &[(Category, &str)]) -> (tempfile::TempDir, RuleTree) {
        let tmp = tempfile::tempdir().unwrap();
        let tree = RuleTree::with_root(tmp.path().join("rules"));
        fs::create_dir_all(tree.lexicon_dir()).unwrap();
        for (category, body) in files {
            fs::write(tree.category_path(*category), body).unwrap();
        }
        (tmp, tree)
    }

    #[test]
    fn test_assign_first_run() {
        let (_tmp, tree) = tree_with(&[
            (Category::Verb, "- lemma: gehen\n  category: verb\n"),
            (Category::Adjective, "- lemma: schnell\n  category: adjective\n"),
        ]);
        let report = assign_identifiers(&tree).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.reused, 0);
        assert_eq!(
            report.minted,
            vec!["LEX.VERB.GEHEN".to_string(), "LEX.ADJ.SCHNELL".to_string()]
        );

        let index = storage::load_index(&tree.index_path()).unwrap().unwrap();
        let entry = &index.entries["LEX.VERB.GEHEN"];
        assert_eq!(entry.source_file, "lexicon/verbs.yaml");
        let verbs = storage::load_category_file(&tree.category_path(Category::Verb), Category::Verb)
            .unwrap();
        assert_eq!(verbs[0].lex_id.as_deref(), Some("LEX.VERB.GEHEN"));
    }

    #[test]
    fn test_assign_rejects_duplicate_keys() {
        let (_tmp, tree) = tree_with(&[(
            Category::Verb,
            "- lemma: gehen\n  category: verb\n- lemma: gehen\n  category: verb\n",
        )]);
        let err = assign_identifiers(&tree).unwrap_err();
        assert!(matches!(err, LexError::DuplicateKey { .. }));
        assert!(!tree.index_path().exists());
    }

    #[test]
    fn test_assign_ignores_hand_written_lex_id() {
        let (_tmp, tree) = tree_with(&[(
            Category::Verb,
            "- lemma: gehen\n  category: verb\n  lex_id: MADE.UP\n",
        )]);
        assign_identifiers(&tree).unwrap();
        let index = storage::load_index(&tree.index_path()).unwrap().unwrap();
        assert!(index.contains("LEX.VERB.GEHEN"));
        assert!(!index.contains("MADE.UP"));
    }

    #[test]
    fn test_assign_corrupt_index_is_fatal() {
        let (_tmp, tree) = tree_with(&[(Category::Verb, "- lemma: gehen\n  category: verb\n")]);
        fs::write(tree.index_path(), "entries: {broken\n").unwrap();
        let err = assign_identifiers(&tree).unwrap_err();
        assert!(matches!(err, LexError::MalformedInput { .. }));
    }

    #[test]
    fn test_assign_missing_lexicon_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let tree = RuleTree::with_root(tmp.path().join("rules"));
        let err = assign_identifiers(&tree).unwrap_err();
        assert!(matches!(err, LexError::MissingInput { stage: "assign", .. }));
    }
}
