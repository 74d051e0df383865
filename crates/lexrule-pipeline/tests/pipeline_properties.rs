//! End-to-end properties of the four-stage pipeline on scratch projects.

use lexrule_core::Category;
use lexrule_core::config::LexruleConfig;
use lexrule_core::error::LexError;
use lexrule_core::model::{LexiconEntry, LexiconIndex, MorphologyRecord};
use lexrule_core::storage;
use lexrule_pipeline::pipeline::run;
use lexrule_pipeline::validator::{IssueKind, validate_tree};
use lexrule_pipeline::{PipelineContext, Stage};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

const BASE_CSV: &str = "lemma,category,gender,plural\ngehen,verb,,\nschnell,adjective,,\n";
const TABLES: &str = "- lemma: gehen\n  table_id: T1\n  forms:\n    ich: gehe\n- lemma_guess: laufen\n  table_id: T2\n  forms:\n    ich: laufe\n";

fn project(csv: &str) -> (TempDir, PipelineContext) {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("source")).unwrap();
    fs::write(tmp.path().join("source/lexicon.csv"), csv).unwrap();
    fs::create_dir_all(tmp.path().join("rules/morphology")).unwrap();
    fs::write(
        tmp.path().join("rules/morphology/conjugation_tables.yaml"),
        TABLES,
    )
    .unwrap();
    let ctx = PipelineContext::new(tmp.path(), LexruleConfig::default());
    (tmp, ctx)
}

fn set_csv(ctx: &PipelineContext, csv: &str) {
    fs::write(&ctx.source_csv, csv).unwrap();
}

fn run_all(ctx: &PipelineContext) {
    let report = run(ctx, Stage::Build);
    assert!(
        report.succeeded(),
        "run failed: {:?} {:?}",
        report.error,
        report.validate.as_ref().map(|v| &v.issues)
    );
}

fn index(ctx: &PipelineContext) -> LexiconIndex {
    storage::load_index(&ctx.tree.index_path()).unwrap().unwrap()
}

fn id_for(index: &LexiconIndex, lemma: &str, category: Category) -> Option<String> {
    index
        .entries
        .iter()
        .find(|(_, e)| e.lemma == lemma && e.category == category)
        .map(|(id, _)| id.clone())
}

fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().display().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn second_run_is_byte_identical() {
    let (_tmp, ctx) = project(BASE_CSV);
    run_all(&ctx);
    let first = snapshot(ctx.tree.root());
    run_all(&ctx);
    let second = snapshot(ctx.tree.root());
    assert_eq!(first, second);
    assert!(first.contains_key("lexicon/index.yaml"));
}

#[test]
fn adding_a_row_keeps_existing_identifiers() {
    let (_tmp, ctx) = project(BASE_CSV);
    run_all(&ctx);
    let before = index(&ctx);

    set_csv(&ctx, &format!("{BASE_CSV}Hund,noun,m,Hunde\n"));
    run_all(&ctx);
    let after = index(&ctx);

    for (id, entry) in &before.entries {
        assert_eq!(after.entries.get(id), Some(entry), "{id} changed");
    }
    let new_ids: Vec<&String> = after
        .entries
        .keys()
        .filter(|id| !before.issued().contains(*id))
        .collect();
    assert_eq!(new_ids, vec!["LEX.NOUN.HUND"]);
}

#[test]
fn identifiers_and_keys_are_unique() {
    let (_tmp, ctx) = project(
        "lemma,category,gender\nEssen,noun,n\nessen,verb,\nSee,noun,m\nSee,noun,m\nsee,verb,\n",
    );
    run_all(&ctx);

    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for (category, path) in ctx.tree.existing_category_files() {
        let entries: Vec<LexiconEntry> = storage::load_category_file(&path, category).unwrap();
        for entry in entries {
            assert!(ids.insert(entry.lex_id.clone().unwrap()));
            assert!(keys.insert(entry.key()));
        }
    }
    assert_eq!(ids.len(), 4);
    assert_eq!(index(&ctx).entries.len(), 4);
}

#[test]
fn every_reference_resolves_after_a_clean_run() {
    let (_tmp, ctx) = project(BASE_CSV);
    fs::create_dir_all(ctx.tree.grammar_dir()).unwrap();
    fs::write(
        ctx.tree.grammar_dir().join("motion.yaml"),
        "rules:\n- id: R1\n  example_lex_id: LEX.VERB.GEHEN\n",
    )
    .unwrap();
    run_all(&ctx);

    let report = validate_tree(&ctx.tree, &ctx.config.validator).unwrap();
    assert!(report.passed());
    // Two category entries, one linked table, one grammar rule.
    assert_eq!(report.references_checked, 4);
}

#[test]
fn removed_then_readded_row_gets_a_new_identifier() {
    let (_tmp, ctx) = project(BASE_CSV);
    run_all(&ctx);
    let original = id_for(&index(&ctx), "schnell", Category::Adjective).unwrap();

    set_csv(&ctx, "lemma,category\ngehen,verb\n");
    run_all(&ctx);
    let removed = index(&ctx);
    assert!(id_for(&removed, "schnell", Category::Adjective).is_none());
    assert!(removed.retired.contains(&original));
    assert!(!ctx.tree.category_path(Category::Adjective).exists());

    set_csv(&ctx, BASE_CSV);
    run_all(&ctx);
    let readded = index(&ctx);
    let fresh = id_for(&readded, "schnell", Category::Adjective).unwrap();
    assert_ne!(fresh, original);
    assert_eq!(fresh, format!("{original}.2"));
    assert!(readded.retired.contains(&original));
}

#[test]
fn gehen_links_and_laufen_stays_unlinked() {
    let (_tmp, ctx) = project(BASE_CSV);
    let report = run(&ctx, Stage::Build);
    assert!(report.succeeded());

    let idx = index(&ctx);
    assert_eq!(idx.entries.len(), 2);
    let gehen = id_for(&idx, "gehen", Category::Verb).unwrap();
    let schnell = id_for(&idx, "schnell", Category::Adjective).unwrap();
    assert_ne!(gehen, schnell);

    let tables: Vec<MorphologyRecord> = storage::read_yaml(
        &ctx.tree.morphology_dir().join("conjugation_tables.yaml"),
    )
    .unwrap();
    assert_eq!(tables[0].lemma_lex_id.as_deref(), Some(gehen.as_str()));
    assert_eq!(tables[1].lemma_text(), Some("laufen"));
    assert!(tables[1].lemma_lex_id.is_none());

    let link = report.link.unwrap();
    assert_eq!(link.linked, 1);
    assert_eq!(link.skipped.len(), 1);
    assert_eq!(link.skipped[0].lemma.as_deref(), Some("laufen"));
    assert!(report.validate.unwrap().passed());
}

#[test]
fn index_entry_removed_by_hand_is_one_orphan() {
    let (_tmp, ctx) = project(BASE_CSV);
    run_all(&ctx);

    let mut idx = index(&ctx);
    let schnell = id_for(&idx, "schnell", Category::Adjective).unwrap();
    idx.entries.remove(&schnell);
    fs::write(ctx.tree.index_path(), serde_yaml::to_string(&idx).unwrap()).unwrap();

    let report = validate_tree(&ctx.tree, &ctx.config.validator).unwrap();
    assert_eq!(report.issues.len(), 1, "{:?}", report.issues);
    let issue = &report.issues[0];
    assert_eq!(issue.kind, IssueKind::OrphanedReference);
    assert_eq!(issue.lex_id.as_deref(), Some(schnell.as_str()));
    assert_eq!(issue.file, "lexicon/adjectives.yaml");
}

#[test]
fn failed_build_leaves_previous_tree_untouched() {
    let (_tmp, ctx) = project(BASE_CSV);
    run_all(&ctx);
    let before = snapshot(ctx.tree.root());

    set_csv(&ctx, "lemma,category,gender\nHund,noun,m\nHund,noun,f\n");
    let report = run(&ctx, Stage::Build);
    assert!(!report.succeeded());
    assert!(matches!(report.error, Some(LexError::DuplicateKey { .. })));
    assert_eq!(report.failed_stage(), Some(Stage::Build));
    assert_eq!(snapshot(ctx.tree.root()), before);
}

#[test]
fn run_from_link_requires_index() {
    let (_tmp, ctx) = project(BASE_CSV);
    let report = run(&ctx, Stage::Link);
    assert!(matches!(
        report.error,
        Some(LexError::MissingInput { stage: "link", .. })
    ));

    run_all(&ctx);
    let resumed = run(&ctx, Stage::Link);
    assert!(resumed.succeeded());
    assert!(resumed.build.is_none());
    assert_eq!(resumed.stages.len(), 2);
}
