//! CLI binary for lexrule: build, identify, link, and validate the lexicon rule tree.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexrule_core::config::LexruleConfig;
use lexrule_pipeline::validator::ValidationReport;
use lexrule_pipeline::{PipelineContext, RunReport, Stage};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lexrule", about = "Lexicon rule-tree build pipeline")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the category files from the source spreadsheet
    Build,

    /// Assign stable lex_ids and write the index
    Assign,

    /// Attach lemma_lex_id to morphology tables
    Link,

    /// Check every identifier reference in the rule tree
    Validate {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run all stages in dependency order
    Run {
        /// Stage to start from: build, assign, link, validate
        #[arg(long, default_value = "build")]
        from: Stage,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show vocabulary statistics
    Stats {
        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge duplicate morphology tables
    DedupeMorphology,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let config = LexruleConfig::load(&project_root)?;
    let ctx = PipelineContext::new(&project_root, config);

    match cli.command {
        Commands::Build => cmd_build(&ctx),
        Commands::Assign => cmd_assign(&ctx),
        Commands::Link => cmd_link(&ctx),
        Commands::Validate { json } => cmd_validate(&ctx, json),
        Commands::Run { from, report } => cmd_run(&ctx, from, report.as_deref()),
        Commands::Stats { json } => cmd_stats(&ctx, json),
        Commands::DedupeMorphology => cmd_dedupe(&ctx),
    }
}

fn cmd_build(ctx: &PipelineContext) -> Result<()> {
    let report =
        lexrule_pipeline::builder::build_lexicon(&ctx.source_csv, &ctx.tree, &ctx.config.build)
            .context("build failed")?;

    eprintln!(
        "Built {} entries from {} rows.",
        report.total_entries(),
        report.rows_read
    );
    for (category, count) in &report.entries_per_category {
        eprintln!("  {:<14} {}", category.file_name(), count);
    }
    if report.duplicates_collapsed > 0 {
        eprintln!("  {} identical rows collapsed", report.duplicates_collapsed);
    }
    if report.verbs_annotated > 0 {
        eprintln!("  {} verbs annotated with a conjugation class", report.verbs_annotated);
    }
    for removed in &report.files_removed {
        eprintln!("  removed {removed}");
    }
    Ok(())
}

fn cmd_assign(ctx: &PipelineContext) -> Result<()> {
    let report =
        lexrule_pipeline::assigner::assign_identifiers(&ctx.tree).context("assign failed")?;

    eprintln!(
        "Assigned {} lex_ids ({} kept, {} new, {} retired).",
        report.entries,
        report.reused,
        report.minted.len(),
        report.newly_retired.len()
    );
    for id in &report.minted {
        eprintln!("  + {id}");
    }
    for id in &report.newly_retired {
        eprintln!("  - {id}");
    }
    Ok(())
}

fn cmd_link(ctx: &PipelineContext) -> Result<()> {
    let report = lexrule_pipeline::linker::link_morphology(&ctx.tree, &ctx.config.linker)
        .context("link failed")?;

    eprintln!(
        "Linked {}/{} morphology records in {} files.",
        report.linked, report.records, report.files
    );
    for skip in &report.skipped {
        println!(
            "SKIP: {}#{} {} ({:?})",
            skip.file,
            skip.position,
            skip.lemma.as_deref().unwrap_or("<no lemma>"),
            skip.reason
        );
    }
    Ok(())
}

fn print_validation(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for issue in &report.issues {
        println!("ERROR: {issue}");
    }
    if report.passed() {
        eprintln!("Rule tree is valid. No integrity issues found.");
        eprintln!(
            "  {} files, {} references, {} index entries",
            report.files_scanned, report.references_checked, report.index_entries
        );
    } else {
        eprintln!("\nFound {} integrity issue(s).", report.issues.len());
        for (kind, count) in report.counts_by_kind() {
            eprintln!("  {kind:<18} {count}");
        }
    }
    Ok(())
}

fn cmd_validate(ctx: &PipelineContext, json: bool) -> Result<()> {
    let report = lexrule_pipeline::validator::validate_tree(&ctx.tree, &ctx.config.validator)
        .context("validate failed")?;
    print_validation(&report, json)?;
    if !report.passed() {
        anyhow::bail!("validation failed with {} issue(s)", report.issues.len());
    }
    Ok(())
}

fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run report to {}", path.display()))
}

fn cmd_run(ctx: &PipelineContext, from: Stage, report_path: Option<&Path>) -> Result<()> {
    let mut report = lexrule_pipeline::pipeline::run(ctx, from);
    if let Some(path) = report_path {
        write_run_report(path, &report)?;
    }

    for outcome in &report.stages {
        eprintln!(
            "  {:<9} {:?} ({} ms)",
            outcome.stage.name(),
            outcome.status,
            outcome.duration_ms
        );
    }
    if let Some(err) = report.error.take() {
        let stage = report.failed_stage().unwrap_or(from);
        return Err(anyhow::Error::new(err).context(format!("stage {stage} failed")));
    }
    if let Some(validation) = &report.validate {
        print_validation(validation, false)?;
        if !validation.passed() {
            anyhow::bail!(
                "validation failed with {} issue(s)",
                validation.issues.len()
            );
        }
    }
    Ok(())
}

fn cmd_stats(ctx: &PipelineContext, json: bool) -> Result<()> {
    let stats = lexrule_pipeline::stats::collect_stats(&ctx.tree).context("stats failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Vocabulary coverage");
    println!("===================");
    println!("Total entries   : {}", stats.total_entries);
    println!("Unique lemmas   : {}", stats.unique_lemmas);
    println!("Function words  : {}", stats.function_words);
    println!();
    println!("By category:");
    for (category, count) in &stats.per_category {
        println!("  {:<14} {}", category.as_str(), count);
    }
    println!();
    println!(
        "Morphology links: {}/{} ({:.1}%)",
        stats.morphology_linked,
        stats.morphology_records,
        stats.morphology_coverage() * 100.0
    );
    Ok(())
}

fn cmd_dedupe(ctx: &PipelineContext) -> Result<()> {
    let report = lexrule_pipeline::dedupe::dedupe_morphology(&ctx.tree)
        .context("dedupe-morphology failed")?;
    eprintln!(
        "Deduped morphology tables: {} -> {} records in {} files.",
        report.before, report.after, report.files
    );
    for file in &report.files_written {
        eprintln!("  wrote {file}");
    }
    Ok(())
}
