//! Stage graph and the combined run.
//!
//! Each stage declares what it reads and writes and which stages must have
//! run before it. `run` walks the graph in dependency order from a chosen
//! starting stage and stops at the first failure.

use crate::assigner::{AssignReport, assign_identifiers};
use crate::builder::{BuildReport, build_lexicon};
use crate::linker::{LinkReport, link_morphology};
use crate::validator::{ValidationReport, validate_tree};
use chrono::{DateTime, Utc};
use lexrule_core::config::LexruleConfig;
use lexrule_core::error::{LexError, LexResult};
use lexrule_core::storage::RuleTree;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Assign,
    Link,
    Validate,
}

impl Stage {
    /// Topological order: every stage appears after its dependencies.
    pub const ALL: [Stage; 4] = [Stage::Build, Stage::Assign, Stage::Link, Stage::Validate];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Assign => "assign",
            Stage::Link => "link",
            Stage::Validate => "validate",
        }
    }

    pub fn depends_on(self) -> &'static [Stage] {
        match self {
            Stage::Build => &[],
            Stage::Assign => &[Stage::Build],
            Stage::Link => &[Stage::Assign],
            Stage::Validate => &[Stage::Build, Stage::Assign, Stage::Link],
        }
    }

    /// Paths that must exist before the stage can start.
    pub fn inputs(self, ctx: &PipelineContext) -> Vec<PathBuf> {
        match self {
            Stage::Build => vec![ctx.source_csv.clone()],
            Stage::Assign => vec![ctx.tree.lexicon_dir().to_path_buf()],
            Stage::Link | Stage::Validate => vec![ctx.tree.index_path()],
        }
    }

    /// Paths the stage may rewrite. Validate is read-only.
    pub fn outputs(self, ctx: &PipelineContext) -> Vec<PathBuf> {
        match self {
            Stage::Build => vec![ctx.tree.lexicon_dir().to_path_buf()],
            Stage::Assign => vec![ctx.tree.lexicon_dir().to_path_buf(), ctx.tree.index_path()],
            Stage::Link => vec![ctx.tree.morphology_dir().to_path_buf()],
            Stage::Validate => Vec::new(),
        }
    }

    /// `self` and every stage downstream of it, in execution order.
    pub fn plan_from(self) -> Vec<Stage> {
        let mut plan: Vec<Stage> = Vec::new();
        for stage in Stage::ALL {
            if stage == self || stage.depends_on().iter().any(|d| plan.contains(d)) {
                plan.push(stage);
            }
        }
        plan
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown stage '{s}' (expected build, assign, link or validate)")
            })
    }
}

/// Resolved project paths and settings shared by all stages.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub project_root: PathBuf,
    pub config: LexruleConfig,
    pub tree: RuleTree,
    pub source_csv: PathBuf,
}

impl PipelineContext {
    pub fn new(project_root: &Path, config: LexruleConfig) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            tree: RuleTree::new(project_root, &config.paths),
            source_csv: project_root.join(&config.paths.source_csv),
            config,
        }
    }

    /// Fail with `MissingInput` unless every declared input of `stage` exists.
    pub fn check_inputs(&self, stage: Stage) -> LexResult<()> {
        for path in stage.inputs(self) {
            if !path.exists() {
                return Err(LexError::MissingInput {
                    stage: stage.name(),
                    path,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of a combined run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub from: Stage,
    pub stages: Vec<StageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign: Option<AssignReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidationReport>,
    /// The error that stopped the run, if any.
    #[serde(skip)]
    pub error: Option<LexError>,
}

impl RunReport {
    fn new(from: Stage) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            from,
            stages: Vec::new(),
            build: None,
            assign: None,
            link: None,
            validate: None,
            error: None,
        }
    }

    /// Every planned stage completed and validation found nothing.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.validate.as_ref().is_none_or(ValidationReport::passed)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
            .map(|s| s.stage)
    }
}

fn execute(ctx: &PipelineContext, stage: Stage, report: &mut RunReport) -> LexResult<()> {
    match stage {
        Stage::Build => {
            report.build = Some(build_lexicon(
                &ctx.source_csv,
                &ctx.tree,
                &ctx.config.build,
            )?);
        }
        Stage::Assign => report.assign = Some(assign_identifiers(&ctx.tree)?),
        Stage::Link => report.link = Some(link_morphology(&ctx.tree, &ctx.config.linker)?),
        Stage::Validate => {
            report.validate = Some(validate_tree(&ctx.tree, &ctx.config.validator)?);
        }
    }
    Ok(())
}

/// Run `from` and everything downstream of it.
///
/// Stops at the first stage that returns an error; later stages are not
/// attempted. A validation report with issues does not count as a stage
/// failure, but makes [`RunReport::succeeded`] false.
pub fn run(ctx: &PipelineContext, from: Stage) -> RunReport {
    let mut report = RunReport::new(from);

    for stage in from.plan_from() {
        let started = Instant::now();
        tracing::info!("stage {stage}: starting");
        let result = ctx
            .check_inputs(stage)
            .and_then(|()| execute(ctx, stage, &mut report));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => report.stages.push(StageOutcome {
                stage,
                status: StageStatus::Complete,
                duration_ms,
                error: None,
            }),
            Err(e) => {
                tracing::error!("stage {stage} failed: {e}");
                report.stages.push(StageOutcome {
                    stage,
                    status: StageStatus::Failed,
                    duration_ms,
                    error: Some(e.to_string()),
                });
                report.error = Some(e);
                break;
            }
        }
    }

    report.finished_at = Utc::now();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_topological() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            for dep in stage.depends_on() {
                let pos = Stage::ALL.iter().position(|s| s == dep).unwrap();
                assert!(pos < i, "{dep} must precede {stage}");
            }
        }
    }

    #[test]
    fn test_plan_from() {
        assert_eq!(Stage::Build.plan_from(), Stage::ALL.to_vec());
        assert_eq!(Stage::Link.plan_from(), vec![Stage::Link, Stage::Validate]);
        assert_eq!(Stage::Validate.plan_from(), vec![Stage::Validate]);
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("Assign".parse::<Stage>().unwrap(), Stage::Assign);
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn test_check_inputs_reports_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::new(tmp.path(), LexruleConfig::default());
        let err = ctx.check_inputs(Stage::Build).unwrap_err();
        assert!(matches!(err, LexError::MissingInput { stage: "build", .. }));
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::new(tmp.path(), LexruleConfig::default());
        let report = run(&ctx, Stage::Build);
        assert!(!report.succeeded());
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.failed_stage(), Some(Stage::Build));
        assert!(report.build.is_none());
        assert!(report.finished_at >= report.started_at);
    }
}
