//! Project configuration for the lexicon pipeline.
//!
//! Load order: `lexrule.toml` → environment variables → defaults.

use crate::category::Category;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "lexrule.toml";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexruleConfig {
    pub paths: PathsConfig,
    pub build: BuildConfig,
    pub linker: LinkerConfig,
    pub validator: ValidatorConfig,
}

/// Input and rule-tree locations, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The authoritative spreadsheet (CSV).
    pub source_csv: PathBuf,
    /// Root of the rule tree.
    pub rules_dir: PathBuf,
    /// Category files and the index, relative to `rules_dir`.
    pub lexicon_dir: PathBuf,
    /// Morphology tables, relative to `rules_dir`.
    pub morphology_dir: PathBuf,
    /// Grammar rule files, relative to `rules_dir`.
    pub grammar_dir: PathBuf,
}

/// Lexicon builder options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Attach `conjugation_class` to verbs from the grammar sample-lemma lists.
    pub annotate_conjugation: bool,
}

/// Morphology linker options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Categories tried first when a morphology record carries no category hint.
    pub preferred_categories: Vec<Category>,
}

/// Integrity validator options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Field-name suffix marking an identifier reference (`lex_id` itself always counts).
    pub reference_suffix: String,
    /// Glob patterns (relative to `rules_dir`) of files the validator skips.
    pub exclude: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_csv: PathBuf::from("source/lexicon.csv"),
            rules_dir: PathBuf::from("rules"),
            lexicon_dir: PathBuf::from("lexicon"),
            morphology_dir: PathBuf::from("morphology"),
            grammar_dir: PathBuf::from("grammar"),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            annotate_conjugation: true,
        }
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            preferred_categories: vec![
                Category::Verb,
                Category::Noun,
                Category::Adjective,
                Category::Adverb,
            ],
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reference_suffix: "_lex_id".to_string(),
            exclude: Vec::new(),
        }
    }
}

impl ValidatorConfig {
    /// Compile `exclude` into a matcher.
    pub fn exclude_set(&self) -> Result<GlobSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            builder.add(Glob::new(pattern)?);
        }
        builder.build()
    }
}

/// Helper to read an env var into a config field.
fn env_override<T: From<String>>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && !v.is_empty()
    {
        *target = T::from(v);
    }
}

impl LexruleConfig {
    /// Load config from `lexrule.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);

        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        // Environment variable overrides
        env_override("LEXRULE_SOURCE_CSV", &mut config.paths.source_csv);
        env_override("LEXRULE_RULES_DIR", &mut config.paths.rules_dir);
        env_override(
            "LEXRULE_REFERENCE_SUFFIX",
            &mut config.validator.reference_suffix,
        );

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.validator.reference_suffix.trim().is_empty() {
            anyhow::bail!("validator.reference_suffix must not be empty");
        }
        self.validator
            .exclude_set()
            .context("invalid validator.exclude glob")?;
        Ok(())
    }
}
