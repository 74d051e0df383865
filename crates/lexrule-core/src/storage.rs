//! Rule-tree layout plus YAML read/write with atomic replacement.

use crate::category::Category;
use crate::config::PathsConfig;
use crate::error::{LexError, LexResult};
use crate::model::{LexiconEntry, LexiconIndex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

const INDEX_FILE: &str = "index.yaml";

/// Resolved locations inside one rule tree.
#[derive(Debug, Clone)]
pub struct RuleTree {
    root: PathBuf,
    lexicon_dir: PathBuf,
    morphology_dir: PathBuf,
    grammar_dir: PathBuf,
}

impl RuleTree {
    /// Layout for a project root using the configured paths.
    pub fn new(project_root: &Path, paths: &PathsConfig) -> Self {
        let root = project_root.join(&paths.rules_dir);
        Self {
            lexicon_dir: root.join(&paths.lexicon_dir),
            morphology_dir: root.join(&paths.morphology_dir),
            grammar_dir: root.join(&paths.grammar_dir),
            root,
        }
    }

    /// Default layout (`lexicon/`, `morphology/`, `grammar/`) under a rule tree root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = PathsConfig::default();
        Self {
            lexicon_dir: root.join(defaults.lexicon_dir),
            morphology_dir: root.join(defaults.morphology_dir),
            grammar_dir: root.join(defaults.grammar_dir),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lexicon_dir(&self) -> &Path {
        &self.lexicon_dir
    }

    pub fn morphology_dir(&self) -> &Path {
        &self.morphology_dir
    }

    pub fn grammar_dir(&self) -> &Path {
        &self.grammar_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.lexicon_dir.join(INDEX_FILE)
    }

    pub fn category_path(&self, category: Category) -> PathBuf {
        self.lexicon_dir.join(category.file_name())
    }

    /// Existing category files, in category order.
    pub fn existing_category_files(&self) -> Vec<(Category, PathBuf)> {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.category_path(c)))
            .filter(|(_, p)| p.is_file())
            .collect()
    }

    /// Morphology table files (`*.yaml`, `*.yml`), sorted by path.
    pub fn morphology_files(&self) -> LexResult<Vec<PathBuf>> {
        if !self.morphology_dir.is_dir() {
            return Ok(Vec::new());
        }
        let read = fs::read_dir(&self.morphology_dir)
            .map_err(|e| LexError::io(&self.morphology_dir, e))?;
        let mut files: Vec<PathBuf> = read
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && is_yaml(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Path relative to the tree root, `/`-separated, as stored in the index.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Inverse of [`RuleTree::relative`].
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

/// True for `.yaml` / `.yml` files.
pub fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

pub fn read_to_string(path: &Path) -> LexResult<String> {
    fs::read_to_string(path).map_err(|e| LexError::io(path, e))
}

/// Parse a YAML file into `T`. An empty document parses as `T::default()`.
pub fn read_yaml<T: DeserializeOwned + Default>(path: &Path) -> LexResult<T> {
    let text = read_to_string(path)?;
    parse_yaml(path, &text)
}

pub fn parse_yaml<T: DeserializeOwned + Default>(path: &Path, text: &str) -> LexResult<T> {
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(text).map_err(|e| LexError::from_yaml(path, &e))
}

/// Serialize a value to YAML text.
pub fn to_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> LexResult<String> {
    serde_yaml::to_string(value)
        .map_err(|e| LexError::malformed(path, "serialize", e.to_string()))
}

/// Replace `path` with `contents` through a temporary file in the same directory.
///
/// Readers see either the previous file or the complete new one, never a prefix.
pub fn write_atomic(path: &Path, contents: &str) -> LexResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| LexError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| LexError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| LexError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| LexError::io(path, e.error))?;
    tracing::debug!("wrote {}", path.display());
    Ok(())
}

/// A set of file replacements and removals applied together.
///
/// Everything is serialized before [`StagedWrites::commit`] touches the disk,
/// so a serialization failure leaves the previous tree in place.
#[derive(Debug, Default)]
pub struct StagedWrites {
    writes: Vec<(PathBuf, String)>,
    removals: Vec<PathBuf>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_yaml<T: Serialize + ?Sized>(&mut self, path: PathBuf, value: &T) -> LexResult<()> {
        let text = to_yaml(&path, value)?;
        self.writes.push((path, text));
        Ok(())
    }

    pub fn stage_removal(&mut self, path: PathBuf) {
        self.removals.push(path);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.removals.is_empty()
    }

    /// Persist every staged write, then apply removals. Returns the written paths.
    pub fn commit(self) -> LexResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.writes.len());
        for (path, text) in self.writes {
            write_atomic(&path, &text)?;
            written.push(path);
        }
        for path in self.removals {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(LexError::io(&path, e)),
            }
        }
        Ok(written)
    }
}

/// Load one category file, checking that every entry belongs to `expected`.
pub fn load_category_file(path: &Path, expected: Category) -> LexResult<Vec<LexiconEntry>> {
    let entries: Vec<LexiconEntry> = read_yaml(path)?;
    for (i, entry) in entries.iter().enumerate() {
        if entry.category != expected {
            return Err(LexError::malformed(
                path,
                format!("entry {}", i + 1),
                format!(
                    "entry '{}' has category {} but the file holds {}",
                    entry.lemma, entry.category, expected
                ),
            ));
        }
        if entry.lemma.trim().is_empty() {
            return Err(LexError::malformed(
                path,
                format!("entry {}", i + 1),
                "entry has an empty lemma",
            ));
        }
    }
    Ok(entries)
}

/// Load the index if present. `Ok(None)` means no index exists yet.
pub fn load_index(path: &Path) -> LexResult<Option<LexiconIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    read_yaml(path).map(Some)
}
