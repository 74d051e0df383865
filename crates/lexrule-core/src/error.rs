//! Error taxonomy shared by the pipeline phases.

use crate::category::Category;
use std::path::PathBuf;

/// Errors that abort a pipeline phase.
///
/// Integrity problems found by the validator are not errors of this type;
/// they are collected into a report so that every violation is listed.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    /// A source row or rule file cannot be read into the expected shape.
    #[error("malformed input at {}:{location}: {message}", file.display())]
    MalformedInput {
        file: PathBuf,
        location: String,
        message: String,
    },
    /// Two entries share a (lemma, category) key where uniqueness is required.
    #[error("duplicate key ({lemma}, {category}) at {first} and {second}")]
    DuplicateKey {
        lemma: String,
        category: Category,
        first: String,
        second: String,
    },
    /// A stage was started before the stage producing its input ran.
    #[error("{stage} requires {} (run the preceding stage first)", path.display())]
    MissingInput { stage: &'static str, path: PathBuf },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type LexResult<T> = Result<T, LexError>;

impl LexError {
    pub fn malformed(
        file: impl Into<PathBuf>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedInput {
            file: file.into(),
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a YAML parse failure, keeping the line/column when serde_yaml reports one.
    pub fn from_yaml(file: impl Into<PathBuf>, err: &serde_yaml::Error) -> Self {
        Self::malformed(file, yaml_location(err), err.to_string())
    }
}

/// `line N, column M` for a YAML error, or `document` when no position is known.
pub fn yaml_location(err: &serde_yaml::Error) -> String {
    match err.location() {
        Some(loc) => format!("line {}, column {}", loc.line(), loc.column()),
        None => "document".to_string(),
    }
}
