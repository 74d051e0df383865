//! Grammatical categories and the per-category conventions derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grammatical category of a vocabulary item.
///
/// Declaration order is the canonical processing order: category files are
/// written, read, and minted in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Article,
    Pronoun,
    Preposition,
    Conjunction,
    Particle,
    NumberTime,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Noun,
        Category::Verb,
        Category::Adjective,
        Category::Adverb,
        Category::Article,
        Category::Pronoun,
        Category::Preposition,
        Category::Conjunction,
        Category::Particle,
        Category::NumberTime,
        Category::Other,
    ];

    /// Name as written in rule files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Noun => "noun",
            Self::Verb => "verb",
            Self::Adjective => "adjective",
            Self::Adverb => "adverb",
            Self::Article => "article",
            Self::Pronoun => "pronoun",
            Self::Preposition => "preposition",
            Self::Conjunction => "conjunction",
            Self::Particle => "particle",
            Self::NumberTime => "number_time",
            Self::Other => "other",
        }
    }

    /// File name of the category's rule file inside the lexicon directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Noun => "nouns.yaml",
            Self::Verb => "verbs.yaml",
            Self::Adjective => "adjectives.yaml",
            Self::Adverb => "adverbs.yaml",
            Self::Article => "articles.yaml",
            Self::Pronoun => "pronouns.yaml",
            Self::Preposition => "prepositions.yaml",
            Self::Conjunction => "conjunctions.yaml",
            Self::Particle => "particles.yaml",
            Self::NumberTime => "numbers_time.yaml",
            Self::Other => "others.yaml",
        }
    }

    /// Reverse of [`Category::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.file_name() == name)
    }

    /// Middle segment of minted identifiers (`LEX.<prefix>.<token>`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Noun => "NOUN",
            Self::Verb => "VERB",
            Self::Adjective => "ADJ",
            Self::Adverb => "ADV",
            Self::Article => "ART",
            Self::Pronoun => "PRON",
            Self::Preposition => "PREP",
            Self::Conjunction => "CONJ",
            Self::Particle => "PART",
            Self::NumberTime => "TIME",
            Self::Other => "OTHER",
        }
    }

    /// Attribute used to order entries that share a case-folded lemma.
    pub fn tiebreak_attribute(self) -> Option<&'static str> {
        match self {
            Self::Noun => Some("gender"),
            Self::Verb => Some("infinitive"),
            _ => None,
        }
    }

    /// Content words; everything else counts as a function word in statistics.
    pub fn is_content_word(self) -> bool {
        matches!(self, Self::Noun | Self::Verb | Self::Adjective)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a category cell that names no known category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let category = match key.as_str() {
            "noun" => Self::Noun,
            "verb" => Self::Verb,
            "adjective" => Self::Adjective,
            "adverb" => Self::Adverb,
            "article" => Self::Article,
            "pronoun" => Self::Pronoun,
            "preposition" => Self::Preposition,
            "conjunction" => Self::Conjunction,
            "particle" => Self::Particle,
            "number_time" | "numbers_time" | "time_numbers" | "number/time" | "number"
            | "time" => Self::NumberTime,
            "other" | "others" => Self::Other,
            _ => return Err(UnknownCategory(s.trim().to_string())),
        };
        Ok(category)
    }
}
