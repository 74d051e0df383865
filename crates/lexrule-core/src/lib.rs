//! Core types and storage for the lexicon rule tree.
//!
//! Provides the grammatical category enum ([`category::Category`]), the lexicon,
//! index and morphology record types, lemma canonicalization, the error taxonomy
//! shared by every pipeline phase, project configuration, and atomic YAML
//! persistence for the rule tree.

pub mod category;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod storage;

pub use category::Category;
pub use error::{LexError, LexResult};
