//! Lexicon build pipeline: four order-dependent phases over one rule tree.
//!
//! 1. [`builder`] regenerates the category files from the source spreadsheet.
//! 2. [`assigner`] attaches stable `lex_id`s and writes the index.
//! 3. [`linker`] annotates morphology tables with `lemma_lex_id`.
//! 4. [`validator`] checks that every identifier reference resolves.
//!
//! [`pipeline`] declares the stages and runs them in dependency order.
//! [`dedupe`] and [`stats`] are maintenance tools over the same tree.

pub mod assigner;
pub mod builder;
pub mod conjugation;
pub mod dedupe;
pub mod linker;
pub mod pipeline;
pub mod stats;
pub mod validator;

pub use pipeline::{PipelineContext, RunReport, Stage};
