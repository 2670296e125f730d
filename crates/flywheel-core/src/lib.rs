//! Core types shared across the Flywheel workspace.
//!
//! This crate holds the data model (notes, typed front-matter values), the
//! error kinds every other crate reports, the configuration structs, and the
//! path handling rules: which files the engine watches, how vault-relative
//! paths are normalised, and how entity keys are folded for lookup.
//!
//! Nothing here performs I/O. Higher crates (`flywheel-parser`,
//! `flywheel-graph`, `flywheel-engine`) build on these types.

pub mod config;
pub mod error;
pub mod fold;
pub mod paths;
pub mod types;

pub use config::{
    AutolinkConfig, CategoryWeights, CommitConfig, EngineConfig, QueueConfig, SweepConfig,
};
pub use error::{Error, Result};
pub use fold::{fold_entity_key, link_resolution_key};
pub use paths::{is_watched_path, normalize_rel_path, note_title, validate_path};
pub use types::{EntityCategory, FieldMap, FieldValue, LineEnding, Note, Outlink};
