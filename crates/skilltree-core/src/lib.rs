//! # skilltree-core
//!
//! Core types, validation rules, traits, and abstractions for the skilltree
//! skills taxonomy engine.
//!
//! This crate provides the data model (clusters, groups, skills, proficiency
//! levels and mappings, Inactive Bin entries), the pure validation engine,
//! the event bus, configuration, and the repository traits that the store
//! and import crates build on.
//!
//! ## Log level contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | State could not be loaded or saved |
//! | WARN  | Recoverable issue, import cancelled or row skipped |
//! | INFO  | Lifecycle events, completed mutations, import summaries |
//! | DEBUG | Decision points, validation rejections |
//! | TRACE | Per-row iteration |
//!
//! Spans carry `subsystem` (`store`, `import`) and `op` fields.

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod suggestions;
pub mod traits;
pub mod uuid_utils;
pub mod validation;

// Re-export commonly used types at crate root
pub use config::{ConfigError, SkilltreeConfig};
pub use error::{Error, Result};
pub use events::{EventActor, EventBus, EventEnvelope, TaxonomyEvent};
pub use models::*;
pub use suggestions::{SkillSuggestion, StaticSuggestionProvider, SuggestionProvider};
pub use traits::*;
pub use uuid_utils::new_v7;
pub use validation::{
    names_match, normalize_name, validate_node, NodeCandidate, ValidationError, ValidationRule,
};
