//! # skilltree-import
//!
//! CSV bulk import and export for the skilltree taxonomy.
//!
//! Taxonomy files use the columns `name, description, type, parent`; mapping
//! files use `Skill Name, Proficiency Description, Proficiency Level`. An
//! import runs in two phases: structural checks on the whole file, then a
//! row-by-row apply against a repository with progress callbacks, optional
//! pacing, and cooperative cancellation.
//!
//! ```rust,ignore
//! use skilltree_import::{CancelToken, ImportRunner};
//! use skilltree_store::MemoryRepository;
//!
//! let runner = ImportRunner::new(MemoryRepository::with_default_levels());
//! let report = runner
//!     .import_taxonomy(std::fs::File::open("taxonomy.csv")?, &CancelToken::new())
//!     .await?;
//! println!("{} created, {} errors", report.succeeded(), report.failed());
//! ```

pub mod codec;
pub mod report;
pub mod rules;
pub mod runner;

pub use codec::{
    export_mappings, export_taxonomy, mapping_template, parse_mapping_csv, parse_taxonomy_csv,
    repeated_names, taxonomy_template, MappingRow, Parsed, TaxonomyRow,
};
pub use report::{ImportPhase, ImportProgress, ImportReport, ImportedRow, RowError, RowOutcome};
pub use runner::{CancelToken, ImportRunner, ProgressCallback};
