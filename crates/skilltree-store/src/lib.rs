//! # skilltree-store
//!
//! In-memory storage layer for skilltree.
//!
//! This crate provides:
//! - [`TaxonomyState`]: the synchronous node forest, proficiency levels and
//!   mappings, Inactive Bin, and merge history
//! - [`MemoryRepository`]: the async, event-publishing repository over a
//!   shared state, implementing the `skilltree-core` repository traits
//! - JSON state file persistence with atomic writes
//!
//! ## Example
//!
//! ```rust,ignore
//! use skilltree_store::{MemoryRepository, TaxonomyRepository, CreateNodeRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = MemoryRepository::with_default_levels();
//!     let cluster = repo
//!         .create(CreateNodeRequest::cluster("Data Science", "Data-driven work"))
//!         .await?;
//!     println!("Created cluster: {}", cluster.id);
//!     Ok(())
//! }
//! ```

mod inactive_bin;
mod merge;
mod proficiency;
pub mod repository;
pub mod snapshot;
pub mod state;

// Re-export core types
pub use skilltree_core::*;

pub use repository::MemoryRepository;
pub use snapshot::{load_state, save_state, PersistedState};
pub use state::TaxonomyState;
