//! Centralized default constants for skilltree.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// TAXONOMY
// =============================================================================

/// Lowest legal sibling rank.
pub const MIN_RANK: u32 = 1;

/// Upper bound of every proficiency score band (lower bound is 0).
pub const MAX_SCORE: u8 = 100;

/// Actor recorded on inactivations when none is configured.
pub const DEFAULT_ACTOR: &str = "admin";

/// Global proficiency levels seeded into a fresh store:
/// `(title, description, min_score, max_score)` in display order.
pub const DEFAULT_LEVELS: [(&str, &str, u8, u8); 4] = [
    (
        "Beginner",
        "Understands the basic concepts and can perform simple tasks with guidance",
        0,
        25,
    ),
    (
        "Intermediate",
        "Works independently on common tasks and knows where to find help",
        26,
        50,
    ),
    (
        "Advanced",
        "Handles complex problems and mentors others",
        51,
        75,
    ),
    (
        "Expert",
        "Recognized authority who sets direction and best practices",
        76,
        100,
    ),
];

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for node listings.
pub const PAGE_LIMIT: usize = 50;

/// Default page offset.
pub const PAGE_OFFSET: usize = 0;

/// Default number of suggestions returned per skill.
pub const SUGGESTION_LIMIT: usize = 5;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer capacity of the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// IMPORT
// =============================================================================

/// Per-row delay used to animate import progress (0 = none).
pub const IMPORT_ROW_DELAY_MS: u64 = 0;

/// Header of the taxonomy import/export CSV.
pub const TAXONOMY_CSV_HEADER: [&str; 4] = ["name", "description", "type", "parent"];

/// Header of the proficiency mapping import/export CSV.
pub const MAPPING_CSV_HEADER: [&str; 3] =
    ["Skill Name", "Proficiency Description", "Proficiency Level"];

// =============================================================================
// STATE FILE
// =============================================================================

/// File name of the persisted state inside the data directory.
pub const STATE_FILE_NAME: &str = "skilltree-state.json";
