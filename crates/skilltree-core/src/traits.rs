//! Core traits for skilltree abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy,
//! so callers (the import runner, the CLI) stay independent of the
//! in-memory implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// LISTING REQUESTS
// =============================================================================

/// Field to sort node listings by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSortField {
    #[default]
    Rank,
    Name,
    CreatedAt,
    Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Request for listing active nodes.
#[derive(Debug, Clone, Default)]
pub struct ListNodesRequest {
    /// Restrict to these kinds; empty means all.
    pub kinds: Vec<NodeKind>,
    /// Restrict to direct children of this node.
    pub parent_id: Option<Uuid>,
    /// Case-insensitive substring match on name or description.
    pub search: Option<String>,
    pub sort_by: NodeSortField,
    pub sort_order: SortOrder,
    /// Maximum results (defaults to [`crate::defaults::PAGE_LIMIT`]).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Response for listing nodes.
#[derive(Debug, Clone, Serialize)]
pub struct ListNodesResponse {
    pub nodes: Vec<TaxonomyNode>,
    /// Matches before pagination.
    pub total: usize,
}

/// Filter for Inactive Bin listings.
#[derive(Debug, Clone, Default)]
pub struct InactiveFilter {
    /// Multi-select on item type; empty means all.
    pub types: Vec<InactiveItemType>,
    /// Case-insensitive substring over name, description, and parent name.
    pub search: Option<String>,
}

impl InactiveFilter {
    pub fn matches(&self, item: &InactiveItem) -> bool {
        if !self.types.is_empty() && !self.types.contains(&item.item_type) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => {
                let q = q.to_lowercase();
                item.name.to_lowercase().contains(&q)
                    || item.description.to_lowercase().contains(&q)
                    || item
                        .parent_name
                        .as_deref()
                        .is_some_and(|p| p.to_lowercase().contains(&q))
            }
        }
    }
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for the taxonomy tree.
#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    /// Validate and insert a new node.
    async fn create(&self, req: CreateNodeRequest) -> Result<TaxonomyNode>;

    /// Validate and apply an edit.
    async fn update(&self, id: Uuid, req: UpdateNodeRequest) -> Result<TaxonomyNode>;

    /// Move a node from the active tree into the Inactive Bin.
    async fn inactivate(&self, id: Uuid) -> Result<InactiveItem>;

    /// Fetch a stored node, including one hidden under an inactive
    /// ancestor. `None` once the node itself has been inactivated.
    async fn get(&self, id: Uuid) -> Result<Option<TaxonomyNode>>;

    /// Active nodes of a kind with the given name (case-insensitive). Names
    /// are only unique among siblings, so several may match.
    async fn find_by_name(&self, kind: NodeKind, name: &str) -> Result<Vec<TaxonomyNode>>;

    /// Direct children of a node, ordered by rank.
    async fn children(&self, parent_id: Uuid) -> Result<Vec<TaxonomyNode>>;

    /// Nested view of the active tree, clusters first, ordered by rank.
    async fn tree(&self) -> Result<Vec<NodeTree>>;

    /// Filtered, sorted, paginated listing of nodes reachable in the active tree.
    async fn list(&self, req: ListNodesRequest) -> Result<ListNodesResponse>;

    /// Set the informational usage counters of a node.
    async fn record_usage(&self, id: Uuid, usage: UsageCounts) -> Result<TaxonomyNode>;

    /// Merge `source_id` into `target_id`.
    async fn merge(&self, source_id: Uuid, target_id: Uuid) -> Result<MergeRecord>;

    /// Merge records where the node was source or target.
    async fn merge_history(&self, id: Uuid) -> Result<Vec<MergeRecord>>;
}

/// Repository for soft-deleted items.
#[async_trait]
pub trait InactiveBinRepository: Send + Sync {
    /// Inactive items matching the filter, newest first.
    async fn list_inactive(&self, filter: InactiveFilter) -> Result<Vec<InactiveItem>>;

    /// Re-create the active record from an Inactive Bin entry.
    async fn restore(&self, inactive_item_id: Uuid) -> Result<RestoredItem>;

    /// Permanently discard an Inactive Bin entry.
    async fn purge(&self, inactive_item_id: Uuid) -> Result<InactiveItem>;
}

/// Repository for global proficiency levels and per-skill mappings.
#[async_trait]
pub trait ProficiencyRepository: Send + Sync {
    /// Global levels ordered by `order`.
    async fn list_levels(&self) -> Result<Vec<ProficiencyLevel>>;

    async fn get_level(&self, id: Uuid) -> Result<Option<ProficiencyLevel>>;

    /// Case-insensitive title lookup.
    async fn find_level_by_title(&self, title: &str) -> Result<Option<ProficiencyLevel>>;

    async fn create_level(&self, req: CreateLevelRequest) -> Result<ProficiencyLevel>;

    /// Edit a level; a title change propagates into every active mapping.
    async fn update_level(&self, id: Uuid, req: UpdateLevelRequest) -> Result<ProficiencyLevel>;

    async fn create_mapping(&self, req: CreateMappingRequest) -> Result<ProficiencyMapping>;

    async fn update_mapping(
        &self,
        id: Uuid,
        req: UpdateMappingRequest,
    ) -> Result<ProficiencyMapping>;

    /// Move a mapping into the Inactive Bin.
    async fn inactivate_mapping(&self, id: Uuid) -> Result<InactiveItem>;

    /// Active mappings, optionally restricted to one skill.
    async fn list_mappings(&self, skill_id: Option<Uuid>) -> Result<Vec<ProficiencyMapping>>;
}
