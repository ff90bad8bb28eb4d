//! Synchronous taxonomy state.
//!
//! [`TaxonomyState`] owns every record of a taxonomy: the node forest, the
//! global proficiency levels, the per-skill mappings, the Inactive Bin and
//! the merge history. All state transitions are plain `&mut self` methods
//! that validate first and mutate only when every rule passes, so a failed
//! call leaves the state untouched.
//!
//! Inactivation does not cascade. A node whose parent sits in the Inactive
//! Bin stays in the store but is hidden from every traversal (see
//! [`TaxonomyState::orphans`]) until the parent is restored.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use skilltree_core::defaults::{MIN_RANK, PAGE_LIMIT, PAGE_OFFSET};
use skilltree_core::validation::{
    names_match, normalize_name, validate_node, NodeCandidate, ValidationError, ValidationRule,
};
use skilltree_core::{
    new_v7, CreateNodeRequest, Error, InactiveItem, InactiveSnapshot, ListNodesRequest,
    ListNodesResponse, MergeRecord, NodeKind, NodeSortField, NodeTree, Placement,
    ProficiencyLevel, ProficiencyMapping, RestorationSignal, Result, SortOrder, TaxonomyNode,
    UpdateNodeRequest, UsageCounts,
};

/// In-memory taxonomy.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyState {
    /// Nodes not in the Inactive Bin, keyed by id (v7 ids keep creation order).
    pub(crate) nodes: BTreeMap<Uuid, TaxonomyNode>,
    pub(crate) levels: Vec<ProficiencyLevel>,
    /// Active mappings only; inactive ones live in the bin snapshots.
    pub(crate) mappings: Vec<ProficiencyMapping>,
    pub(crate) inactive: Vec<InactiveItem>,
    pub(crate) merges: Vec<MergeRecord>,
    pub(crate) restoration: Option<RestorationSignal>,
}

impl TaxonomyState {
    /// Empty state without proficiency levels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty state seeded with the four default global levels.
    pub fn with_default_levels() -> Self {
        let mut state = Self::new();
        state.seed_default_levels();
        state
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Node by id, including nodes hidden under an inactive ancestor.
    pub fn get(&self, id: Uuid) -> Option<&TaxonomyNode> {
        self.nodes.get(&id)
    }

    /// Whether the node and all its ancestors are active.
    pub fn is_visible(&self, id: Uuid) -> bool {
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            match node.parent_id() {
                None => return true,
                Some(parent_id) => current = self.nodes.get(&parent_id),
            }
        }
        false
    }

    pub(crate) fn visible_node(&self, id: Uuid) -> Option<&TaxonomyNode> {
        self.nodes.get(&id).filter(|_| self.is_visible(id))
    }

    /// Active nodes of `kind` under `parent_id` (all clusters when `None`).
    pub(crate) fn siblings(&self, kind: NodeKind, parent_id: Option<Uuid>) -> Vec<&TaxonomyNode> {
        self.nodes
            .values()
            .filter(|n| n.kind() == kind && n.parent_id() == parent_id)
            .collect()
    }

    pub(crate) fn next_rank(&self, kind: NodeKind, parent_id: Option<Uuid>) -> u32 {
        self.siblings(kind, parent_id)
            .iter()
            .map(|n| n.rank)
            .max()
            .map_or(MIN_RANK, |r| r.saturating_add(1))
    }

    /// Direct children of a node, ordered by rank.
    pub fn children(&self, parent_id: Uuid) -> Vec<&TaxonomyNode> {
        let mut children: Vec<_> = self
            .nodes
            .values()
            .filter(|n| n.parent_id() == Some(parent_id))
            .collect();
        children.sort_by_key(|n| n.rank);
        children
    }

    /// Active clusters ordered by rank.
    pub fn roots(&self) -> Vec<&TaxonomyNode> {
        let mut roots = self.siblings(NodeKind::Cluster, None);
        roots.sort_by_key(|n| n.rank);
        roots
    }

    /// Nested view of the visible tree.
    pub fn tree(&self) -> Vec<NodeTree> {
        self.roots().into_iter().map(|n| self.subtree(n)).collect()
    }

    fn subtree(&self, node: &TaxonomyNode) -> NodeTree {
        NodeTree {
            node: node.clone(),
            children: self
                .children(node.id)
                .into_iter()
                .map(|c| self.subtree(c))
                .collect(),
        }
    }

    /// Nodes hidden because an ancestor is in the Inactive Bin.
    pub fn orphans(&self) -> Vec<&TaxonomyNode> {
        self.nodes
            .values()
            .filter(|n| !self.is_visible(n.id))
            .collect()
    }

    /// Visible nodes of `kind` whose name matches (case-insensitive).
    pub fn find_by_name(&self, kind: NodeKind, name: &str) -> Vec<&TaxonomyNode> {
        self.nodes
            .values()
            .filter(|n| n.kind() == kind && names_match(&n.name, name) && self.is_visible(n.id))
            .collect()
    }

    /// Filtered, sorted, paginated listing of visible nodes.
    pub fn list(&self, req: &ListNodesRequest) -> ListNodesResponse {
        let query = req
            .search
            .as_deref()
            .map(normalize_name)
            .filter(|q| !q.is_empty());

        let mut matches: Vec<&TaxonomyNode> = self
            .nodes
            .values()
            .filter(|n| req.kinds.is_empty() || req.kinds.contains(&n.kind()))
            .filter(|n| req.parent_id.is_none() || n.parent_id() == req.parent_id)
            .filter(|n| match &query {
                Some(q) => {
                    n.name.to_lowercase().contains(q.as_str())
                        || n.description.to_lowercase().contains(q.as_str())
                }
                None => true,
            })
            .filter(|n| self.is_visible(n.id))
            .collect();

        match req.sort_by {
            NodeSortField::Rank => matches.sort_by(|a, b| {
                a.kind()
                    .cmp(&b.kind())
                    .then(a.rank.cmp(&b.rank))
                    .then_with(|| normalize_name(&a.name).cmp(&normalize_name(&b.name)))
            }),
            NodeSortField::Name => {
                matches.sort_by_cached_key(|n| normalize_name(&n.name));
            }
            NodeSortField::CreatedAt => matches.sort_by_key(|n| (n.created_at, n.id)),
            NodeSortField::Usage => matches.sort_by_key(|n| n.usage_count()),
        }
        if req.sort_order == SortOrder::Desc {
            matches.reverse();
        }

        let total = matches.len();
        let nodes = matches
            .into_iter()
            .skip(req.offset.unwrap_or(PAGE_OFFSET))
            .take(req.limit.unwrap_or(PAGE_LIMIT))
            .cloned()
            .collect();
        ListNodesResponse { nodes, total }
    }

    /// Name of a node's parent, looking in the Inactive Bin when the parent
    /// is no longer active.
    pub(crate) fn parent_name(&self, parent_id: Option<Uuid>) -> Option<String> {
        let parent_id = parent_id?;
        if let Some(parent) = self.nodes.get(&parent_id) {
            return Some(parent.name.clone());
        }
        self.inactive.iter().find_map(|item| match &item.snapshot {
            InactiveSnapshot::Node(node) if node.id == parent_id => Some(node.name.clone()),
            _ => None,
        })
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Validate and insert a new node.
    pub fn create(&mut self, req: CreateNodeRequest) -> Result<TaxonomyNode> {
        let kind = req.placement.kind();
        let parent_id = req.placement.parent_id();
        let rank = req.rank.unwrap_or_else(|| self.next_rank(kind, parent_id));

        let candidate = NodeCandidate {
            id: None,
            name: &req.name,
            description: &req.description,
            rank,
            placement: &req.placement,
        };
        let parent = parent_id.and_then(|id| self.visible_node(id));
        let errors = validate_node(&candidate, &self.siblings(kind, parent_id), parent);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let now = Utc::now();
        let node = TaxonomyNode {
            id: new_v7(),
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            rank,
            is_active: true,
            placement: req.placement,
            usage: UsageCounts::default(),
            created_at: now,
            updated_at: now,
        };
        self.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    /// Validate and apply an edit. Kind and parent cannot change.
    pub fn update(&mut self, id: Uuid, patch: UpdateNodeRequest) -> Result<TaxonomyNode> {
        let current = self.nodes.get(&id).ok_or(Error::NodeNotFound(id))?;
        let renamed = patch
            .name
            .as_deref()
            .is_some_and(|n| n.trim() != current.name);
        let mut next = current.clone();
        let kind = next.kind();
        let mut errors = Vec::new();

        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = description.trim().to_string();
        }
        if let Some(rank) = patch.rank {
            next.rank = rank;
        }
        if let Some(levels) = patch.proficiency_levels {
            match &mut next.placement {
                Placement::Skill {
                    proficiency_levels, ..
                } => *proficiency_levels = levels,
                _ => errors.push(ValidationError::new(
                    "proficiencyLevels",
                    ValidationRule::NotApplicable,
                    format!("A {} cannot carry proficiency levels", kind),
                )),
            }
        }

        let parent = next.parent_id().and_then(|pid| self.visible_node(pid));
        errors.extend(validate_node(
            &NodeCandidate::from_node(&next),
            &self.siblings(kind, next.parent_id()),
            parent,
        ));
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let now = Utc::now();
        next.updated_at = now;
        if renamed && kind == NodeKind::Skill {
            for mapping in self.mappings.iter_mut().filter(|m| m.skill_id == id) {
                mapping.skill_name = next.name.clone();
                mapping.updated_at = now;
            }
        }
        self.nodes.insert(id, next.clone());
        Ok(next)
    }

    /// Move a node into the Inactive Bin. Children are left in place.
    pub fn inactivate(&mut self, id: Uuid, actor: &str) -> Result<InactiveItem> {
        let mut node = self.nodes.remove(&id).ok_or(Error::NodeNotFound(id))?;
        node.is_active = false;
        Ok(self.bin_node(node, actor))
    }

    /// Set the informational usage counters of a node.
    pub fn record_usage(&mut self, id: Uuid, usage: UsageCounts) -> Result<TaxonomyNode> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.usage = usage;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Last restore performed, if any.
    pub fn restoration_signal(&self) -> Option<&RestorationSignal> {
        self.restoration.as_ref()
    }

    /// Number of nodes outside the Inactive Bin, hidden ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skilltree_core::SkillLevel;

    fn seeded() -> (TaxonomyState, TaxonomyNode, TaxonomyNode, TaxonomyNode) {
        let mut state = TaxonomyState::new();
        let cluster = state
            .create(CreateNodeRequest::cluster("Data Science", "Data-driven work"))
            .unwrap();
        let group = state
            .create(CreateNodeRequest::group(
                cluster.id,
                "Machine Learning",
                "ML methods",
            ))
            .unwrap();
        let skill = state
            .create(CreateNodeRequest::skill(
                group.id,
                "Python for ML",
                "Python in ML workflows",
            ))
            .unwrap();
        (state, cluster, group, skill)
    }

    #[test]
    fn test_create_assigns_next_rank() {
        let mut state = TaxonomyState::new();
        let a = state
            .create(CreateNodeRequest::cluster("Engineering", "Build things"))
            .unwrap();
        let b = state
            .create(CreateNodeRequest::cluster("Design", "Shape things"))
            .unwrap();
        assert_eq!(a.rank, 1);
        assert_eq!(b.rank, 2);

        let c = state
            .create(CreateNodeRequest::cluster("Sales", "Sell things").with_rank(10))
            .unwrap();
        assert_eq!(c.rank, 10);
        let d = state
            .create(CreateNodeRequest::cluster("Support", "Help people"))
            .unwrap();
        assert_eq!(d.rank, 11);
    }

    #[test]
    fn test_create_trims_fields() {
        let mut state = TaxonomyState::new();
        let node = state
            .create(CreateNodeRequest::cluster("  Design ", " Visual work  "))
            .unwrap();
        assert_eq!(node.name, "Design");
        assert_eq!(node.description, "Visual work");
    }

    #[test]
    fn test_create_rejects_wrong_parent_kind() {
        let (mut state, cluster, _, _) = seeded();
        let err = state
            .create(CreateNodeRequest::skill(cluster.id, "SQL", "Queries"))
            .unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations[0].rule, ValidationRule::IllegalParent);
        assert_eq!(state.node_count(), 3);
    }

    #[test]
    fn test_same_name_allowed_under_different_parents() {
        let (mut state, cluster, group, _) = seeded();
        let other = state
            .create(CreateNodeRequest::group(cluster.id, "Statistics", "Stats"))
            .unwrap();
        state
            .create(CreateNodeRequest::skill(other.id, "Python for ML", "Also here"))
            .unwrap();
        assert_eq!(state.find_by_name(NodeKind::Skill, "python for ml").len(), 2);
        assert_eq!(state.children(group.id).len(), 1);
    }

    #[test]
    fn test_update_applies_patch() {
        let (mut state, _, _, skill) = seeded();
        let updated = state
            .update(
                skill.id,
                UpdateNodeRequest {
                    description: Some("Applied Python".to_string()),
                    proficiency_levels: Some(vec![SkillLevel::new(
                        "Beginner", "Basics", 0, 40, 1,
                    )]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.description, "Applied Python");
        assert_eq!(updated.proficiency_levels().len(), 1);
        assert_eq!(updated.name, skill.name);
    }

    #[test]
    fn test_update_levels_on_group_not_applicable() {
        let (mut state, _, group, _) = seeded();
        let err = state
            .update(
                group.id,
                UpdateNodeRequest {
                    proficiency_levels: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::NotApplicable
        );
    }

    #[test]
    fn test_update_rank_collision_rejected() {
        let (mut state, cluster, _, _) = seeded();
        let stats = state
            .create(CreateNodeRequest::group(cluster.id, "Statistics", "Stats"))
            .unwrap();
        let err = state
            .update(
                stats.id,
                UpdateNodeRequest {
                    rank: Some(1),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::DuplicateRank
        );
        assert_eq!(state.get(stats.id).unwrap().rank, 2);
    }

    #[test]
    fn test_update_unknown_node() {
        let mut state = TaxonomyState::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            state.update(id, UpdateNodeRequest::default()),
            Err(Error::NodeNotFound(x)) if x == id
        ));
    }

    #[test]
    fn test_inactivate_hides_subtree_without_cascade() {
        let (mut state, cluster, group, skill) = seeded();
        let item = state.inactivate(group.id, "admin").unwrap();
        assert_eq!(item.parent_name.as_deref(), Some("Data Science"));

        // The skill is still stored but hidden.
        assert!(state.get(skill.id).is_some());
        assert!(!state.is_visible(skill.id));
        assert_eq!(state.orphans().len(), 1);
        assert!(state.children(cluster.id).is_empty());
        assert_eq!(state.tree()[0].node_count(), 1);
        assert!(state
            .find_by_name(NodeKind::Skill, "Python for ML")
            .is_empty());
    }

    #[test]
    fn test_tree_nests_by_rank() {
        let (mut state, cluster, _, _) = seeded();
        state
            .create(CreateNodeRequest::group(cluster.id, "Analytics", "BI").with_rank(5))
            .unwrap();
        let tree = state.tree();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].node_count(), 4);
        let names: Vec<_> = tree[0].children.iter().map(|c| c.node.name.as_str()).collect();
        assert_eq!(names, vec!["Machine Learning", "Analytics"]);
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let (state, _, _, _) = seeded();
        let all = state.list(&ListNodesRequest::default());
        assert_eq!(all.total, 3);
        assert_eq!(all.nodes[0].kind(), NodeKind::Cluster);

        let skills = state.list(&ListNodesRequest {
            kinds: vec![NodeKind::Skill],
            ..Default::default()
        });
        assert_eq!(skills.total, 1);

        let search = state.list(&ListNodesRequest {
            search: Some("ML".to_string()),
            ..Default::default()
        });
        assert_eq!(search.total, 2);

        let page = state.list(&ListNodesRequest {
            sort_by: NodeSortField::Name,
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        });
        assert_eq!(page.total, 3);
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0].name, "Machine Learning");
    }

    #[test]
    fn test_list_sort_by_usage_desc() {
        let (mut state, _, group, skill) = seeded();
        state
            .record_usage(
                skill.id,
                UsageCounts {
                    employees: 12,
                    courses: 2,
                    roles: 1,
                },
            )
            .unwrap();
        state
            .record_usage(
                group.id,
                UsageCounts {
                    employees: 3,
                    ..Default::default()
                },
            )
            .unwrap();
        let listed = state.list(&ListNodesRequest {
            sort_by: NodeSortField::Usage,
            sort_order: SortOrder::Desc,
            ..Default::default()
        });
        assert_eq!(listed.nodes[0].id, skill.id);
        assert_eq!(listed.nodes[0].usage_count(), 15);
        assert_eq!(listed.nodes[1].id, group.id);
    }
}
