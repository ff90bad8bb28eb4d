//! Data models for the skills taxonomy.
//!
//! The taxonomy is a forest of typed nodes: clusters at the root, groups
//! under clusters, and skills under groups. A node's kind and its parent are
//! carried together by [`Placement`], so a cluster can never hold a parent
//! reference and only skills can hold proficiency levels.
//!
//! Records that end up in the persisted state file serialize with camelCase
//! keys, matching the storage layout the console pages exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// NODE KIND AND PLACEMENT
// =============================================================================

/// Discriminator for taxonomy node kinds.
///
/// Used for filtering, CSV columns, and Inactive Bin projections. The
/// authoritative shape of a node is its [`Placement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Top-level category, never has a parent.
    Cluster,
    /// Category nested under a cluster.
    Group,
    /// Leaf entry nested under a group; carries proficiency levels.
    Skill,
}

impl NodeKind {
    /// All kinds in hierarchy order.
    pub const ALL: [NodeKind; 3] = [NodeKind::Cluster, NodeKind::Group, NodeKind::Skill];

    /// The kind a node of this kind must be parented by, if any.
    pub fn parent_kind(&self) -> Option<NodeKind> {
        match self {
            Self::Cluster => None,
            Self::Group => Some(Self::Cluster),
            Self::Skill => Some(Self::Group),
        }
    }

    /// The kind of this kind's direct children, if any.
    pub fn child_kind(&self) -> Option<NodeKind> {
        match self {
            Self::Cluster => Some(Self::Group),
            Self::Group => Some(Self::Skill),
            Self::Skill => None,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Group => "group",
            Self::Skill => "skill",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "group" => Ok(Self::Group),
            "skill" => Ok(Self::Skill),
            _ => Err(format!("Invalid node type: {}", s)),
        }
    }
}

/// A proficiency level declared on a single skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillLevel {
    pub title: String,
    pub description: String,
    /// Inclusive lower bound, 0-100.
    pub min_score: u8,
    /// Inclusive upper bound, 0-100.
    pub max_score: u8,
    pub order: u32,
}

impl SkillLevel {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        min_score: u8,
        max_score: u8,
        order: u32,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            min_score,
            max_score,
            order,
        }
    }
}

/// Where a node sits in the hierarchy, together with the fields only its
/// kind may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    Cluster,
    #[serde(rename_all = "camelCase")]
    Group { cluster_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Skill {
        group_id: Uuid,
        #[serde(default)]
        proficiency_levels: Vec<SkillLevel>,
    },
}

impl Placement {
    /// Placement for a group under the given cluster.
    pub fn group(cluster_id: Uuid) -> Self {
        Self::Group { cluster_id }
    }

    /// Placement for a skill under the given group, without levels.
    pub fn skill(group_id: Uuid) -> Self {
        Self::Skill {
            group_id,
            proficiency_levels: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Cluster => NodeKind::Cluster,
            Self::Group { .. } => NodeKind::Group,
            Self::Skill { .. } => NodeKind::Skill,
        }
    }

    /// The owning node, or `None` for clusters.
    pub fn parent_id(&self) -> Option<Uuid> {
        match self {
            Self::Cluster => None,
            Self::Group { cluster_id } => Some(*cluster_id),
            Self::Skill { group_id, .. } => Some(*group_id),
        }
    }

    /// Proficiency levels; always empty for clusters and groups.
    pub fn proficiency_levels(&self) -> &[SkillLevel] {
        match self {
            Self::Skill {
                proficiency_levels, ..
            } => proficiency_levels,
            _ => &[],
        }
    }

    /// Re-point the placement at a new parent of the same kind.
    pub(crate) fn reparent(&mut self, new_parent: Uuid) {
        match self {
            Self::Cluster => {}
            Self::Group { cluster_id } => *cluster_id = new_parent,
            Self::Skill { group_id, .. } => *group_id = new_parent,
        }
    }
}

// =============================================================================
// TAXONOMY NODE
// =============================================================================

/// Denormalized counts of downstream entities referencing a node.
///
/// Informational only: set by the host application and summed on merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounts {
    pub employees: u32,
    pub courses: u32,
    pub roles: u32,
}

impl UsageCounts {
    pub fn total(&self) -> u32 {
        self.employees
            .saturating_add(self.courses)
            .saturating_add(self.roles)
    }

    /// Add another node's counts into these.
    pub fn absorb(&mut self, other: UsageCounts) {
        self.employees = self.employees.saturating_add(other.employees);
        self.courses = self.courses.saturating_add(other.courses);
        self.roles = self.roles.saturating_add(other.roles);
    }
}

/// A cluster, group, or skill in the taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Sibling ordering key, unique under the same parent.
    pub rank: u32,
    pub is_active: bool,
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub usage: UsageCounts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxonomyNode {
    pub fn kind(&self) -> NodeKind {
        self.placement.kind()
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.placement.parent_id()
    }

    pub fn proficiency_levels(&self) -> &[SkillLevel] {
        self.placement.proficiency_levels()
    }

    pub fn usage_count(&self) -> u32 {
        self.usage.total()
    }

    /// Move this node under a new parent of the same kind.
    pub fn reparent(&mut self, new_parent: Uuid) {
        self.placement.reparent(new_parent);
    }
}

/// Request to create a new node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub name: String,
    pub description: String,
    /// Explicit rank; the next free rank under the parent when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(flatten)]
    pub placement: Placement,
}

impl CreateNodeRequest {
    pub fn cluster(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rank: None,
            placement: Placement::Cluster,
        }
    }

    pub fn group(
        cluster_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rank: None,
            placement: Placement::group(cluster_id),
        }
    }

    pub fn skill(group_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rank: None,
            placement: Placement::skill(group_id),
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Attach proficiency levels. Ignored for clusters and groups.
    pub fn with_levels(mut self, levels: Vec<SkillLevel>) -> Self {
        if let Placement::Skill {
            proficiency_levels, ..
        } = &mut self.placement
        {
            *proficiency_levels = levels;
        }
        self
    }
}

/// Patch applied by an edit. Kind and parent are not editable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Only valid for skills.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency_levels: Option<Vec<SkillLevel>>,
}

/// Nested view of the active tree.
#[derive(Debug, Clone, Serialize)]
pub struct NodeTree {
    #[serde(flatten)]
    pub node: TaxonomyNode,
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    /// Total number of nodes in this subtree, including the root.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeTree::node_count).sum::<usize>()
    }
}

// =============================================================================
// PROFICIENCY
// =============================================================================

/// A global, skill-independent proficiency band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProficiencyLevel {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub min_score: u8,
    pub max_score: u8,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLevelRequest {
    pub title: String,
    pub description: String,
    pub min_score: u8,
    pub max_score: u8,
    /// Display order; appended after the last level when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLevelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

/// Skill-specific description of what a global level means for that skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProficiencyMapping {
    pub id: Uuid,
    pub skill_id: Uuid,
    pub skill_name: String,
    pub proficiency_description: String,
    pub proficiency_level_id: Uuid,
    pub proficiency_level_title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMappingRequest {
    pub skill_id: Uuid,
    pub proficiency_description: String,
    pub proficiency_level_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMappingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency_level_id: Option<Uuid>,
}

// =============================================================================
// INACTIVE BIN
// =============================================================================

/// Kind of record held in the Inactive Bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveItemType {
    Cluster,
    Group,
    Skill,
    Proficiency,
}

impl From<NodeKind> for InactiveItemType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Cluster => Self::Cluster,
            NodeKind::Group => Self::Group,
            NodeKind::Skill => Self::Skill,
        }
    }
}

impl std::fmt::Display for InactiveItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cluster => write!(f, "cluster"),
            Self::Group => write!(f, "group"),
            Self::Skill => write!(f, "skill"),
            Self::Proficiency => write!(f, "proficiency"),
        }
    }
}

impl std::str::FromStr for InactiveItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "group" => Ok(Self::Group),
            "skill" => Ok(Self::Skill),
            "proficiency" => Ok(Self::Proficiency),
            _ => Err(format!("Invalid inactive item type: {}", s)),
        }
    }
}

/// Full record captured when an item was inactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum InactiveSnapshot {
    Node(TaxonomyNode),
    Mapping(ProficiencyMapping),
}

/// Projection of a soft-deleted node or mapping.
///
/// A snapshot, not a live reference: restoring re-creates the active record
/// from `snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: InactiveItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    pub inactivated_at: DateTime<Utc>,
    pub inactivated_by: String,
    pub employee_count: u32,
    pub course_count: u32,
    pub role_count: u32,
    pub snapshot: InactiveSnapshot,
}

/// Record returned by a restore.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum RestoredItem {
    Node(TaxonomyNode),
    Mapping(ProficiencyMapping),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorationKind {
    Restore,
}

/// Signal left in the persisted state after a restore so other views can
/// pick the restoration up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationSignal {
    #[serde(rename = "type")]
    pub kind: RestorationKind,
    pub item: InactiveItem,
    pub timestamp: DateTime<Utc>,
}

impl RestorationSignal {
    pub fn restore(item: InactiveItem) -> Self {
        Self {
            kind: RestorationKind::Restore,
            item,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// MERGE
// =============================================================================

/// Record of a completed merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub kind: NodeKind,
    /// Children of the source re-parented under the target.
    pub moved_children: Vec<Uuid>,
    /// Source mappings rewritten to point at the target skill.
    pub redirected_mappings: Vec<Uuid>,
    /// Source mappings duplicating a target description, moved to the bin.
    pub discarded_mappings: Vec<Uuid>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_skill() -> TaxonomyNode {
        let now = Utc::now();
        TaxonomyNode {
            id: Uuid::nil(),
            name: "Python for ML".to_string(),
            description: "Python in ML workflows".to_string(),
            rank: 1,
            is_active: true,
            placement: Placement::Skill {
                group_id: Uuid::nil(),
                proficiency_levels: vec![SkillLevel::new("Beginner", "Basics", 0, 50, 1)],
            },
            usage: UsageCounts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_node_kind_parse_case_insensitive() {
        assert_eq!("Cluster".parse::<NodeKind>().unwrap(), NodeKind::Cluster);
        assert_eq!(" SKILL ".parse::<NodeKind>().unwrap(), NodeKind::Skill);
        assert!("team".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_node_kind_hierarchy() {
        assert_eq!(NodeKind::Cluster.parent_kind(), None);
        assert_eq!(NodeKind::Group.parent_kind(), Some(NodeKind::Cluster));
        assert_eq!(NodeKind::Skill.parent_kind(), Some(NodeKind::Group));
        assert_eq!(NodeKind::Skill.child_kind(), None);
    }

    #[test]
    fn test_placement_accessors() {
        let cluster = Placement::Cluster;
        assert_eq!(cluster.parent_id(), None);
        assert!(cluster.proficiency_levels().is_empty());

        let id = Uuid::new_v4();
        let group = Placement::group(id);
        assert_eq!(group.kind(), NodeKind::Group);
        assert_eq!(group.parent_id(), Some(id));
    }

    #[test]
    fn test_node_serializes_type_tag_flat() {
        let node = sample_skill();
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "skill");
        assert_eq!(value["groupId"], json!(Uuid::nil()));
        assert_eq!(value["isActive"], true);
        assert_eq!(value["proficiencyLevels"][0]["title"], "Beginner");

        let back: TaxonomyNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_cluster_json_has_no_parent_field() {
        let mut node = sample_skill();
        node.placement = Placement::Cluster;
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "cluster");
        assert!(value.get("groupId").is_none());
        assert!(value.get("clusterId").is_none());
    }

    #[test]
    fn test_with_levels_ignored_for_groups() {
        let req = CreateNodeRequest::group(Uuid::nil(), "ML", "Machine learning")
            .with_levels(vec![SkillLevel::new("x", "y", 0, 10, 1)]);
        assert!(req.placement.proficiency_levels().is_empty());
    }

    #[test]
    fn test_usage_counts_absorb() {
        let mut a = UsageCounts {
            employees: 3,
            courses: 1,
            roles: 0,
        };
        a.absorb(UsageCounts {
            employees: 2,
            courses: 0,
            roles: 4,
        });
        assert_eq!(a.total(), 10);
    }

    #[test]
    fn test_restoration_signal_shape() {
        let node = sample_skill();
        let item = InactiveItem {
            id: Uuid::nil(),
            name: node.name.clone(),
            description: node.description.clone(),
            item_type: InactiveItemType::Skill,
            parent_name: Some("Machine Learning".to_string()),
            inactivated_at: Utc::now(),
            inactivated_by: "admin".to_string(),
            employee_count: 0,
            course_count: 0,
            role_count: 0,
            snapshot: InactiveSnapshot::Node(node),
        };
        let value = serde_json::to_value(RestorationSignal::restore(item)).unwrap();
        assert_eq!(value["type"], "restore");
        assert_eq!(value["item"]["type"], "skill");
        assert_eq!(value["item"]["parentName"], "Machine Learning");
        assert_eq!(value["item"]["snapshot"]["kind"], "node");
    }
}
