//! Validation engine for taxonomy nodes, global proficiency levels, and
//! proficiency mappings.
//!
//! Every validator is a pure function over the candidate and the records it
//! must be consistent with. Validators return the full list of violated rules
//! rather than stopping at the first one, so a form can show every error at
//! once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{MAX_SCORE, MIN_RANK};
use crate::models::{NodeKind, Placement, ProficiencyLevel, ProficiencyMapping, SkillLevel, TaxonomyNode};

/// Which rule a [`ValidationError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    /// A required field is empty.
    Required,
    /// Name collides with a sibling (case-insensitive).
    DuplicateName,
    /// Parent is missing, inactive, or of the wrong kind.
    IllegalParent,
    /// Rank collides with a sibling's rank.
    DuplicateRank,
    /// Rank is below the minimum.
    InvalidRank,
    /// Score outside 0-100 or min above max.
    ScoreRange,
    /// Field not allowed for this node kind.
    NotApplicable,
    /// Title collides with another global level.
    DuplicateTitle,
    /// Mapping description already used for the same skill.
    DuplicateDescription,
    /// Referenced record does not exist.
    UnknownReference,
}

/// A single violated rule, tied to the field it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub rule: ValidationRule,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

/// Canonical form used for every case-insensitive name comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive, whitespace-tolerant name equality.
pub fn names_match(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// The fields of a node being created or edited.
#[derive(Debug, Clone, Copy)]
pub struct NodeCandidate<'a> {
    /// Set when editing, so the node does not collide with itself.
    pub id: Option<Uuid>,
    pub name: &'a str,
    pub description: &'a str,
    pub rank: u32,
    pub placement: &'a Placement,
}

impl<'a> NodeCandidate<'a> {
    /// Candidate view of an existing node.
    pub fn from_node(node: &'a TaxonomyNode) -> Self {
        Self {
            id: Some(node.id),
            name: &node.name,
            description: &node.description,
            rank: node.rank,
            placement: &node.placement,
        }
    }
}

/// Validate a node against its siblings and resolved parent.
///
/// `siblings` are the active nodes sharing the candidate's parent (for
/// clusters: every active cluster). The candidate itself may be included;
/// it is skipped by id. `parent` is the node the placement points at, or
/// `None` if it could not be resolved.
pub fn validate_node(
    candidate: &NodeCandidate<'_>,
    siblings: &[&TaxonomyNode],
    parent: Option<&TaxonomyNode>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let kind = candidate.placement.kind();

    if candidate.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "name",
            ValidationRule::Required,
            "Name is required",
        ));
    }
    if candidate.description.trim().is_empty() {
        errors.push(ValidationError::new(
            "description",
            ValidationRule::Required,
            "Description is required",
        ));
    }

    errors.extend(validate_parent(kind, candidate.placement.parent_id(), parent));

    let others = siblings
        .iter()
        .filter(|s| Some(s.id) != candidate.id && s.is_active);

    if !candidate.name.trim().is_empty() {
        let wanted = normalize_name(candidate.name);
        if others.clone().any(|s| normalize_name(&s.name) == wanted) {
            errors.push(ValidationError::new(
                "name",
                ValidationRule::DuplicateName,
                format!(
                    "A {} named '{}' already exists here",
                    kind,
                    candidate.name.trim()
                ),
            ));
        }
    }

    if candidate.rank < MIN_RANK {
        errors.push(ValidationError::new(
            "rank",
            ValidationRule::InvalidRank,
            format!("Rank must be at least {}", MIN_RANK),
        ));
    } else if others.clone().any(|s| s.rank == candidate.rank) {
        errors.push(ValidationError::new(
            "rank",
            ValidationRule::DuplicateRank,
            format!("Rank {} is already used by a sibling", candidate.rank),
        ));
    }

    errors.extend(validate_skill_levels(candidate.placement.proficiency_levels()));
    errors
}

/// Parent-type legality: clusters have no parent, groups need an active
/// cluster, skills need an active group.
pub fn validate_parent(
    kind: NodeKind,
    parent_id: Option<Uuid>,
    parent: Option<&TaxonomyNode>,
) -> Vec<ValidationError> {
    let Some(required) = kind.parent_kind() else {
        if parent_id.is_some() {
            return vec![ValidationError::new(
                "parentId",
                ValidationRule::IllegalParent,
                "A cluster cannot have a parent",
            )];
        }
        return Vec::new();
    };

    let legal = match (parent_id, parent) {
        (Some(id), Some(p)) => p.id == id && p.is_active && p.kind() == required,
        _ => false,
    };
    if legal {
        Vec::new()
    } else {
        vec![ValidationError::new(
            "parentId",
            ValidationRule::IllegalParent,
            format!("A {} must belong to an active {}", kind, required),
        )]
    }
}

/// Required fields and score bands of per-skill proficiency levels.
pub fn validate_skill_levels(levels: &[SkillLevel]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (i, level) in levels.iter().enumerate() {
        let field = |name: &str| format!("proficiencyLevels[{}].{}", i, name);
        if level.title.trim().is_empty() {
            errors.push(ValidationError::new(
                field("title"),
                ValidationRule::Required,
                format!("Level {} title is required", i + 1),
            ));
        }
        if level.description.trim().is_empty() {
            errors.push(ValidationError::new(
                field("description"),
                ValidationRule::Required,
                format!("Level {} description is required", i + 1),
            ));
        }
        if let Some(e) = score_band_error(&field("minScore"), level.min_score, level.max_score) {
            errors.push(e);
        }
    }
    errors
}

fn score_band_error(field: &str, min: u8, max: u8) -> Option<ValidationError> {
    if max > MAX_SCORE || min > MAX_SCORE {
        Some(ValidationError::new(
            field,
            ValidationRule::ScoreRange,
            format!("Scores must be between 0 and {}", MAX_SCORE),
        ))
    } else if min > max {
        Some(ValidationError::new(
            field,
            ValidationRule::ScoreRange,
            format!("Minimum score {} exceeds maximum score {}", min, max),
        ))
    } else {
        None
    }
}

/// The fields of a global level being created or edited.
#[derive(Debug, Clone, Copy)]
pub struct LevelCandidate<'a> {
    pub id: Option<Uuid>,
    pub title: &'a str,
    pub description: &'a str,
    pub min_score: u8,
    pub max_score: u8,
}

/// Validate a global proficiency level against the other levels.
pub fn validate_level(
    candidate: &LevelCandidate<'_>,
    existing: &[&ProficiencyLevel],
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if candidate.title.trim().is_empty() {
        errors.push(ValidationError::new(
            "title",
            ValidationRule::Required,
            "Title is required",
        ));
    } else if existing
        .iter()
        .any(|l| Some(l.id) != candidate.id && names_match(&l.title, candidate.title))
    {
        errors.push(ValidationError::new(
            "title",
            ValidationRule::DuplicateTitle,
            format!("A level titled '{}' already exists", candidate.title.trim()),
        ));
    }
    if candidate.description.trim().is_empty() {
        errors.push(ValidationError::new(
            "description",
            ValidationRule::Required,
            "Description is required",
        ));
    }
    if let Some(e) = score_band_error("minScore", candidate.min_score, candidate.max_score) {
        errors.push(e);
    }
    errors
}

/// Validate a mapping description against the skill's other active mappings.
pub fn validate_mapping(
    id: Option<Uuid>,
    skill_id: Uuid,
    description: &str,
    existing: &[&ProficiencyMapping],
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if description.trim().is_empty() {
        errors.push(ValidationError::new(
            "proficiencyDescription",
            ValidationRule::Required,
            "Proficiency description is required",
        ));
    } else if existing.iter().any(|m| {
        m.is_active
            && Some(m.id) != id
            && m.skill_id == skill_id
            && names_match(&m.proficiency_description, description)
    }) {
        errors.push(ValidationError::new(
            "proficiencyDescription",
            ValidationRule::DuplicateDescription,
            "This proficiency description already exists for the skill",
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageCounts;
    use chrono::Utc;

    fn node(name: &str, rank: u32, placement: Placement) -> TaxonomyNode {
        let now = Utc::now();
        TaxonomyNode {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{} description", name),
            rank,
            is_active: true,
            placement,
            usage: UsageCounts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn candidate<'a>(name: &'a str, rank: u32, placement: &'a Placement) -> NodeCandidate<'a> {
        NodeCandidate {
            id: None,
            name,
            description: "desc",
            rank,
            placement,
        }
    }

    #[test]
    fn test_valid_cluster_passes() {
        let placement = Placement::Cluster;
        let errors = validate_node(&candidate("Data Science", 1, &placement), &[], None);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_long_name_has_no_length_rule() {
        let placement = Placement::Cluster;
        let name = "Quantitative ".repeat(20);
        let errors = validate_node(&candidate(&name, 1, &placement), &[], None);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_duplicate_name_case_insensitive() {
        let existing = node("Data Science", 1, Placement::Cluster);
        let placement = Placement::Cluster;
        let errors = validate_node(&candidate("  data science ", 2, &placement), &[&existing], None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, ValidationRule::DuplicateName);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_duplicate_rank() {
        let existing = node("Engineering", 3, Placement::Cluster);
        let placement = Placement::Cluster;
        let errors = validate_node(&candidate("Design", 3, &placement), &[&existing], None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, ValidationRule::DuplicateRank);
    }

    #[test]
    fn test_rank_zero_rejected() {
        let placement = Placement::Cluster;
        let errors = validate_node(&candidate("Design", 0, &placement), &[], None);
        assert_eq!(errors[0].rule, ValidationRule::InvalidRank);
    }

    #[test]
    fn test_editing_does_not_collide_with_itself() {
        let existing = node("Design", 1, Placement::Cluster);
        let errors = validate_node(&NodeCandidate::from_node(&existing), &[&existing], None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_group_requires_active_cluster_parent() {
        let cluster = node("Data Science", 1, Placement::Cluster);
        let placement = Placement::group(cluster.id);
        assert!(validate_node(&candidate("ML", 1, &placement), &[], Some(&cluster)).is_empty());

        let errors = validate_node(&candidate("ML", 1, &placement), &[], None);
        assert_eq!(errors[0].rule, ValidationRule::IllegalParent);

        let mut inactive = cluster.clone();
        inactive.is_active = false;
        let errors = validate_node(&candidate("ML", 1, &placement), &[], Some(&inactive));
        assert_eq!(errors[0].rule, ValidationRule::IllegalParent);
    }

    #[test]
    fn test_skill_under_cluster_is_illegal() {
        let cluster = node("Data Science", 1, Placement::Cluster);
        let placement = Placement::skill(cluster.id);
        let errors = validate_node(&candidate("Python", 1, &placement), &[], Some(&cluster));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, ValidationRule::IllegalParent);
        assert!(errors[0].message.contains("active group"));
    }

    #[test]
    fn test_collects_all_violations() {
        let existing = node("Python", 1, Placement::Cluster);
        let placement = Placement::Skill {
            group_id: Uuid::new_v4(),
            proficiency_levels: vec![SkillLevel::new("", "", 80, 20, 1)],
        };
        let cand = NodeCandidate {
            id: None,
            name: "",
            description: " ",
            rank: 1,
            placement: &placement,
        };
        let errors = validate_node(&cand, &[&existing], None);
        let rules: Vec<_> = errors.iter().map(|e| e.rule).collect();
        assert_eq!(
            rules,
            vec![
                ValidationRule::Required,
                ValidationRule::Required,
                ValidationRule::IllegalParent,
                ValidationRule::DuplicateRank,
                ValidationRule::Required,
                ValidationRule::Required,
                ValidationRule::ScoreRange,
            ]
        );
    }

    #[test]
    fn test_skill_level_score_bounds() {
        let errors = validate_skill_levels(&[SkillLevel::new("Expert", "Leads", 90, 120, 1)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "proficiencyLevels[0].minScore");
    }

    #[test]
    fn test_level_title_unique() {
        let now = Utc::now();
        let beginner = ProficiencyLevel {
            id: Uuid::new_v4(),
            title: "Beginner".to_string(),
            description: "Basics".to_string(),
            min_score: 0,
            max_score: 25,
            order: 1,
            created_at: now,
            updated_at: now,
        };
        let cand = LevelCandidate {
            id: None,
            title: "BEGINNER",
            description: "dup",
            min_score: 0,
            max_score: 10,
        };
        let errors = validate_level(&cand, &[&beginner]);
        assert_eq!(errors[0].rule, ValidationRule::DuplicateTitle);

        let rename_self = LevelCandidate {
            id: Some(beginner.id),
            ..cand
        };
        assert!(validate_level(&rename_self, &[&beginner]).is_empty());
    }

    #[test]
    fn test_mapping_description_unique_per_skill() {
        let now = Utc::now();
        let skill_id = Uuid::new_v4();
        let mapping = ProficiencyMapping {
            id: Uuid::new_v4(),
            skill_id,
            skill_name: "Python".to_string(),
            proficiency_description: "Writes scripts".to_string(),
            proficiency_level_id: Uuid::new_v4(),
            proficiency_level_title: "Beginner".to_string(),
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        let errors = validate_mapping(None, skill_id, "writes scripts", &[&mapping]);
        assert_eq!(errors[0].rule, ValidationRule::DuplicateDescription);

        // Same text on another skill is fine.
        assert!(validate_mapping(None, Uuid::new_v4(), "Writes scripts", &[&mapping]).is_empty());

        // Inactive mappings do not count.
        let mut inactive = mapping.clone();
        inactive.is_active = false;
        assert!(validate_mapping(None, skill_id, "Writes scripts", &[&inactive]).is_empty());
    }
}
