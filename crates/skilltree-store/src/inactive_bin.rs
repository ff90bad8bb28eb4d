//! Inactive Bin: soft-deleted nodes and mappings.
//!
//! Items move `Active -> Inactive` on inactivation, back to `Active` on
//! restore, or out of the store for good on purge. Each entry keeps a full
//! snapshot of the record, so restore never depends on anything but the
//! bin entry and the current tree.

use chrono::Utc;
use uuid::Uuid;

use skilltree_core::validation::{validate_mapping, validate_node, NodeCandidate, ValidationError, ValidationRule};
use skilltree_core::{
    Error, InactiveFilter, InactiveItem, InactiveItemType, InactiveSnapshot, NodeKind,
    ProficiencyMapping, RestorationSignal, RestoredItem, Result, TaxonomyNode,
};

use crate::state::TaxonomyState;

impl TaxonomyState {
    /// Append an inactivated node to the bin.
    pub(crate) fn bin_node(&mut self, node: TaxonomyNode, actor: &str) -> InactiveItem {
        let item = InactiveItem {
            id: skilltree_core::new_v7(),
            name: node.name.clone(),
            description: node.description.clone(),
            item_type: node.kind().into(),
            parent_name: self.parent_name(node.parent_id()),
            inactivated_at: Utc::now(),
            inactivated_by: actor.to_string(),
            employee_count: node.usage.employees,
            course_count: node.usage.courses,
            role_count: node.usage.roles,
            snapshot: InactiveSnapshot::Node(node),
        };
        self.inactive.push(item.clone());
        item
    }

    /// Append an inactivated mapping to the bin. The skill is its parent.
    pub(crate) fn bin_mapping(&mut self, mut mapping: ProficiencyMapping, actor: &str) -> InactiveItem {
        mapping.is_active = false;
        let item = InactiveItem {
            id: skilltree_core::new_v7(),
            name: mapping.proficiency_level_title.clone(),
            description: mapping.proficiency_description.clone(),
            item_type: InactiveItemType::Proficiency,
            parent_name: Some(mapping.skill_name.clone()),
            inactivated_at: Utc::now(),
            inactivated_by: actor.to_string(),
            employee_count: 0,
            course_count: 0,
            role_count: 0,
            snapshot: InactiveSnapshot::Mapping(mapping),
        };
        self.inactive.push(item.clone());
        item
    }

    /// Bin entries matching `filter`, newest first.
    pub fn list_inactive(&self, filter: &InactiveFilter) -> Vec<&InactiveItem> {
        let mut items: Vec<_> = self
            .inactive
            .iter()
            .rev()
            .filter(|item| filter.matches(item))
            .collect();
        items.sort_by(|a, b| b.inactivated_at.cmp(&a.inactivated_at));
        items
    }

    pub fn inactive_item(&self, id: Uuid) -> Option<&InactiveItem> {
        self.inactive.iter().find(|item| item.id == id)
    }

    /// Re-create the active record of a bin entry.
    ///
    /// Returns the restored record and the bin entry it came from. A rank
    /// taken in the meantime is replaced by the next free rank; every other
    /// conflict with the current tree is a validation error and leaves the
    /// entry in the bin.
    pub fn restore(&mut self, item_id: Uuid) -> Result<(RestoredItem, InactiveItem)> {
        let idx = self
            .inactive
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(Error::InactiveItemNotFound(item_id))?;

        let restored = match &self.inactive[idx].snapshot {
            InactiveSnapshot::Node(node) => RestoredItem::Node(self.prepare_node_restore(node)?),
            InactiveSnapshot::Mapping(mapping) => {
                RestoredItem::Mapping(self.prepare_mapping_restore(mapping)?)
            }
        };

        let item = self.inactive.remove(idx);
        match &restored {
            RestoredItem::Node(node) => {
                self.nodes.insert(node.id, node.clone());
            }
            RestoredItem::Mapping(mapping) => self.mappings.push(mapping.clone()),
        }
        self.restoration = Some(RestorationSignal::restore(item.clone()));
        Ok((restored, item))
    }

    fn prepare_node_restore(&self, snapshot: &TaxonomyNode) -> Result<TaxonomyNode> {
        if self.nodes.contains_key(&snapshot.id) {
            return Err(Error::Conflict(format!(
                "Node {} is already active",
                snapshot.id
            )));
        }

        let mut node = snapshot.clone();
        node.is_active = true;
        node.updated_at = Utc::now();

        let kind = node.kind();
        let parent_id = node.parent_id();
        let siblings = self.siblings(kind, parent_id);
        if siblings.iter().any(|s| s.rank == node.rank) {
            node.rank = self.next_rank(kind, parent_id);
        }

        let parent = parent_id.and_then(|id| self.visible_node(id));
        let errors = validate_node(&NodeCandidate::from_node(&node), &siblings, parent);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        Ok(node)
    }

    fn prepare_mapping_restore(&self, snapshot: &ProficiencyMapping) -> Result<ProficiencyMapping> {
        if self.mappings.iter().any(|m| m.id == snapshot.id) {
            return Err(Error::Conflict(format!(
                "Mapping {} is already active",
                snapshot.id
            )));
        }

        let skill = self
            .visible_node(snapshot.skill_id)
            .filter(|n| n.kind() == NodeKind::Skill);
        let level = self.get_level(snapshot.proficiency_level_id);

        let mut errors = Vec::new();
        if skill.is_none() {
            errors.push(ValidationError::new(
                "skillId",
                ValidationRule::UnknownReference,
                format!("Skill '{}' is not active", snapshot.skill_name),
            ));
        }
        if level.is_none() {
            errors.push(ValidationError::new(
                "proficiencyLevelId",
                ValidationRule::UnknownReference,
                format!(
                    "Proficiency level '{}' no longer exists",
                    snapshot.proficiency_level_title
                ),
            ));
        }
        let existing: Vec<&ProficiencyMapping> = self.mappings.iter().collect();
        errors.extend(validate_mapping(
            Some(snapshot.id),
            snapshot.skill_id,
            &snapshot.proficiency_description,
            &existing,
        ));

        match (skill, level) {
            (Some(skill), Some(level)) if errors.is_empty() => Ok(ProficiencyMapping {
                skill_name: skill.name.clone(),
                proficiency_level_title: level.title.clone(),
                is_active: true,
                updated_at: Utc::now(),
                ..snapshot.clone()
            }),
            _ => Err(Error::Validation(errors)),
        }
    }

    /// Permanently discard a bin entry.
    ///
    /// A node still referenced by stored children or mappings cannot be
    /// purged; those have to be inactivated first.
    pub fn purge(&mut self, item_id: Uuid) -> Result<InactiveItem> {
        let idx = self
            .inactive
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(Error::InactiveItemNotFound(item_id))?;

        if let InactiveSnapshot::Node(node) = &self.inactive[idx].snapshot {
            let children = self
                .nodes
                .values()
                .filter(|n| n.parent_id() == Some(node.id))
                .count();
            let mappings = self
                .mappings
                .iter()
                .filter(|m| m.skill_id == node.id)
                .count();
            if children > 0 || mappings > 0 {
                return Err(Error::Conflict(format!(
                    "'{}' is still referenced by {} node(s) and {} mapping(s)",
                    node.name, children, mappings
                )));
            }
        }

        Ok(self.inactive.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skilltree_core::{CreateMappingRequest, CreateNodeRequest, InactiveItemType};

    fn tree() -> (TaxonomyState, Uuid, Uuid, Uuid) {
        let mut state = TaxonomyState::with_default_levels();
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
        (state, cluster.id, group.id, skill.id)
    }

    #[test]
    fn test_restore_round_trip() {
        let (mut state, _, group_id, _) = tree();
        let before = state.get(group_id).unwrap().clone();
        let item = state.inactivate(group_id, "admin").unwrap();
        assert_eq!(item.item_type, InactiveItemType::Group);

        let (restored, from) = state.restore(item.id).unwrap();
        assert_eq!(from.id, item.id);
        let RestoredItem::Node(node) = restored else {
            panic!("expected a node");
        };
        assert_eq!(node.id, before.id);
        assert_eq!(node.name, before.name);
        assert_eq!(node.rank, before.rank);
        assert_eq!(node.placement, before.placement);
        assert!(node.is_active);
        assert!(state.list_inactive(&InactiveFilter::default()).is_empty());
        assert!(state.orphans().is_empty());
        assert_eq!(
            state.restoration_signal().map(|s| s.item.id),
            Some(item.id)
        );
    }

    #[test]
    fn test_restore_reassigns_taken_rank() {
        let (mut state, cluster_id, group_id, _) = tree();
        let item = state.inactivate(group_id, "admin").unwrap();
        state
            .create(CreateNodeRequest::group(cluster_id, "Statistics", "Stats").with_rank(1))
            .unwrap();

        let (restored, _) = state.restore(item.id).unwrap();
        let RestoredItem::Node(node) = restored else {
            panic!("expected a node");
        };
        assert_eq!(node.rank, 2);
    }

    #[test]
    fn test_restore_rejects_name_collision() {
        let (mut state, cluster_id, group_id, _) = tree();
        let item = state.inactivate(group_id, "admin").unwrap();
        state
            .create(CreateNodeRequest::group(cluster_id, "machine learning", "Again"))
            .unwrap();

        let err = state.restore(item.id).unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::DuplicateName
        );
        assert_eq!(state.list_inactive(&InactiveFilter::default()).len(), 1);
    }

    #[test]
    fn test_restore_under_inactive_parent_rejected() {
        let (mut state, cluster_id, group_id, _) = tree();
        let group_item = state.inactivate(group_id, "admin").unwrap();
        state.inactivate(cluster_id, "admin").unwrap();

        let err = state.restore(group_item.id).unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::IllegalParent
        );
    }

    #[test]
    fn test_mapping_restore_needs_active_skill() {
        let (mut state, _, group_id, skill_id) = tree();
        let level = state.list_levels()[0].id;
        let mapping = state
            .create_mapping(CreateMappingRequest {
                skill_id,
                proficiency_description: "Trains a regression model".to_string(),
                proficiency_level_id: level,
            })
            .unwrap();
        let item = state.inactivate_mapping(mapping.id, "admin").unwrap();
        assert_eq!(item.parent_name.as_deref(), Some("Python for ML"));
        assert_eq!(item.item_type, InactiveItemType::Proficiency);

        state.inactivate(group_id, "admin").unwrap();
        let err = state.restore(item.id).unwrap_err();
        assert_eq!(err.violations().unwrap()[0].field, "skillId");
    }

    #[test]
    fn test_list_inactive_newest_first_with_filter() {
        let (mut state, cluster_id, group_id, skill_id) = tree();
        state.inactivate(skill_id, "admin").unwrap();
        state.inactivate(group_id, "admin").unwrap();
        state.inactivate(cluster_id, "admin").unwrap();

        let all = state.list_inactive(&InactiveFilter::default());
        let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Data Science", "Machine Learning", "Python for ML"]);

        let groups = state.list_inactive(&InactiveFilter {
            types: vec![InactiveItemType::Group, InactiveItemType::Skill],
            search: Some("machine".to_string()),
        });
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_purge_refuses_referenced_node() {
        let (mut state, _, group_id, skill_id) = tree();
        let group_item = state.inactivate(group_id, "admin").unwrap();
        assert!(matches!(state.purge(group_item.id), Err(Error::Conflict(_))));

        let skill_item = state.inactivate(skill_id, "admin").unwrap();
        state.purge(skill_item.id).unwrap();
        state.purge(group_item.id).unwrap();
        assert!(state.list_inactive(&InactiveFilter::default()).is_empty());
        assert!(matches!(
            state.purge(group_item.id),
            Err(Error::InactiveItemNotFound(_))
        ));
    }
}
