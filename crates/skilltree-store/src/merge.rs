//! Merging duplicate nodes.
//!
//! A merge folds a source node into a target of the same kind: children
//! move under the target, skill mappings are redirected, usage counters are
//! summed, and the source lands in the Inactive Bin. Every check runs before
//! the first mutation, so a rejected merge changes nothing.

use chrono::Utc;
use uuid::Uuid;

use skilltree_core::defaults::MIN_RANK;
use skilltree_core::validation::{names_match, normalize_name, ValidationError, ValidationRule};
use skilltree_core::{new_v7, Error, MergeRecord, NodeKind, ProficiencyMapping, Result};

use crate::state::TaxonomyState;

impl TaxonomyState {
    /// Merge `source_id` into `target_id`, recording `performed_by`.
    pub fn merge(
        &mut self,
        source_id: Uuid,
        target_id: Uuid,
        performed_by: &str,
    ) -> Result<MergeRecord> {
        if source_id == target_id {
            return Err(Error::Conflict(
                "Cannot merge a node into itself".to_string(),
            ));
        }
        let source = self
            .visible_node(source_id)
            .ok_or(Error::NodeNotFound(source_id))?
            .clone();
        let target = self
            .visible_node(target_id)
            .ok_or(Error::NodeNotFound(target_id))?
            .clone();
        if source.kind() != target.kind() {
            return Err(Error::Conflict(format!(
                "Cannot merge a {} into a {}",
                source.kind(),
                target.kind()
            )));
        }

        let moving: Vec<Uuid> = self.children(source_id).iter().map(|c| c.id).collect();
        let target_children = self.children(target_id);
        let collisions: Vec<ValidationError> = self
            .children(source_id)
            .into_iter()
            .filter(|c| target_children.iter().any(|t| names_match(&t.name, &c.name)))
            .map(|c| {
                ValidationError::new(
                    "children",
                    ValidationRule::DuplicateName,
                    format!("'{}' already exists under '{}'", c.name, target.name),
                )
            })
            .collect();
        if !collisions.is_empty() {
            return Err(Error::Validation(collisions));
        }
        let mut next_rank = target_children
            .iter()
            .map(|c| c.rank)
            .max()
            .map_or(MIN_RANK, |r| r.saturating_add(1));

        let now = Utc::now();
        for child_id in &moving {
            if let Some(child) = self.nodes.get_mut(child_id) {
                child.reparent(target_id);
                child.rank = next_rank;
                child.updated_at = now;
                next_rank = next_rank.saturating_add(1);
            }
        }

        let mut redirected_mappings = Vec::new();
        let mut discarded = Vec::new();
        if source.kind() == NodeKind::Skill {
            let taken: Vec<String> = self
                .mappings
                .iter()
                .filter(|m| m.skill_id == target_id)
                .map(|m| normalize_name(&m.proficiency_description))
                .collect();
            let mut kept: Vec<ProficiencyMapping> = Vec::with_capacity(self.mappings.len());
            for mut mapping in std::mem::take(&mut self.mappings) {
                if mapping.skill_id != source_id {
                    kept.push(mapping);
                } else if taken.contains(&normalize_name(&mapping.proficiency_description)) {
                    discarded.push(mapping);
                } else {
                    mapping.skill_id = target_id;
                    mapping.skill_name = target.name.clone();
                    mapping.updated_at = now;
                    redirected_mappings.push(mapping.id);
                    kept.push(mapping);
                }
            }
            self.mappings = kept;
        }
        let discarded_mappings: Vec<Uuid> = discarded.iter().map(|m| m.id).collect();
        for mapping in discarded {
            self.bin_mapping(mapping, performed_by);
        }

        if let Some(node) = self.nodes.get_mut(&target_id) {
            node.usage.absorb(source.usage);
            node.updated_at = now;
        }
        self.inactivate(source_id, performed_by)?;

        let record = MergeRecord {
            id: new_v7(),
            source_id,
            target_id,
            kind: source.kind(),
            moved_children: moving,
            redirected_mappings,
            discarded_mappings,
            performed_by: performed_by.to_string(),
            created_at: now,
        };
        self.merges.push(record.clone());
        Ok(record)
    }

    /// Merges the node took part in, newest first.
    pub fn merge_history(&self, node_id: Uuid) -> Vec<&MergeRecord> {
        self.merges
            .iter()
            .rev()
            .filter(|m| m.source_id == node_id || m.target_id == node_id)
            .collect()
    }
}
