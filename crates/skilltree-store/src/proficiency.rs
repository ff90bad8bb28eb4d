//! Global proficiency levels and per-skill proficiency mappings.

use chrono::Utc;
use uuid::Uuid;

use skilltree_core::defaults::DEFAULT_LEVELS;
use skilltree_core::validation::{
    names_match, normalize_name, validate_level, validate_mapping, LevelCandidate,
    ValidationError, ValidationRule,
};
use skilltree_core::{
    new_v7, CreateLevelRequest, CreateMappingRequest, Error, InactiveItem, NodeKind,
    ProficiencyLevel, ProficiencyMapping, Result, UpdateLevelRequest, UpdateMappingRequest,
};

use crate::state::TaxonomyState;

impl TaxonomyState {
    /// Insert the default levels into a store that has none.
    pub fn seed_default_levels(&mut self) {
        if !self.levels.is_empty() {
            return;
        }
        let now = Utc::now();
        for (i, (title, description, min_score, max_score)) in DEFAULT_LEVELS.iter().enumerate() {
            self.levels.push(ProficiencyLevel {
                id: new_v7(),
                title: title.to_string(),
                description: description.to_string(),
                min_score: *min_score,
                max_score: *max_score,
                order: i as u32 + 1,
                created_at: now,
                updated_at: now,
            });
        }
    }

    // =========================================================================
    // LEVELS
    // =========================================================================

    /// Levels ordered by `order`, then title.
    pub fn list_levels(&self) -> Vec<&ProficiencyLevel> {
        let mut levels: Vec<_> = self.levels.iter().collect();
        levels.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| normalize_name(&a.title).cmp(&normalize_name(&b.title)))
        });
        levels
    }

    pub fn get_level(&self, id: Uuid) -> Option<&ProficiencyLevel> {
        self.levels.iter().find(|l| l.id == id)
    }

    pub fn find_level_by_title(&self, title: &str) -> Option<&ProficiencyLevel> {
        self.levels.iter().find(|l| names_match(&l.title, title))
    }

    pub fn create_level(&mut self, req: CreateLevelRequest) -> Result<ProficiencyLevel> {
        let existing: Vec<&ProficiencyLevel> = self.levels.iter().collect();
        let errors = validate_level(
            &LevelCandidate {
                id: None,
                title: &req.title,
                description: &req.description,
                min_score: req.min_score,
                max_score: req.max_score,
            },
            &existing,
        );
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let order = req.order.unwrap_or_else(|| {
            self.levels
                .iter()
                .map(|l| l.order)
                .max()
                .map_or(1, |o| o.saturating_add(1))
        });
        let now = Utc::now();
        let level = ProficiencyLevel {
            id: new_v7(),
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            min_score: req.min_score,
            max_score: req.max_score,
            order,
            created_at: now,
            updated_at: now,
        };
        self.levels.push(level.clone());
        Ok(level)
    }

    /// Edit a level. A new title is copied into every active mapping citing
    /// the level; the number of rewritten mappings is returned alongside.
    pub fn update_level(
        &mut self,
        id: Uuid,
        req: UpdateLevelRequest,
    ) -> Result<(ProficiencyLevel, usize)> {
        let current = self.get_level(id).ok_or(Error::LevelNotFound(id))?;
        let mut next = current.clone();
        if let Some(title) = req.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            next.description = description.trim().to_string();
        }
        if let Some(min_score) = req.min_score {
            next.min_score = min_score;
        }
        if let Some(max_score) = req.max_score {
            next.max_score = max_score;
        }
        if let Some(order) = req.order {
            next.order = order;
        }

        let existing: Vec<&ProficiencyLevel> = self.levels.iter().collect();
        let errors = validate_level(
            &LevelCandidate {
                id: Some(id),
                title: &next.title,
                description: &next.description,
                min_score: next.min_score,
                max_score: next.max_score,
            },
            &existing,
        );
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let now = Utc::now();
        next.updated_at = now;
        let mut propagated = 0;
        for mapping in self
            .mappings
            .iter_mut()
            .filter(|m| m.proficiency_level_id == id && m.proficiency_level_title != next.title)
        {
            mapping.proficiency_level_title = next.title.clone();
            mapping.updated_at = now;
            propagated += 1;
        }
        if let Some(slot) = self.levels.iter_mut().find(|l| l.id == id) {
            *slot = next.clone();
        }
        Ok((next, propagated))
    }

    // =========================================================================
    // MAPPINGS
    // =========================================================================

    /// Active mappings whose skill is visible, optionally for one skill.
    /// Ordered by skill name, then level order.
    pub fn list_mappings(&self, skill_id: Option<Uuid>) -> Vec<&ProficiencyMapping> {
        let mut mappings: Vec<_> = self
            .mappings
            .iter()
            .filter(|m| skill_id.map_or(true, |id| m.skill_id == id))
            .filter(|m| self.is_visible(m.skill_id))
            .collect();
        mappings.sort_by_cached_key(|m| {
            (
                normalize_name(&m.skill_name),
                self.get_level(m.proficiency_level_id)
                    .map_or(u32::MAX, |l| l.order),
                m.created_at,
            )
        });
        mappings
    }

    pub fn get_mapping(&self, id: Uuid) -> Option<&ProficiencyMapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    /// Referential checks shared by create and update.
    fn mapping_references(
        &self,
        skill_id: Uuid,
        level_id: Uuid,
    ) -> (Option<String>, Option<String>, Vec<ValidationError>) {
        let mut errors = Vec::new();
        let skill = self
            .visible_node(skill_id)
            .filter(|n| n.kind() == NodeKind::Skill)
            .map(|n| n.name.clone());
        if skill.is_none() {
            errors.push(ValidationError::new(
                "skillId",
                ValidationRule::UnknownReference,
                format!("No active skill with id {}", skill_id),
            ));
        }
        let level = self.get_level(level_id).map(|l| l.title.clone());
        if level.is_none() {
            errors.push(ValidationError::new(
                "proficiencyLevelId",
                ValidationRule::UnknownReference,
                format!("No proficiency level with id {}", level_id),
            ));
        }
        (skill, level, errors)
    }

    pub fn create_mapping(&mut self, req: CreateMappingRequest) -> Result<ProficiencyMapping> {
        let (skill_name, level_title, mut errors) =
            self.mapping_references(req.skill_id, req.proficiency_level_id);
        let existing: Vec<&ProficiencyMapping> = self.mappings.iter().collect();
        errors.extend(validate_mapping(
            None,
            req.skill_id,
            &req.proficiency_description,
            &existing,
        ));

        let (Some(skill_name), Some(level_title), true) = (skill_name, level_title, errors.is_empty())
        else {
            return Err(Error::Validation(errors));
        };

        let now = Utc::now();
        let mapping = ProficiencyMapping {
            id: new_v7(),
            skill_id: req.skill_id,
            skill_name,
            proficiency_description: req.proficiency_description.trim().to_string(),
            proficiency_level_id: req.proficiency_level_id,
            proficiency_level_title: level_title,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        self.mappings.push(mapping.clone());
        Ok(mapping)
    }

    pub fn update_mapping(
        &mut self,
        id: Uuid,
        req: UpdateMappingRequest,
    ) -> Result<ProficiencyMapping> {
        let current = self.get_mapping(id).ok_or(Error::MappingNotFound(id))?;
        let mut next = current.clone();
        if let Some(description) = req.proficiency_description {
            next.proficiency_description = description.trim().to_string();
        }
        if let Some(level_id) = req.proficiency_level_id {
            next.proficiency_level_id = level_id;
        }

        let (skill_name, level_title, mut errors) =
            self.mapping_references(next.skill_id, next.proficiency_level_id);
        let existing: Vec<&ProficiencyMapping> = self.mappings.iter().collect();
        errors.extend(validate_mapping(
            Some(id),
            next.skill_id,
            &next.proficiency_description,
            &existing,
        ));

        let (Some(skill_name), Some(level_title), true) = (skill_name, level_title, errors.is_empty())
        else {
            return Err(Error::Validation(errors));
        };

        next.skill_name = skill_name;
        next.proficiency_level_title = level_title;
        next.updated_at = Utc::now();
        if let Some(slot) = self.mappings.iter_mut().find(|m| m.id == id) {
            *slot = next.clone();
        }
        Ok(next)
    }

    /// Move a mapping into the Inactive Bin.
    pub fn inactivate_mapping(&mut self, id: Uuid, actor: &str) -> Result<InactiveItem> {
        let idx = self
            .mappings
            .iter()
            .position(|m| m.id == id)
            .ok_or(Error::MappingNotFound(id))?;
        let mapping = self.mappings.remove(idx);
        Ok(self.bin_mapping(mapping, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skilltree_core::CreateNodeRequest;

    fn with_skill() -> (TaxonomyState, Uuid) {
        let mut state = TaxonomyState::with_default_levels();
        let cluster = state
            .create(CreateNodeRequest::cluster("Engineering", "Software"))
            .unwrap();
        let group = state
            .create(CreateNodeRequest::group(cluster.id, "Languages", "Programming"))
            .unwrap();
        let skill = state
            .create(CreateNodeRequest::skill(group.id, "Rust", "Systems language"))
            .unwrap();
        (state, skill.id)
    }

    fn mapping_req(skill_id: Uuid, level_id: Uuid, text: &str) -> CreateMappingRequest {
        CreateMappingRequest {
            skill_id,
            proficiency_description: text.to_string(),
            proficiency_level_id: level_id,
        }
    }

    #[test]
    fn test_default_levels_seeded_once() {
        let mut state = TaxonomyState::with_default_levels();
        state.seed_default_levels();
        let titles: Vec<_> = state.list_levels().iter().map(|l| l.title.clone()).collect();
        assert_eq!(titles, vec!["Beginner", "Intermediate", "Advanced", "Expert"]);
        assert_eq!(state.list_levels()[3].max_score, 100);
    }

    #[test]
    fn test_create_level_appends_order() {
        let mut state = TaxonomyState::with_default_levels();
        let level = state
            .create_level(CreateLevelRequest {
                title: "Master".to_string(),
                description: "Beyond expert".to_string(),
                min_score: 90,
                max_score: 100,
                order: None,
            })
            .unwrap();
        assert_eq!(level.order, 5);
        assert_eq!(state.find_level_by_title("MASTER").unwrap().id, level.id);
    }

    #[test]
    fn test_create_level_duplicate_title() {
        let mut state = TaxonomyState::with_default_levels();
        let err = state
            .create_level(CreateLevelRequest {
                title: "expert".to_string(),
                description: "dup".to_string(),
                min_score: 0,
                max_score: 10,
                order: None,
            })
            .unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::DuplicateTitle
        );
    }

    #[test]
    fn test_level_title_propagates_to_mappings() {
        let (mut state, skill_id) = with_skill();
        let beginner = state.find_level_by_title("Beginner").unwrap().id;
        let expert = state.find_level_by_title("Expert").unwrap().id;
        state
            .create_mapping(mapping_req(skill_id, beginner, "Writes safe code"))
            .unwrap();
        state
            .create_mapping(mapping_req(skill_id, beginner, "Uses cargo"))
            .unwrap();
        state
            .create_mapping(mapping_req(skill_id, expert, "Designs unsafe abstractions"))
            .unwrap();

        let (level, propagated) = state
            .update_level(
                beginner,
                UpdateLevelRequest {
                    title: Some("Novice".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(level.title, "Novice");
        assert_eq!(propagated, 2);
        let titles: Vec<_> = state
            .list_mappings(Some(skill_id))
            .iter()
            .map(|m| m.proficiency_level_title.clone())
            .collect();
        assert_eq!(titles, vec!["Novice", "Novice", "Expert"]);
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let (mut state, skill_id) = with_skill();
        let level = state.list_levels()[1].id;
        state
            .create_mapping(mapping_req(skill_id, level, "Reads the borrow checker"))
            .unwrap();
        let err = state
            .create_mapping(mapping_req(skill_id, level, "reads the BORROW checker "))
            .unwrap_err();
        assert_eq!(
            err.violations().unwrap()[0].rule,
            ValidationRule::DuplicateDescription
        );
        assert_eq!(state.list_mappings(None).len(), 1);
    }

    #[test]
    fn test_mapping_references_checked() {
        let (mut state, _) = with_skill();
        let err = state
            .create_mapping(mapping_req(Uuid::new_v4(), Uuid::new_v4(), "Anything"))
            .unwrap_err();
        let fields: Vec<_> = err
            .violations()
            .unwrap()
            .iter()
            .map(|v| v.field.as_str())
            .collect();
        assert_eq!(fields, vec!["skillId", "proficiencyLevelId"]);
    }

    #[test]
    fn test_update_mapping_switches_level() {
        let (mut state, skill_id) = with_skill();
        let beginner = state.find_level_by_title("Beginner").unwrap().id;
        let advanced = state.find_level_by_title("Advanced").unwrap().id;
        let mapping = state
            .create_mapping(mapping_req(skill_id, beginner, "Writes macros"))
            .unwrap();
        let updated = state
            .update_mapping(
                mapping.id,
                UpdateMappingRequest {
                    proficiency_level_id: Some(advanced),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.proficiency_level_title, "Advanced");
        assert_eq!(updated.proficiency_description, "Writes macros");
    }

    #[test]
    fn test_skill_rename_updates_mapping_skill_name() {
        let (mut state, skill_id) = with_skill();
        let level = state.list_levels()[0].id;
        state
            .create_mapping(mapping_req(skill_id, level, "Compiles hello world"))
            .unwrap();
        state
            .update(
                skill_id,
                skilltree_core::UpdateNodeRequest {
                    name: Some("Rust Programming".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(state.list_mappings(None)[0].skill_name, "Rust Programming");
    }

    #[test]
    fn test_inactivate_mapping_moves_to_bin() {
        let (mut state, skill_id) = with_skill();
        let level = state.list_levels()[0].id;
        let mapping = state
            .create_mapping(mapping_req(skill_id, level, "Compiles hello world"))
            .unwrap();
        let item = state.inactivate_mapping(mapping.id, "carol").unwrap();
        assert_eq!(item.inactivated_by, "carol");
        assert!(state.list_mappings(None).is_empty());
        assert!(matches!(
            state.inactivate_mapping(mapping.id, "carol"),
            Err(Error::MappingNotFound(_))
        ));

        // The same description can be used again once the old one is inactive.
        state
            .create_mapping(mapping_req(skill_id, level, "Compiles hello world"))
            .unwrap();
    }
}
