//! File-level checks run before any row is written.
//!
//! Each row gets at most one [`RowError`]; all of its problems are joined
//! into the message.

use std::collections::HashSet;
use std::str::FromStr;

use skilltree_core::{normalize_name, NodeKind};

use crate::codec::{MappingRow, TaxonomyRow};
use crate::report::{ImportPhase, RowError};

/// A taxonomy row that passed the structural rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedRow {
    pub row: usize,
    pub name: String,
    pub description: String,
    pub kind: NodeKind,
    /// `None` for clusters.
    pub parent: Option<String>,
}

fn row_error(row: usize, name: &str, problems: Vec<String>) -> RowError {
    RowError {
        row,
        name: name.to_string(),
        message: problems.join("; "),
        phase: ImportPhase::Structural,
    }
}

/// Check every taxonomy row. Names must be unique across the file; the
/// first occurrence wins and later ones are rejected.
pub fn check_taxonomy_rows(rows: &[TaxonomyRow]) -> (Vec<CheckedRow>, Vec<RowError>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut checked = Vec::new();
    let mut errors = Vec::new();

    for row in rows {
        let mut problems = Vec::new();

        if row.name.is_empty() {
            problems.push("Name is required".to_string());
        } else if !seen.insert(normalize_name(&row.name)) {
            problems.push(format!("Duplicate name '{}' in file", row.name));
        }

        let kind = if row.kind.is_empty() {
            problems.push("Type is required".to_string());
            None
        } else {
            match NodeKind::from_str(&row.kind) {
                Ok(kind) => Some(kind),
                Err(_) => {
                    let allowed: Vec<&str> = NodeKind::ALL.iter().map(NodeKind::as_str).collect();
                    problems.push(format!(
                        "Type must be one of {} (got '{}')",
                        allowed.join(", "),
                        row.kind
                    ));
                    None
                }
            }
        };

        match kind {
            Some(NodeKind::Cluster) if !row.parent.is_empty() => {
                problems.push("Clusters cannot have a parent".to_string());
            }
            Some(NodeKind::Group) | Some(NodeKind::Skill) if row.parent.is_empty() => {
                problems.push(format!("Parent is required for {}", row.kind.to_lowercase()));
            }
            _ => {}
        }

        if row.description.is_empty() {
            problems.push("Description is required".to_string());
        }

        match (kind, problems.is_empty()) {
            (Some(kind), true) => checked.push(CheckedRow {
                row: row.row,
                name: row.name.clone(),
                description: row.description.clone(),
                kind,
                parent: (!row.parent.is_empty()).then(|| row.parent.clone()),
            }),
            _ => errors.push(row_error(row.row, &row.name, problems)),
        }
    }

    (checked, errors)
}

/// Check every mapping row. A `(skill, description)` pair may appear only
/// once per file.
pub fn check_mapping_rows(rows: &[MappingRow]) -> (Vec<MappingRow>, Vec<RowError>) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut checked = Vec::new();
    let mut errors = Vec::new();

    for row in rows {
        let mut problems = Vec::new();
        if row.skill_name.is_empty() {
            problems.push("Skill Name is required".to_string());
        }
        if row.description.is_empty() {
            problems.push("Proficiency Description is required".to_string());
        }
        if row.level_title.is_empty() {
            problems.push("Proficiency Level is required".to_string());
        }
        if problems.is_empty()
            && !seen.insert((normalize_name(&row.skill_name), normalize_name(&row.description)))
        {
            problems.push(format!(
                "Duplicate description for '{}' in file",
                row.skill_name
            ));
        }

        if problems.is_empty() {
            checked.push(row.clone());
        } else {
            errors.push(row_error(row.row, &row.skill_name, problems));
        }
    }

    (checked, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: usize, name: &str, kind: &str, parent: &str) -> TaxonomyRow {
        TaxonomyRow {
            row: n,
            name: name.to_string(),
            description: format!("About {}", name),
            kind: kind.to_string(),
            parent: parent.to_string(),
        }
    }

    #[test]
    fn test_valid_rows_pass() {
        let rows = vec![
            row(1, "Data Science", "cluster", ""),
            row(2, "Machine Learning", "Group", "Data Science"),
            row(3, "Python for ML", "SKILL", "Machine Learning"),
        ];
        let (checked, errors) = check_taxonomy_rows(&rows);
        assert!(errors.is_empty());
        assert_eq!(checked.len(), 3);
        assert_eq!(checked[0].parent, None);
        assert_eq!(checked[2].kind, NodeKind::Skill);
    }

    #[test]
    fn test_skill_without_parent_single_error() {
        let rows = vec![row(1, "SQL", "skill", "")];
        let (checked, errors) = check_taxonomy_rows(&rows);
        assert!(checked.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, 1);
        assert!(errors[0].message.contains("Parent is required"));
    }

    #[test]
    fn test_problems_joined_into_one_message() {
        let mut bad = row(4, "", "team", "");
        bad.description.clear();
        let (_, errors) = check_taxonomy_rows(&[bad]);
        assert_eq!(errors.len(), 1);
        let message = &errors[0].message;
        assert!(message.contains("Name is required"));
        assert!(message.contains("Type must be one of cluster, group, skill (got 'team')"));
        assert!(message.contains("Description is required"));
    }

    #[test]
    fn test_cluster_with_parent_and_batch_duplicate() {
        let rows = vec![
            row(1, "Design", "cluster", "Art"),
            row(2, "Analytics", "cluster", ""),
            row(3, " analytics ", "cluster", ""),
        ];
        let (checked, errors) = check_taxonomy_rows(&rows);
        assert_eq!(checked.len(), 1);
        assert_eq!(checked[0].name, "Analytics");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("cannot have a parent"));
        assert_eq!(errors[1].row, 3);
        assert!(errors[1].message.contains("Duplicate name"));
    }

    #[test]
    fn test_mapping_batch_duplicates() {
        let mk = |n, desc: &str| MappingRow {
            row: n,
            skill_name: "SQL".to_string(),
            description: desc.to_string(),
            level_title: "Beginner".to_string(),
        };
        let (checked, errors) = check_mapping_rows(&[mk(1, "Writes SELECT"), mk(2, "writes select ")]);
        assert_eq!(checked.len(), 1);
        assert_eq!(errors[0].row, 2);
    }
}
