//! Related-skill suggestions.
//!
//! Suggestions come from a [`SuggestionProvider`]. The bundled
//! [`StaticSuggestionProvider`] answers from a fixed lookup table; a
//! similarity-based provider can replace it without touching callers.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validation::normalize_name;

/// A skill suggested alongside another skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSuggestion {
    pub name: String,
    /// Provider that produced the suggestion.
    pub source: String,
}

/// Source of related-skill suggestions.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Provider name, recorded on each suggestion.
    fn name(&self) -> &str;

    /// Up to `limit` suggestions for the given skill name.
    async fn suggest(&self, skill_name: &str, limit: usize) -> Result<Vec<SkillSuggestion>>;
}

/// Lookup-table provider keyed by case-insensitive skill name.
#[derive(Debug, Clone)]
pub struct StaticSuggestionProvider {
    table: HashMap<String, Vec<String>>,
}

impl StaticSuggestionProvider {
    /// Provider with a caller-supplied table.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let table = entries
            .into_iter()
            .map(|(k, v)| {
                (
                    normalize_name(k.as_ref()),
                    v.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for StaticSuggestionProvider {
    fn default() -> Self {
        Self::new([
            (
                "Python",
                vec!["NumPy", "Pandas", "Scikit-learn", "Data Visualization", "SQL"],
            ),
            (
                "Python for ML",
                vec!["TensorFlow", "PyTorch", "Scikit-learn", "Feature Engineering"],
            ),
            (
                "Machine Learning",
                vec!["Deep Learning", "Statistics", "Model Evaluation", "MLOps"],
            ),
            (
                "JavaScript",
                vec!["TypeScript", "React", "Node.js", "HTML & CSS"],
            ),
            (
                "SQL",
                vec!["Data Modeling", "Query Optimization", "ETL", "Data Warehousing"],
            ),
            (
                "Project Management",
                vec!["Agile", "Risk Management", "Stakeholder Management", "Budgeting"],
            ),
            (
                "Communication",
                vec!["Presentation", "Technical Writing", "Active Listening"],
            ),
            (
                "Cloud Computing",
                vec!["AWS", "Azure", "Kubernetes", "Infrastructure as Code"],
            ),
        ])
    }
}

#[async_trait]
impl SuggestionProvider for StaticSuggestionProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn suggest(&self, skill_name: &str, limit: usize) -> Result<Vec<SkillSuggestion>> {
        let suggestions = self
            .table
            .get(&normalize_name(skill_name))
            .map(|names| {
                names
                    .iter()
                    .take(limit)
                    .map(|n| SkillSuggestion {
                        name: n.clone(),
                        source: self.name().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(suggestions)
    }
}
