//! JSON persistence of the taxonomy state.
//!
//! The state file holds one object with camelCase keys (`nodes`,
//! `proficiencyLevels`, `inactiveItems`, `proficiencyMappings`,
//! `mergeHistory`, `taxonomyRestoration`). Writes go to a temp file that is
//! renamed over the target, so readers never see a half-written file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use skilltree_core::{
    InactiveItem, MergeRecord, ProficiencyLevel, ProficiencyMapping, RestorationSignal, Result,
    TaxonomyNode,
};

use crate::state::TaxonomyState;

/// On-disk shape of a [`TaxonomyState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub nodes: Vec<TaxonomyNode>,
    #[serde(default)]
    pub proficiency_levels: Vec<ProficiencyLevel>,
    #[serde(default)]
    pub inactive_items: Vec<InactiveItem>,
    #[serde(default)]
    pub proficiency_mappings: Vec<ProficiencyMapping>,
    #[serde(default)]
    pub merge_history: Vec<MergeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy_restoration: Option<RestorationSignal>,
}

impl From<&TaxonomyState> for PersistedState {
    fn from(state: &TaxonomyState) -> Self {
        Self {
            nodes: state.nodes.values().cloned().collect(),
            proficiency_levels: state.levels.clone(),
            inactive_items: state.inactive.clone(),
            proficiency_mappings: state.mappings.clone(),
            merge_history: state.merges.clone(),
            taxonomy_restoration: state.restoration.clone(),
        }
    }
}

impl From<PersistedState> for TaxonomyState {
    fn from(persisted: PersistedState) -> Self {
        Self {
            nodes: persisted.nodes.into_iter().map(|n| (n.id, n)).collect(),
            levels: persisted.proficiency_levels,
            mappings: persisted.proficiency_mappings,
            inactive: persisted.inactive_items,
            merges: persisted.merge_history,
            restoration: persisted.taxonomy_restoration,
        }
    }
}

/// Read a state file. A missing file yields `None`.
pub async fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    if !fs::try_exists(path).await? {
        debug!(path = %path.display(), "snapshot: no state file");
        return Ok(None);
    }
    let bytes = fs::read(path).await?;
    let persisted: PersistedState = serde_json::from_slice(&bytes).map_err(|e| {
        warn!(path = %path.display(), error = %e, "snapshot: state file is not valid JSON");
        e
    })?;
    debug!(
        path = %path.display(),
        nodes = persisted.nodes.len(),
        inactive = persisted.inactive_items.len(),
        "snapshot: loaded"
    );
    Ok(Some(persisted))
}

/// Write a state file atomically (temp file + rename).
pub async fn save_state(path: &Path, persisted: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "snapshot: create_dir_all failed");
            e
        })?;
    }

    let json = serde_json::to_vec_pretty(persisted)?;
    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).await.map_err(|e| {
        warn!(temp_path = %temp_path.display(), error = %e, "snapshot: File::create failed");
        e
    })?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(|e| {
        warn!(from = %temp_path.display(), to = %path.display(), error = %e, "snapshot: rename failed");
        e
    })?;
    debug!(path = %path.display(), bytes = json.len(), "snapshot: saved");
    Ok(())
}
