//! Async repository over a shared [`TaxonomyState`].
//!
//! [`MemoryRepository`] is cheap to clone: clones share the state, the event
//! bus, and the optional state file. Every successful mutation is published
//! on the event bus and, when a state file is configured, written to disk
//! before it becomes visible. A failed write discards the change.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use skilltree_core::config::SkilltreeConfig;
use skilltree_core::{
    CreateLevelRequest, CreateMappingRequest, CreateNodeRequest, Error, EventActor, EventBus,
    InactiveBinRepository, InactiveFilter, InactiveItem, ListNodesRequest, ListNodesResponse,
    MergeRecord, NodeKind, NodeTree, ProficiencyLevel, ProficiencyMapping, ProficiencyRepository,
    RestorationSignal, RestoredItem, Result, TaxonomyEvent, TaxonomyNode, TaxonomyRepository,
    UpdateLevelRequest, UpdateMappingRequest, UpdateNodeRequest, UsageCounts,
};

use crate::snapshot::{load_state, save_state, PersistedState};
use crate::state::TaxonomyState;

/// Shared, event-publishing taxonomy store.
#[derive(Clone)]
pub struct MemoryRepository {
    state: Arc<RwLock<TaxonomyState>>,
    events: Arc<EventBus>,
    actor: String,
    state_path: Option<PathBuf>,
}

impl MemoryRepository {
    /// Repository over an existing state, without persistence.
    pub fn new(state: TaxonomyState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            events: Arc::new(EventBus::default()),
            actor: skilltree_core::defaults::DEFAULT_ACTOR.to_string(),
            state_path: None,
        }
    }

    /// Empty repository seeded with the default proficiency levels.
    pub fn with_default_levels() -> Self {
        Self::new(TaxonomyState::with_default_levels())
    }

    /// Open the state file named in `config`, creating an empty store when
    /// the file does not exist yet. Mutations are written back to the file.
    pub async fn open(config: &SkilltreeConfig) -> Result<Self> {
        let path = config.store.state_path.clone();
        let state = match load_state(&path).await? {
            Some(persisted) => TaxonomyState::from(persisted),
            None if config.store.seed_default_levels => TaxonomyState::with_default_levels(),
            None => TaxonomyState::new(),
        };
        info!(
            path = %path.display(),
            nodes = state.node_count(),
            "Opened skilltree store"
        );
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            events: Arc::new(EventBus::new(config.store.event_bus_capacity)),
            actor: config.actor.clone(),
            state_path: Some(path),
        })
    }

    /// Share an existing event bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Name recorded on inactivations and merges.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Persist mutations to `path`.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Copy of the full state in its on-disk shape.
    pub async fn snapshot(&self) -> PersistedState {
        PersistedState::from(&*self.state.read().await)
    }

    /// Write the state file, if one is configured.
    pub async fn save(&self) -> Result<()> {
        let state = self.state.read().await;
        self.persist(&state).await
    }

    /// Active clusters ordered by rank.
    pub async fn roots(&self) -> Vec<TaxonomyNode> {
        self.state.read().await.roots().into_iter().cloned().collect()
    }

    /// Nodes hidden under an inactive ancestor.
    pub async fn orphans(&self) -> Vec<TaxonomyNode> {
        self.state.read().await.orphans().into_iter().cloned().collect()
    }

    /// Last restore performed, if any.
    pub async fn restoration_signal(&self) -> Option<RestorationSignal> {
        self.state.read().await.restoration_signal().cloned()
    }

    async fn persist(&self, state: &TaxonomyState) -> Result<()> {
        match &self.state_path {
            Some(path) => save_state(path, &PersistedState::from(state)).await,
            None => Ok(()),
        }
    }

    /// Run `op` under the write lock. With a state file configured the
    /// change is made on a copy that replaces the live state only once the
    /// file has been written, so a failed save leaves memory untouched.
    async fn commit<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut TaxonomyState) -> Result<T>,
    {
        let mut state = self.state.write().await;
        let Some(path) = &self.state_path else {
            return op(&mut state);
        };
        let mut draft = state.clone();
        let out = op(&mut draft)?;
        if let Err(e) = save_state(path, &PersistedState::from(&draft)).await {
            error!(path = %path.display(), error = %e, "Failed to save state, change discarded");
            return Err(e);
        }
        *state = draft;
        Ok(out)
    }

    fn emit(&self, event: TaxonomyEvent) {
        self.events
            .emit_as(event, EventActor::user(self.actor.clone()));
    }
}

#[async_trait]
impl TaxonomyRepository for MemoryRepository {
    #[instrument(
        skip(self, req),
        fields(subsystem = "store", op = "create", node_kind = %req.placement.kind())
    )]
    async fn create(&self, req: CreateNodeRequest) -> Result<TaxonomyNode> {
        let start = Instant::now();
        let node = self.commit(|state| state.create(req)).await?;

        info!(
            node_id = %node.id,
            name = %node.name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Node created"
        );
        self.emit(TaxonomyEvent::NodeCreated {
            node_id: node.id,
            kind: node.kind(),
            name: node.name.clone(),
            parent_id: node.parent_id(),
        });
        Ok(node)
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "update", node_id = %id))]
    async fn update(&self, id: Uuid, req: UpdateNodeRequest) -> Result<TaxonomyNode> {
        let node = self.commit(|state| state.update(id, req)).await?;

        debug!("Node updated");
        self.emit(TaxonomyEvent::NodeUpdated {
            node_id: node.id,
            name: node.name.clone(),
        });
        Ok(node)
    }

    #[instrument(skip(self), fields(subsystem = "store", op = "inactivate", node_id = %id))]
    async fn inactivate(&self, id: Uuid) -> Result<InactiveItem> {
        let (kind, item, hidden) = self
            .commit(|state| {
                let kind = state
                    .get(id)
                    .map(TaxonomyNode::kind)
                    .ok_or(Error::NodeNotFound(id))?;
                let item = state.inactivate(id, &self.actor)?;
                Ok((kind, item, state.orphans().len()))
            })
            .await?;

        info!(
            inactive_item_id = %item.id,
            actor = %self.actor,
            hidden_descendants = hidden,
            "Node moved to Inactive Bin"
        );
        self.emit(TaxonomyEvent::NodeInactivated {
            node_id: id,
            kind,
            inactive_item_id: item.id,
        });
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> Result<Option<TaxonomyNode>> {
        Ok(self.state.read().await.get(id).cloned())
    }

    async fn find_by_name(&self, kind: NodeKind, name: &str) -> Result<Vec<TaxonomyNode>> {
        Ok(self
            .state
            .read()
            .await
            .find_by_name(kind, name)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn children(&self, parent_id: Uuid) -> Result<Vec<TaxonomyNode>> {
        let state = self.state.read().await;
        if state.get(parent_id).is_none() {
            return Err(Error::NodeNotFound(parent_id));
        }
        Ok(state.children(parent_id).into_iter().cloned().collect())
    }

    async fn tree(&self) -> Result<Vec<NodeTree>> {
        Ok(self.state.read().await.tree())
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "list"))]
    async fn list(&self, req: ListNodesRequest) -> Result<ListNodesResponse> {
        let response = self.state.read().await.list(&req);
        debug!(
            result_count = response.nodes.len(),
            total = response.total,
            "Listed nodes"
        );
        Ok(response)
    }

    #[instrument(skip(self, usage), fields(subsystem = "store", op = "record_usage", node_id = %id))]
    async fn record_usage(&self, id: Uuid, usage: UsageCounts) -> Result<TaxonomyNode> {
        let node = self.commit(|state| state.record_usage(id, usage)).await?;

        self.emit(TaxonomyEvent::NodeUpdated {
            node_id: node.id,
            name: node.name.clone(),
        });
        Ok(node)
    }

    #[instrument(
        skip(self),
        fields(subsystem = "store", op = "merge", source_id = %source_id, target_id = %target_id)
    )]
    async fn merge(&self, source_id: Uuid, target_id: Uuid) -> Result<MergeRecord> {
        let record = self
            .commit(|state| state.merge(source_id, target_id, &self.actor))
            .await?;

        info!(
            merge_id = %record.id,
            moved_children = record.moved_children.len(),
            redirected_mappings = record.redirected_mappings.len(),
            discarded_mappings = record.discarded_mappings.len(),
            "Nodes merged"
        );
        self.emit(TaxonomyEvent::NodesMerged {
            merge_id: record.id,
            source_id,
            target_id,
            moved_children: record.moved_children.len(),
        });
        Ok(record)
    }

    async fn merge_history(&self, id: Uuid) -> Result<Vec<MergeRecord>> {
        Ok(self
            .state
            .read()
            .await
            .merge_history(id)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InactiveBinRepository for MemoryRepository {
    #[instrument(skip(self, filter), fields(subsystem = "store", op = "list_inactive"))]
    async fn list_inactive(&self, filter: InactiveFilter) -> Result<Vec<InactiveItem>> {
        let items: Vec<InactiveItem> = self
            .state
            .read()
            .await
            .list_inactive(&filter)
            .into_iter()
            .cloned()
            .collect();
        debug!(result_count = items.len(), "Listed Inactive Bin");
        Ok(items)
    }

    #[instrument(skip(self), fields(subsystem = "store", op = "restore", inactive_item_id = %inactive_item_id))]
    async fn restore(&self, inactive_item_id: Uuid) -> Result<RestoredItem> {
        let (restored, item) = self.commit(|state| state.restore(inactive_item_id)).await?;

        let restored_id = match &restored {
            RestoredItem::Node(node) => node.id,
            RestoredItem::Mapping(mapping) => mapping.id,
        };
        info!(
            restored_id = %restored_id,
            item_type = %item.item_type,
            "Item restored from Inactive Bin"
        );
        self.emit(TaxonomyEvent::ItemRestored {
            inactive_item_id,
            item_type: item.item_type,
            restored_id,
        });
        Ok(restored)
    }

    #[instrument(skip(self), fields(subsystem = "store", op = "purge", inactive_item_id = %inactive_item_id))]
    async fn purge(&self, inactive_item_id: Uuid) -> Result<InactiveItem> {
        let item = self.commit(|state| state.purge(inactive_item_id)).await?;

        info!(name = %item.name, "Inactive item purged");
        self.emit(TaxonomyEvent::ItemPurged { inactive_item_id });
        Ok(item)
    }
}

#[async_trait]
impl ProficiencyRepository for MemoryRepository {
    async fn list_levels(&self) -> Result<Vec<ProficiencyLevel>> {
        Ok(self
            .state
            .read()
            .await
            .list_levels()
            .into_iter()
            .cloned()
            .collect())
    }

    async fn get_level(&self, id: Uuid) -> Result<Option<ProficiencyLevel>> {
        Ok(self.state.read().await.get_level(id).cloned())
    }

    async fn find_level_by_title(&self, title: &str) -> Result<Option<ProficiencyLevel>> {
        Ok(self.state.read().await.find_level_by_title(title).cloned())
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "create_level"))]
    async fn create_level(&self, req: CreateLevelRequest) -> Result<ProficiencyLevel> {
        let level = self.commit(|state| state.create_level(req)).await?;

        info!(level_id = %level.id, title = %level.title, "Proficiency level created");
        self.emit(TaxonomyEvent::LevelCreated {
            level_id: level.id,
            title: level.title.clone(),
        });
        Ok(level)
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "update_level", level_id = %id))]
    async fn update_level(&self, id: Uuid, req: UpdateLevelRequest) -> Result<ProficiencyLevel> {
        let (level, propagated) = self.commit(|state| state.update_level(id, req)).await?;

        info!(
            title = %level.title,
            propagated,
            "Proficiency level updated"
        );
        self.emit(TaxonomyEvent::LevelUpdated {
            level_id: level.id,
            title: level.title.clone(),
            propagated,
        });
        Ok(level)
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "create_mapping", node_id = %req.skill_id))]
    async fn create_mapping(&self, req: CreateMappingRequest) -> Result<ProficiencyMapping> {
        let mapping = self.commit(|state| state.create_mapping(req)).await?;

        debug!(mapping_id = %mapping.id, "Proficiency mapping created");
        self.emit(TaxonomyEvent::MappingCreated {
            mapping_id: mapping.id,
            skill_id: mapping.skill_id,
        });
        Ok(mapping)
    }

    #[instrument(skip(self, req), fields(subsystem = "store", op = "update_mapping", mapping_id = %id))]
    async fn update_mapping(
        &self,
        id: Uuid,
        req: UpdateMappingRequest,
    ) -> Result<ProficiencyMapping> {
        let mapping = self.commit(|state| state.update_mapping(id, req)).await?;

        self.emit(TaxonomyEvent::MappingUpdated {
            mapping_id: mapping.id,
            skill_id: mapping.skill_id,
        });
        Ok(mapping)
    }

    #[instrument(skip(self), fields(subsystem = "store", op = "inactivate_mapping", mapping_id = %id))]
    async fn inactivate_mapping(&self, id: Uuid) -> Result<InactiveItem> {
        let item = self
            .commit(|state| state.inactivate_mapping(id, &self.actor))
            .await?;

        info!(inactive_item_id = %item.id, "Proficiency mapping moved to Inactive Bin");
        self.emit(TaxonomyEvent::MappingInactivated {
            mapping_id: id,
            inactive_item_id: item.id,
        });
        Ok(item)
    }

    async fn list_mappings(&self, skill_id: Option<Uuid>) -> Result<Vec<ProficiencyMapping>> {
        Ok(self
            .state
            .read()
            .await
            .list_mappings(skill_id)
            .into_iter()
            .cloned()
            .collect())
    }
}
