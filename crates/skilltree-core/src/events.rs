//! Taxonomy event types, envelope schema, and event bus.
//!
//! Every mutation of the store and every import step is published on a
//! single broadcast channel. Views that need to stay consistent with the
//! Inactive Bin or the proficiency mappings subscribe instead of re-reading
//! shared state on a timer.
//!
//! ## Envelope Schema
//!
//! Emissions use [`EventEnvelope`], a versioned wrapper around the domain
//! [`TaxonomyEvent`]. The `event_type` field uses dot-namespaced names
//! (e.g. `"node.created"`, `"item.restored"`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{InactiveItemType, NodeKind};

// ============================================================================
// Event Envelope
// ============================================================================

/// Actor metadata for event attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventActor {
    /// Actor type: `"system"` or `"user"`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EventActor {
    /// System actor (imports, internal processes).
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            name: None,
        }
    }

    /// Named user actor.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: "user".to_string(),
            name: Some(name.into()),
        }
    }
}

/// Versioned event envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"node.created"`).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: EventActor,
    /// Type of entity this event relates to (e.g., `"node"`, `"mapping"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Payload schema version.
    pub payload_version: u32,
    pub payload: TaxonomyEvent,
}

impl EventEnvelope {
    /// Create an envelope attributed to the system actor.
    pub fn new(event: TaxonomyEvent) -> Self {
        Self::with_actor(event, EventActor::system())
    }

    pub fn with_actor(event: TaxonomyEvent, actor: EventActor) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            actor,
            entity_type: event.entity_type().map(String::from),
            entity_id: event.entity_id().map(|id| id.to_string()),
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Taxonomy Event (domain payloads)
// ============================================================================

/// Domain event emitted after a state change.
///
/// Serialized as JSON with a `type` tag field, e.g.
/// `{"type":"NodeCreated","node_id":"...","kind":"cluster",...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TaxonomyEvent {
    NodeCreated {
        node_id: Uuid,
        kind: NodeKind,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<Uuid>,
    },
    NodeUpdated {
        node_id: Uuid,
        name: String,
    },
    /// A node left the active tree for the Inactive Bin.
    NodeInactivated {
        node_id: Uuid,
        kind: NodeKind,
        inactive_item_id: Uuid,
    },
    /// An Inactive Bin entry was restored into the active state.
    ItemRestored {
        inactive_item_id: Uuid,
        item_type: InactiveItemType,
        restored_id: Uuid,
    },
    /// An Inactive Bin entry was permanently discarded.
    ItemPurged {
        inactive_item_id: Uuid,
    },
    NodesMerged {
        merge_id: Uuid,
        source_id: Uuid,
        target_id: Uuid,
        moved_children: usize,
    },
    LevelCreated {
        level_id: Uuid,
        title: String,
    },
    /// A global level changed; `propagated` mappings had their title rewritten.
    LevelUpdated {
        level_id: Uuid,
        title: String,
        propagated: usize,
    },
    MappingCreated {
        mapping_id: Uuid,
        skill_id: Uuid,
    },
    MappingUpdated {
        mapping_id: Uuid,
        skill_id: Uuid,
    },
    MappingInactivated {
        mapping_id: Uuid,
        inactive_item_id: Uuid,
    },
    ImportProgress {
        import_id: Uuid,
        processed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
    },
    ImportCompleted {
        import_id: Uuid,
        created: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl TaxonomyEvent {
    /// Namespaced event type for the envelope (e.g., `"node.created"`).
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            TaxonomyEvent::NodeCreated { .. } => "node.created",
            TaxonomyEvent::NodeUpdated { .. } => "node.updated",
            TaxonomyEvent::NodeInactivated { .. } => "node.inactivated",
            TaxonomyEvent::ItemRestored { .. } => "item.restored",
            TaxonomyEvent::ItemPurged { .. } => "item.purged",
            TaxonomyEvent::NodesMerged { .. } => "node.merged",
            TaxonomyEvent::LevelCreated { .. } => "level.created",
            TaxonomyEvent::LevelUpdated { .. } => "level.updated",
            TaxonomyEvent::MappingCreated { .. } => "mapping.created",
            TaxonomyEvent::MappingUpdated { .. } => "mapping.updated",
            TaxonomyEvent::MappingInactivated { .. } => "mapping.inactivated",
            TaxonomyEvent::ImportProgress { .. } => "import.progress",
            TaxonomyEvent::ImportCompleted { .. } => "import.completed",
        }
    }

    /// Entity type this event relates to.
    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            TaxonomyEvent::NodeCreated { .. }
            | TaxonomyEvent::NodeUpdated { .. }
            | TaxonomyEvent::NodeInactivated { .. }
            | TaxonomyEvent::NodesMerged { .. } => Some("node"),
            TaxonomyEvent::ItemRestored { .. } | TaxonomyEvent::ItemPurged { .. } => {
                Some("inactive_item")
            }
            TaxonomyEvent::LevelCreated { .. } | TaxonomyEvent::LevelUpdated { .. } => {
                Some("level")
            }
            TaxonomyEvent::MappingCreated { .. }
            | TaxonomyEvent::MappingUpdated { .. }
            | TaxonomyEvent::MappingInactivated { .. } => Some("mapping"),
            TaxonomyEvent::ImportProgress { .. } | TaxonomyEvent::ImportCompleted { .. } => {
                Some("import")
            }
        }
    }

    /// Primary entity ID this event relates to.
    pub fn entity_id(&self) -> Option<Uuid> {
        match self {
            TaxonomyEvent::NodeCreated { node_id, .. }
            | TaxonomyEvent::NodeUpdated { node_id, .. }
            | TaxonomyEvent::NodeInactivated { node_id, .. } => Some(*node_id),
            TaxonomyEvent::NodesMerged { target_id, .. } => Some(*target_id),
            TaxonomyEvent::ItemRestored {
                inactive_item_id, ..
            }
            | TaxonomyEvent::ItemPurged { inactive_item_id } => Some(*inactive_item_id),
            TaxonomyEvent::LevelCreated { level_id, .. }
            | TaxonomyEvent::LevelUpdated { level_id, .. } => Some(*level_id),
            TaxonomyEvent::MappingCreated { mapping_id, .. }
            | TaxonomyEvent::MappingUpdated { mapping_id, .. }
            | TaxonomyEvent::MappingInactivated { mapping_id, .. } => Some(*mapping_id),
            TaxonomyEvent::ImportProgress { import_id, .. }
            | TaxonomyEvent::ImportCompleted { import_id, .. } => Some(*import_id),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for distributing taxonomy events.
///
/// Uses `tokio::sync::broadcast`. Slow receivers that fall behind receive a
/// `Lagged` error and should re-read the state they care about.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event attributed to the system actor. Dropped silently if
    /// nobody is subscribed.
    pub fn emit(&self, event: TaxonomyEvent) {
        self.send(EventEnvelope::new(event));
    }

    /// Emit an event attributed to the given actor.
    pub fn emit_as(&self, event: TaxonomyEvent, actor: EventActor) {
        self.send(EventEnvelope::with_actor(event, actor));
    }

    fn send(&self, envelope: EventEnvelope) {
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to enveloped events. Each subscriber gets its own stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
