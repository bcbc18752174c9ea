//! The entity registry: canonical entity metadata with secondary indexes.
//!
//! The registry is the single shared directory of live entities. It holds
//! exactly one record per registered entity plus four secondary indexes
//! (by type, zone, room, and component kind), each mapping a key to the
//! set of entity IDs currently matching it.
//!
//! [`EntityIndex`] is the pure state; [`EntityRegistry::spawn`] wraps it
//! in a mailbox service task so every read and write is serialized
//! through a single owner -- no external locks, and no index is ever
//! observed mid-update. [`RegistryHandle`] is the cloneable client.
//!
//! # Index repair
//!
//! A metadata update repairs exactly the buckets the changed field
//! affects: a zone change moves the ID between two zone buckets, a
//! component-set change applies the added/removed delta, and status or
//! last-seen changes touch no index at all. Indexes are never rebuilt
//! from scratch.
//!
//! # Stale records
//!
//! The registry does not probe liveness. If an actor dies without its
//! shutdown cleanup (an injected fault, an abort), its record stays until
//! the supervisor's explicit unregistration or the periodic
//! [`RegistryHandle::reconcile`] sweep evicts it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use thicket_types::{ComponentKind, EntityId, EntityRecord, EntityStatus, RegistryStats};

use crate::entity_actor::EntityHandle;

/// Mailbox capacity for the registry service.
const MAILBOX_CAPACITY: usize = 256;

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The entity ID is already registered; registration never overwrites.
    #[error("entity already registered: {0}")]
    AlreadyExists(EntityId),

    /// The entity ID is not registered.
    #[error("entity not registered: {0}")]
    NotFound(EntityId),

    /// The registry service task is gone.
    #[error("entity registry service is not available")]
    Unavailable,
}

/// A single field change to an entity's registry record.
///
/// Each variant names the field it updates; the registry repairs exactly
/// the secondary indexes that field participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataUpdate {
    /// The entity moved to a different zone.
    Zone(String),
    /// The entity moved to a different room.
    Room(String),
    /// The entity's lifecycle status changed (no index affected).
    Status(EntityStatus),
    /// The entity's set of attached component kinds changed.
    Components(BTreeSet<ComponentKind>),
    /// The entity reported activity (no index affected).
    Seen(DateTime<Utc>),
}

/// One registered entity: its actor handle plus the denormalized record.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    /// Handle to the owning actor.
    pub handle: EntityHandle,
    /// The denormalized metadata snapshot.
    pub record: EntityRecord,
}

/// The pure registry state: primary records plus four secondary indexes.
///
/// Invariant: an entity ID appears in `by_zone[z]` iff its record's zone
/// is `z` (symmetrically for room, type, and each component kind it
/// holds). Every mutating method restores the invariant before returning.
#[derive(Debug, Default)]
pub struct EntityIndex {
    /// Primary map: one entry per live entity.
    entries: BTreeMap<EntityId, RegistryEntry>,
    /// Entity IDs per entity class.
    by_type: BTreeMap<thicket_types::EntityType, BTreeSet<EntityId>>,
    /// Entity IDs per zone.
    by_zone: BTreeMap<String, BTreeSet<EntityId>>,
    /// Entity IDs per room.
    by_room: BTreeMap<String, BTreeSet<EntityId>>,
    /// Entity IDs per attached component kind.
    by_component: BTreeMap<ComponentKind, BTreeSet<EntityId>>,
}

impl EntityIndex {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_type: BTreeMap::new(),
            by_zone: BTreeMap::new(),
            by_room: BTreeMap::new(),
            by_component: BTreeMap::new(),
        }
    }

    /// Register an entity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if the ID is taken; an
    /// existing registration is never overwritten.
    pub fn register(
        &mut self,
        id: EntityId,
        handle: EntityHandle,
        record: EntityRecord,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }

        index_insert(&mut self.by_type, record.entity_type, &id);
        index_insert(&mut self.by_zone, record.zone.clone(), &id);
        index_insert(&mut self.by_room, record.room.clone(), &id);
        for kind in &record.components {
            index_insert(&mut self.by_component, kind.clone(), &id);
        }

        self.entries.insert(id, RegistryEntry { handle, record });
        Ok(())
    }

    /// Unregister an entity, removing it from every index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the ID is not registered.
    pub fn unregister(&mut self, id: &EntityId) -> Result<RegistryEntry, RegistryError> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        index_remove(&mut self.by_type, &entry.record.entity_type, id);
        index_remove(&mut self.by_zone, &entry.record.zone, id);
        index_remove(&mut self.by_room, &entry.record.room, id);
        for kind in &entry.record.components {
            index_remove(&mut self.by_component, kind, id);
        }

        Ok(entry)
    }

    /// Look up one entry.
    pub fn get(&self, id: &EntityId) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// Apply a single field update, repairing exactly the affected
    /// indexes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the ID is not registered.
    pub fn update(&mut self, id: &EntityId, update: MetadataUpdate) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        match update {
            MetadataUpdate::Zone(zone) => {
                if entry.record.zone != zone {
                    index_remove(&mut self.by_zone, &entry.record.zone, id);
                    index_insert(&mut self.by_zone, zone.clone(), id);
                    entry.record.zone = zone;
                }
            }
            MetadataUpdate::Room(room) => {
                if entry.record.room != room {
                    index_remove(&mut self.by_room, &entry.record.room, id);
                    index_insert(&mut self.by_room, room.clone(), id);
                    entry.record.room = room;
                }
            }
            MetadataUpdate::Status(status) => {
                entry.record.status = status;
            }
            MetadataUpdate::Components(kinds) => {
                // Apply only the symmetric difference between the old and
                // new kind sets.
                for removed in entry.record.components.difference(&kinds) {
                    index_remove(&mut self.by_component, removed, id);
                }
                for added in kinds.difference(&entry.record.components) {
                    index_insert(&mut self.by_component, added.clone(), id);
                }
                entry.record.components = kinds;
            }
            MetadataUpdate::Seen(at) => {
                entry.record.last_seen = at;
            }
        }
        Ok(())
    }

    /// All entities of a class.
    pub fn by_type(&self, entity_type: thicket_types::EntityType) -> Vec<(EntityId, EntityRecord)> {
        self.collect(self.by_type.get(&entity_type))
    }

    /// All entities in a zone.
    pub fn by_zone(&self, zone: &str) -> Vec<(EntityId, EntityRecord)> {
        self.collect(self.by_zone.get(zone))
    }

    /// All entities in a room.
    pub fn by_room(&self, room: &str) -> Vec<(EntityId, EntityRecord)> {
        self.collect(self.by_room.get(room))
    }

    /// All entities holding a component kind.
    pub fn by_component(&self, kind: &ComponentKind) -> Vec<(EntityId, EntityRecord)> {
        self.collect(self.by_component.get(kind))
    }

    /// Aggregate counts by type, zone, and room.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total: u64::try_from(self.entries.len()).unwrap_or(u64::MAX),
            ..RegistryStats::default()
        };
        for entry in self.entries.values() {
            let type_count = stats.by_type.entry(entry.record.entity_type).or_default();
            *type_count = type_count.saturating_add(1);
            let zone_count = stats.by_zone.entry(entry.record.zone.clone()).or_default();
            *zone_count = zone_count.saturating_add(1);
            let room_count = stats.by_room.entry(entry.record.room.clone()).or_default();
            *room_count = room_count.saturating_add(1);
        }
        stats
    }

    /// Evict every record whose actor handle is dead, returning the
    /// evicted IDs. This is the reconciliation sweep for records whose
    /// shutdown cleanup was skipped.
    pub fn reconcile(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.handle.is_alive())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            let _ = self.unregister(id);
        }
        dead
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialize an index bucket into `(id, record)` pairs.
    fn collect(&self, bucket: Option<&BTreeSet<EntityId>>) -> Vec<(EntityId, EntityRecord)> {
        bucket
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.entries
                    .get(id)
                    .map(|entry| (id.clone(), entry.record.clone()))
            })
            .collect()
    }
}

/// Insert an ID into an index bucket.
fn index_insert<K: Ord>(index: &mut BTreeMap<K, BTreeSet<EntityId>>, key: K, id: &EntityId) {
    index.entry(key).or_default().insert(id.clone());
}

/// Remove an ID from an index bucket, pruning the bucket when empty.
fn index_remove<K: Ord>(index: &mut BTreeMap<K, BTreeSet<EntityId>>, key: &K, id: &EntityId) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Messages processed by the registry service.
enum RegistryCommand {
    Register {
        id: EntityId,
        handle: EntityHandle,
        record: EntityRecord,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    Unregister {
        id: EntityId,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    GetHandle {
        id: EntityId,
        reply: oneshot::Sender<Option<EntityHandle>>,
    },
    ByType {
        entity_type: thicket_types::EntityType,
        reply: oneshot::Sender<Vec<(EntityId, EntityRecord)>>,
    },
    ByZone {
        zone: String,
        reply: oneshot::Sender<Vec<(EntityId, EntityRecord)>>,
    },
    ByRoom {
        room: String,
        reply: oneshot::Sender<Vec<(EntityId, EntityRecord)>>,
    },
    ByComponent {
        kind: ComponentKind,
        reply: oneshot::Sender<Vec<(EntityId, EntityRecord)>>,
    },
    Update {
        id: EntityId,
        update: MetadataUpdate,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    Stats {
        reply: oneshot::Sender<RegistryStats>,
    },
    Reconcile {
        reply: oneshot::Sender<Vec<EntityId>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// The entity registry service.
///
/// Owns an [`EntityIndex`] inside a dedicated task; all access goes
/// through [`RegistryHandle`] messages.
pub struct EntityRegistry;

impl EntityRegistry {
    /// Start the registry service and return its client handle.
    ///
    /// The service task runs until every handle is dropped.
    pub fn spawn() -> RegistryHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        tokio::spawn(run_registry(EntityIndex::new(), rx));
        info!("Entity registry service started");
        RegistryHandle { tx }
    }
}

/// Cloneable client for the entity registry service.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    /// Mailbox sender.
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Register an entity. Fails with [`RegistryError::AlreadyExists`] if
    /// the ID is taken.
    pub async fn register(
        &self,
        id: EntityId,
        handle: EntityHandle,
        record: EntityRecord,
    ) -> Result<(), RegistryError> {
        self.request(|reply| RegistryCommand::Register {
            id,
            handle,
            record,
            reply,
        })
        .await?
    }

    /// Unregister an entity. Fails with [`RegistryError::NotFound`] if the
    /// ID is not registered.
    pub async fn unregister(&self, id: &EntityId) -> Result<(), RegistryError> {
        self.request(|reply| RegistryCommand::Unregister {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Look up the actor handle for an entity, or `None` if unregistered.
    pub async fn get_handle(&self, id: &EntityId) -> Result<Option<EntityHandle>, RegistryError> {
        self.request(|reply| RegistryCommand::GetHandle {
            id: id.clone(),
            reply,
        })
        .await
    }

    /// All entities of a class.
    pub async fn entities_by_type(
        &self,
        entity_type: thicket_types::EntityType,
    ) -> Result<Vec<(EntityId, EntityRecord)>, RegistryError> {
        self.request(|reply| RegistryCommand::ByType { entity_type, reply })
            .await
    }

    /// All entities in a zone.
    pub async fn entities_in_zone(
        &self,
        zone: &str,
    ) -> Result<Vec<(EntityId, EntityRecord)>, RegistryError> {
        self.request(|reply| RegistryCommand::ByZone {
            zone: zone.to_owned(),
            reply,
        })
        .await
    }

    /// All entities in a room.
    pub async fn entities_in_room(
        &self,
        room: &str,
    ) -> Result<Vec<(EntityId, EntityRecord)>, RegistryError> {
        self.request(|reply| RegistryCommand::ByRoom {
            room: room.to_owned(),
            reply,
        })
        .await
    }

    /// All entities holding a component kind.
    pub async fn entities_with_component(
        &self,
        kind: ComponentKind,
    ) -> Result<Vec<(EntityId, EntityRecord)>, RegistryError> {
        self.request(|reply| RegistryCommand::ByComponent { kind, reply })
            .await
    }

    /// Apply a single field update to an entity's record.
    pub async fn update(&self, id: EntityId, update: MetadataUpdate) -> Result<(), RegistryError> {
        self.request(|reply| RegistryCommand::Update { id, update, reply })
            .await?
    }

    /// Aggregate counts by type, zone, and room.
    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        self.request(|reply| RegistryCommand::Stats { reply }).await
    }

    /// Run the reconciliation sweep, evicting records with dead handles.
    /// Returns the evicted IDs.
    pub async fn reconcile(&self) -> Result<Vec<EntityId>, RegistryError> {
        self.request(|reply| RegistryCommand::Reconcile { reply })
            .await
    }

    /// Number of registered entities.
    pub async fn count(&self) -> Result<usize, RegistryError> {
        self.request(|reply| RegistryCommand::Count { reply }).await
    }

    /// Send a request and await its oneshot reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_send_err| RegistryError::Unavailable)?;
        reply_rx.await.map_err(|_recv_err| RegistryError::Unavailable)
    }
}

/// The registry service loop: serializes every operation on the index.
async fn run_registry(mut index: EntityIndex, mut rx: mpsc::Receiver<RegistryCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            RegistryCommand::Register {
                id,
                handle,
                record,
                reply,
            } => {
                let result = index.register(id.clone(), handle, record);
                if result.is_ok() {
                    debug!(entity = %id, total = index.len(), "Entity registered");
                }
                let _ = reply.send(result);
            }
            RegistryCommand::Unregister { id, reply } => {
                let result = index.unregister(&id).map(|_entry| ());
                if result.is_ok() {
                    debug!(entity = %id, total = index.len(), "Entity unregistered");
                }
                let _ = reply.send(result);
            }
            RegistryCommand::GetHandle { id, reply } => {
                let _ = reply.send(index.get(&id).map(|entry| entry.handle.clone()));
            }
            RegistryCommand::ByType { entity_type, reply } => {
                let _ = reply.send(index.by_type(entity_type));
            }
            RegistryCommand::ByZone { zone, reply } => {
                let _ = reply.send(index.by_zone(&zone));
            }
            RegistryCommand::ByRoom { room, reply } => {
                let _ = reply.send(index.by_room(&room));
            }
            RegistryCommand::ByComponent { kind, reply } => {
                let _ = reply.send(index.by_component(&kind));
            }
            RegistryCommand::Update { id, update, reply } => {
                let _ = reply.send(index.update(&id, update));
            }
            RegistryCommand::Stats { reply } => {
                let _ = reply.send(index.stats());
            }
            RegistryCommand::Reconcile { reply } => {
                let evicted = index.reconcile();
                if !evicted.is_empty() {
                    warn!(
                        evicted = evicted.len(),
                        "Reconciliation swept stale entity records"
                    );
                }
                let _ = reply.send(evicted);
            }
            RegistryCommand::Count { reply } => {
                let _ = reply.send(index.len());
            }
        }
    }
    debug!("Entity registry service stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thicket_types::EntityType;

    use super::*;
    use crate::entity_actor;

    fn make_record(entity_type: EntityType, zone: &str, room: &str) -> EntityRecord {
        EntityRecord {
            entity_type,
            zone: zone.to_owned(),
            room: room.to_owned(),
            components: BTreeSet::from([ComponentKind::Health]),
            status: EntityStatus::Active,
            last_seen: Utc::now(),
        }
    }

    /// A handle whose actor task never runs; alive until `rx` drops.
    fn dummy_handle(id: &str) -> (EntityHandle, impl Sized) {
        let id = EntityId::from(id);
        let (handle, rx) = entity_actor::open_mailbox(&id);
        (handle, rx)
    }

    #[test]
    fn register_twice_fails() {
        let mut index = EntityIndex::new();
        let (handle, _rx) = dummy_handle("e1");

        assert!(
            index
                .register(
                    EntityId::from("e1"),
                    handle.clone(),
                    make_record(EntityType::Player, "z1", "r1")
                )
                .is_ok()
        );
        assert_eq!(
            index.register(
                EntityId::from("e1"),
                handle,
                make_record(EntityType::Player, "z1", "r1")
            ),
            Err(RegistryError::AlreadyExists(EntityId::from("e1")))
        );
    }

    #[test]
    fn unregister_then_reregister_succeeds() {
        let mut index = EntityIndex::new();
        let (handle, _rx) = dummy_handle("e1");

        let record = make_record(EntityType::Player, "z1", "r1");
        index
            .register(EntityId::from("e1"), handle.clone(), record.clone())
            .unwrap();
        index.unregister(&EntityId::from("e1")).unwrap();
        assert_eq!(
            index.unregister(&EntityId::from("e1")),
            Err(RegistryError::NotFound(EntityId::from("e1")))
        );
        assert!(index.register(EntityId::from("e1"), handle, record).is_ok());
    }

    #[test]
    fn zone_change_moves_index_buckets() {
        let mut index = EntityIndex::new();
        let (handle, _rx) = dummy_handle("e1");
        index
            .register(
                EntityId::from("e1"),
                handle,
                make_record(EntityType::Player, "z1", "r1"),
            )
            .unwrap();

        let in_z1: Vec<_> = index.by_zone("z1").into_iter().map(|(id, _)| id).collect();
        assert_eq!(in_z1, vec![EntityId::from("e1")]);

        index
            .update(&EntityId::from("e1"), MetadataUpdate::Zone("z2".to_owned()))
            .unwrap();

        assert!(index.by_zone("z1").is_empty());
        let in_z2: Vec<_> = index.by_zone("z2").into_iter().map(|(id, _)| id).collect();
        assert_eq!(in_z2, vec![EntityId::from("e1")]);
    }

    #[test]
    fn component_delta_repairs_only_affected_buckets() {
        let mut index = EntityIndex::new();
        let (handle, _rx) = dummy_handle("e1");
        index
            .register(
                EntityId::from("e1"),
                handle,
                make_record(EntityType::Player, "z1", "r1"),
            )
            .unwrap();

        // health -> {health, mana}
        index
            .update(
                &EntityId::from("e1"),
                MetadataUpdate::Components(BTreeSet::from([
                    ComponentKind::Health,
                    ComponentKind::Mana,
                ])),
            )
            .unwrap();
        assert_eq!(index.by_component(&ComponentKind::Mana).len(), 1);
        assert_eq!(index.by_component(&ComponentKind::Health).len(), 1);

        // {health, mana} -> {mana}
        index
            .update(
                &EntityId::from("e1"),
                MetadataUpdate::Components(BTreeSet::from([ComponentKind::Mana])),
            )
            .unwrap();
        assert!(index.by_component(&ComponentKind::Health).is_empty());
        assert_eq!(index.by_component(&ComponentKind::Mana).len(), 1);
    }

    #[test]
    fn indexes_agree_with_records_after_update_sequences() {
        let mut index = EntityIndex::new();
        let (h1, _rx1) = dummy_handle("e1");
        let (h2, _rx2) = dummy_handle("e2");
        index
            .register(EntityId::from("e1"), h1, make_record(EntityType::Player, "z1", "r1"))
            .unwrap();
        index
            .register(EntityId::from("e2"), h2, make_record(EntityType::Mob, "z1", "r2"))
            .unwrap();

        let updates = [
            (EntityId::from("e1"), MetadataUpdate::Zone("z2".to_owned())),
            (EntityId::from("e1"), MetadataUpdate::Room("r9".to_owned())),
            (EntityId::from("e2"), MetadataUpdate::Zone("z3".to_owned())),
            (EntityId::from("e1"), MetadataUpdate::Zone("z3".to_owned())),
            (
                EntityId::from("e2"),
                MetadataUpdate::Components(BTreeSet::new()),
            ),
        ];
        for (id, update) in updates {
            index.update(&id, update).unwrap();
        }

        // Every record's fields match its index membership.
        for zone in ["z1", "z2", "z3"] {
            for (id, record) in index.by_zone(zone) {
                assert_eq!(record.zone, zone);
                assert_eq!(index.get(&id).map(|e| e.record.zone.clone()), Some(zone.to_owned()));
            }
        }
        assert!(index.by_zone("z1").is_empty());
        assert!(index.by_zone("z2").is_empty());
        assert_eq!(index.by_zone("z3").len(), 2);
        assert!(index.by_component(&ComponentKind::Health).len() == 1);
    }

    #[test]
    fn stats_aggregate_counts() {
        let mut index = EntityIndex::new();
        let (h1, _rx1) = dummy_handle("e1");
        let (h2, _rx2) = dummy_handle("e2");
        let (h3, _rx3) = dummy_handle("e3");
        index
            .register(EntityId::from("e1"), h1, make_record(EntityType::Player, "z1", "r1"))
            .unwrap();
        index
            .register(EntityId::from("e2"), h2, make_record(EntityType::Mob, "z1", "r2"))
            .unwrap();
        index
            .register(EntityId::from("e3"), h3, make_record(EntityType::Mob, "z2", "r3"))
            .unwrap();

        let stats = index.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type.get(&EntityType::Mob).copied(), Some(2));
        assert_eq!(stats.by_zone.get("z1").copied(), Some(2));
        assert_eq!(stats.by_room.get("r3").copied(), Some(1));
    }

    #[test]
    fn reconcile_evicts_dead_handles() {
        let mut index = EntityIndex::new();
        let (h1, rx1) = dummy_handle("e1");
        let (h2, _rx2) = dummy_handle("e2");
        index
            .register(EntityId::from("e1"), h1, make_record(EntityType::Player, "z1", "r1"))
            .unwrap();
        index
            .register(EntityId::from("e2"), h2, make_record(EntityType::Mob, "z1", "r1"))
            .unwrap();

        // Dropping the receiver kills e1's mailbox, as an abrupt crash would.
        drop(rx1);

        let evicted = index.reconcile();
        assert_eq!(evicted, vec![EntityId::from("e1")]);
        assert_eq!(index.len(), 1);
        assert!(index.get(&EntityId::from("e1")).is_none());
        assert!(index.reconcile().is_empty());
    }

    #[tokio::test]
    async fn service_serializes_operations() {
        let registry = EntityRegistry::spawn();
        let (handle, _rx) = dummy_handle("e1");

        registry
            .register(
                EntityId::from("e1"),
                handle,
                make_record(EntityType::Player, "z1", "r1"),
            )
            .await
            .unwrap();

        assert_eq!(registry.count().await.unwrap(), 1);
        assert!(registry.get_handle(&EntityId::from("e1")).await.unwrap().is_some());

        registry
            .update(EntityId::from("e1"), MetadataUpdate::Zone("z2".to_owned()))
            .await
            .unwrap();
        assert_eq!(registry.entities_in_zone("z2").await.unwrap().len(), 1);

        registry.unregister(&EntityId::from("e1")).await.unwrap();
        assert_eq!(registry.count().await.unwrap(), 0);
    }
}
