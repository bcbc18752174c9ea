//! Per-class entity supervision with restart policies.
//!
//! Entities are grouped under one supervisor per entity class (player,
//! NPC, mob, item). Each supervisor isolates failures: a crashing child
//! affects no sibling. The restart policy differs by class:
//!
//! - **players** restart unconditionally after a crash (state is rebuilt
//!   from the retained spawn spec; nothing in-memory survives)
//! - **NPCs, mobs, and items** restart only on explicit request
//!
//! A supervisor starts each child by registering its identity with the
//! entity registry *first* -- so a duplicate ID fails fast and at most
//! one live actor per identity can exist -- and then spawning the actor
//! task plus a monitor task that reports the child's exit back to the
//! supervisor mailbox. On an observed crash the supervisor explicitly
//! unregisters the stale record before applying the restart policy,
//! covering the cleanup the crashed actor skipped.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use thicket_entity::{ComponentBag, EntityState};
use thicket_types::{Component, ComponentKind, EntityId, EntityType, Position, TickData};

use crate::entity_actor::{self, EntityHandle};
use crate::entity_registry::{RegistryError, RegistryHandle};

/// Mailbox capacity for one supervisor.
const MAILBOX_CAPACITY: usize = 128;

/// Errors that can occur during supervision operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    /// Registration of the child identity failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The entity is not supervised here.
    #[error("entity {0} is not supervised")]
    NotFound(EntityId),

    /// The entity has not crashed, so there is nothing to restart.
    #[error("entity {0} has not crashed; nothing to restart")]
    NotCrashed(EntityId),

    /// The spec's entity class does not match this supervisor's class.
    #[error("supervisor for {expected:?} entities cannot spawn a {got:?}")]
    WrongClass {
        /// The class this supervisor manages.
        expected: EntityType,
        /// The class the spec asked for.
        got: EntityType,
    },

    /// The supervisor service task is gone.
    #[error("supervisor for {0:?} entities is not available")]
    Unavailable(EntityType),
}

/// How a supervisor reacts to a crashed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart the child immediately, from its retained spawn spec.
    Always,
    /// Keep the child stopped until an explicit restart request.
    OnDemand,
}

/// The per-class restart policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicies {
    /// Policy for player entities.
    pub player: RestartPolicy,
    /// Policy for NPC entities.
    pub npc: RestartPolicy,
    /// Policy for mob entities.
    pub mob: RestartPolicy,
    /// Policy for item entities.
    pub item: RestartPolicy,
}

impl RestartPolicies {
    /// The policy for a given entity class.
    pub const fn for_type(&self, entity_type: EntityType) -> RestartPolicy {
        match entity_type {
            EntityType::Player => self.player,
            EntityType::Npc => self.npc,
            EntityType::Mob => self.mob,
            EntityType::Item => self.item,
        }
    }
}

impl Default for RestartPolicies {
    /// Players restart unconditionally; everything else on demand.
    fn default() -> Self {
        Self {
            player: RestartPolicy::Always,
            npc: RestartPolicy::OnDemand,
            mob: RestartPolicy::OnDemand,
            item: RestartPolicy::OnDemand,
        }
    }
}

/// Everything needed to start (or restart) one entity actor.
///
/// The supervisor retains the spec for the lifetime of the child; a
/// restart rebuilds the actor's state from it, so any state the entity
/// accumulated since spawn is lost unless externally persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpec {
    /// The entity's globally unique identity.
    pub id: EntityId,
    /// The entity's class.
    pub entity_type: EntityType,
    /// Initial components.
    pub components: BTreeMap<ComponentKind, Component>,
    /// Initial position.
    pub position: Position,
}

impl EntitySpec {
    /// Create a spec with no components.
    pub const fn new(id: EntityId, entity_type: EntityType, position: Position) -> Self {
        Self {
            id,
            entity_type,
            components: BTreeMap::new(),
            position,
        }
    }

    /// Attach an initial component, returning `self` for chained
    /// construction.
    #[must_use]
    pub fn with_component(mut self, kind: ComponentKind, component: Component) -> Self {
        self.components.insert(kind, component);
        self
    }

    /// Build a fresh actor state from this spec.
    fn build_state(&self) -> EntityState {
        EntityState::with_components(
            self.id.clone(),
            self.entity_type,
            self.position.clone(),
            ComponentBag::from_components(self.components.clone()),
        )
    }
}

/// Messages processed by a supervisor's mailbox loop.
enum SupervisorCommand {
    Spawn {
        spec: EntitySpec,
        reply: oneshot::Sender<Result<EntityHandle, SupervisorError>>,
    },
    Stop {
        id: EntityId,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Restart {
        id: EntityId,
        reply: oneshot::Sender<Result<EntityHandle, SupervisorError>>,
    },
    Tick(TickData),
    /// From a monitor task: a child's actor task finished.
    ChildExited { id: EntityId, panicked: bool },
    Children {
        reply: oneshot::Sender<Vec<EntityId>>,
    },
    Crashed {
        reply: oneshot::Sender<Vec<EntityId>>,
    },
}

/// Cloneable client for one per-class supervisor.
#[derive(Debug, Clone)]
pub struct EntitySupervisor {
    /// The entity class this supervisor manages.
    entity_type: EntityType,
    /// Mailbox sender.
    tx: mpsc::Sender<SupervisorCommand>,
}

impl EntitySupervisor {
    /// Start a supervisor for one entity class.
    pub fn spawn(entity_type: EntityType, policy: RestartPolicy, registry: RegistryHandle) -> Self {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let service = SupervisorService {
            entity_type,
            policy,
            registry,
            self_tx: tx.clone(),
            children: BTreeMap::new(),
            crashed: BTreeMap::new(),
        };
        tokio::spawn(service.run(rx));
        info!(?entity_type, ?policy, "Entity supervisor started");
        Self { entity_type, tx }
    }

    /// The entity class this supervisor manages.
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Start a supervised entity actor from a spec.
    ///
    /// # Errors
    ///
    /// Fails with [`SupervisorError::WrongClass`] for a mismatched spec,
    /// or [`RegistryError::AlreadyExists`] (wrapped) for a duplicate ID.
    pub async fn spawn_entity(&self, spec: EntitySpec) -> Result<EntityHandle, SupervisorError> {
        if spec.entity_type != self.entity_type {
            return Err(SupervisorError::WrongClass {
                expected: self.entity_type,
                got: spec.entity_type,
            });
        }
        self.request(|reply| SupervisorCommand::Spawn { spec, reply })
            .await?
    }

    /// Stop a supervised entity gracefully.
    pub async fn stop_entity(&self, id: &EntityId) -> Result<(), SupervisorError> {
        self.request(|reply| SupervisorCommand::Stop {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Restart a crashed entity (the explicit-request path for classes
    /// with the on-demand policy).
    ///
    /// # Errors
    ///
    /// Fails with [`SupervisorError::NotCrashed`] if the entity is not in
    /// the crashed set.
    pub async fn restart_entity(&self, id: &EntityId) -> Result<EntityHandle, SupervisorError> {
        self.request(|reply| SupervisorCommand::Restart {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Fan a tick out to every live child, without blocking the emitter.
    pub fn broadcast_tick(&self, tick: &TickData) {
        if let Err(err) = self.tx.try_send(SupervisorCommand::Tick(tick.clone())) {
            warn!(entity_type = ?self.entity_type, %err, "Supervisor mailbox rejected tick");
        }
    }

    /// IDs of the currently supervised (live) children.
    pub async fn children(&self) -> Result<Vec<EntityId>, SupervisorError> {
        self.request(|reply| SupervisorCommand::Children { reply })
            .await
    }

    /// IDs of crashed children awaiting an explicit restart.
    pub async fn crashed_children(&self) -> Result<Vec<EntityId>, SupervisorError> {
        self.request(|reply| SupervisorCommand::Crashed { reply })
            .await
    }

    /// Send a request and await its oneshot reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorCommand,
    ) -> Result<T, SupervisorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_send_err| SupervisorError::Unavailable(self.entity_type))?;
        reply_rx
            .await
            .map_err(|_recv_err| SupervisorError::Unavailable(self.entity_type))
    }
}

/// One supervised child: its retained spec and live handle.
struct ChildEntry {
    spec: EntitySpec,
    handle: EntityHandle,
}

/// The supervisor's service state.
struct SupervisorService {
    entity_type: EntityType,
    policy: RestartPolicy,
    registry: RegistryHandle,
    /// Sender for monitor tasks to report child exits.
    self_tx: mpsc::Sender<SupervisorCommand>,
    /// Live children by ID.
    children: BTreeMap<EntityId, ChildEntry>,
    /// Crashed children awaiting an explicit restart.
    crashed: BTreeMap<EntityId, EntitySpec>,
}

impl SupervisorService {
    /// The supervisor's mailbox loop.
    async fn run(mut self, mut rx: mpsc::Receiver<SupervisorCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                SupervisorCommand::Spawn { spec, reply } => {
                    let _ = reply.send(self.start_child(spec).await);
                }
                SupervisorCommand::Stop { id, reply } => {
                    let result = match self.children.get(&id) {
                        Some(entry) => {
                            // The stop is acknowledged by the actor after it
                            // unregisters; the monitor will deliver the
                            // (graceful) exit afterwards.
                            let _ = entry.handle.stop().await;
                            Ok(())
                        }
                        None => Err(SupervisorError::NotFound(id)),
                    };
                    let _ = reply.send(result);
                }
                SupervisorCommand::Restart { id, reply } => {
                    let result = match self.crashed.remove(&id) {
                        Some(spec) => self.start_child(spec).await,
                        None => Err(SupervisorError::NotCrashed(id)),
                    };
                    let _ = reply.send(result);
                }
                SupervisorCommand::Tick(tick) => {
                    for entry in self.children.values() {
                        entry.handle.process_tick(tick.clone());
                    }
                }
                SupervisorCommand::ChildExited { id, panicked } => {
                    self.handle_child_exit(id, panicked).await;
                }
                SupervisorCommand::Children { reply } => {
                    let _ = reply.send(self.children.keys().cloned().collect());
                }
                SupervisorCommand::Crashed { reply } => {
                    let _ = reply.send(self.crashed.keys().cloned().collect());
                }
            }
        }
    }

    /// Register the child's identity, then spawn its actor and monitor.
    ///
    /// Registration comes first so a duplicate ID fails before any task
    /// starts: at most one live actor per identity.
    async fn start_child(&mut self, spec: EntitySpec) -> Result<EntityHandle, SupervisorError> {
        let state = spec.build_state();
        let (handle, mailbox) = entity_actor::open_mailbox(&spec.id);

        self.registry
            .register(spec.id.clone(), handle.clone(), state.record())
            .await?;

        let join = tokio::spawn(entity_actor::run_entity_actor(
            state,
            self.registry.clone(),
            mailbox,
        ));

        // Monitor: report the child's exit back to the supervisor mailbox.
        let monitor_tx = self.self_tx.clone();
        let monitored_id = spec.id.clone();
        tokio::spawn(async move {
            let panicked = match join.await {
                Ok(()) => false,
                Err(err) => err.is_panic(),
            };
            let _ = monitor_tx
                .send(SupervisorCommand::ChildExited {
                    id: monitored_id,
                    panicked,
                })
                .await;
        });

        info!(entity = %spec.id, entity_type = ?self.entity_type, "Child started");
        self.children.insert(
            spec.id.clone(),
            ChildEntry {
                spec,
                handle: handle.clone(),
            },
        );
        Ok(handle)
    }

    /// Apply the restart policy to an exited child.
    ///
    /// A graceful exit needs no action (the actor unregistered itself). A
    /// crash skipped that cleanup, so the stale record is unregistered
    /// here before the policy decides between an immediate restart and
    /// parking the spec for an explicit one. Siblings are untouched either
    /// way.
    async fn handle_child_exit(&mut self, id: EntityId, panicked: bool) {
        let Some(entry) = self.children.remove(&id) else {
            return;
        };
        if !panicked {
            return;
        }

        warn!(entity = %id, entity_type = ?self.entity_type, "Child crashed");
        if let Err(err) = self.registry.unregister(&id).await
            && !matches!(err, RegistryError::NotFound(_))
        {
            warn!(entity = %id, %err, "Failed to clean up crashed child's record");
        }

        match self.policy {
            RestartPolicy::Always => match self.start_child(entry.spec).await {
                Ok(_handle) => info!(entity = %id, "Child restarted after crash"),
                Err(err) => warn!(entity = %id, %err, "Child restart failed"),
            },
            RestartPolicy::OnDemand => {
                info!(entity = %id, "Child parked; awaiting explicit restart");
                self.crashed.insert(id, entry.spec);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor set
// ---------------------------------------------------------------------------

/// The full supervision tree: one supervisor per entity class.
#[derive(Debug, Clone)]
pub struct SupervisorSet {
    /// Per-class supervisors.
    supervisors: BTreeMap<EntityType, EntitySupervisor>,
}

impl SupervisorSet {
    /// Start one supervisor per entity class with the given policy table.
    pub fn spawn(policies: RestartPolicies, registry: &RegistryHandle) -> Self {
        let supervisors = EntityType::ALL
            .into_iter()
            .map(|entity_type| {
                (
                    entity_type,
                    EntitySupervisor::spawn(
                        entity_type,
                        policies.for_type(entity_type),
                        registry.clone(),
                    ),
                )
            })
            .collect();
        Self { supervisors }
    }

    /// The supervisor for one entity class.
    pub fn supervisor(&self, entity_type: EntityType) -> Option<&EntitySupervisor> {
        self.supervisors.get(&entity_type)
    }

    /// Spawn an entity under the supervisor for its class.
    pub async fn spawn_entity(&self, spec: EntitySpec) -> Result<EntityHandle, SupervisorError> {
        match self.supervisors.get(&spec.entity_type) {
            Some(supervisor) => supervisor.spawn_entity(spec).await,
            None => Err(SupervisorError::Unavailable(spec.entity_type)),
        }
    }

    /// Stop an entity under the supervisor for its class.
    pub async fn stop_entity(
        &self,
        entity_type: EntityType,
        id: &EntityId,
    ) -> Result<(), SupervisorError> {
        match self.supervisors.get(&entity_type) {
            Some(supervisor) => supervisor.stop_entity(id).await,
            None => Err(SupervisorError::Unavailable(entity_type)),
        }
    }

    /// Restart a crashed entity under the supervisor for its class.
    pub async fn restart_entity(
        &self,
        entity_type: EntityType,
        id: &EntityId,
    ) -> Result<EntityHandle, SupervisorError> {
        match self.supervisors.get(&entity_type) {
            Some(supervisor) => supervisor.restart_entity(id).await,
            None => Err(SupervisorError::Unavailable(entity_type)),
        }
    }

    /// Fan a tick out to every supervised entity of every class.
    pub fn broadcast_tick(&self, tick: &TickData) {
        for supervisor in self.supervisors.values() {
            supervisor.broadcast_tick(tick);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use thicket_types::TickSource;

    use super::*;
    use crate::entity_registry::EntityRegistry;

    fn player_spec(id: &str) -> EntitySpec {
        EntitySpec::new(
            EntityId::from(id),
            EntityType::Player,
            Position::new("z1", "r1"),
        )
        .with_component(ComponentKind::Health, Component::with_current(80, 100, 15))
    }

    fn mob_spec(id: &str) -> EntitySpec {
        EntitySpec::new(EntityId::from(id), EntityType::Mob, Position::new("z1", "r1"))
            .with_component(ComponentKind::Health, Component::full(30, 2))
    }

    /// Poll until `check` passes or ~2 seconds elapse.
    async fn wait_for<F>(mut check: F)
    where
        F: AsyncFnMut() -> bool,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(check().await, "condition not reached in time");
    }

    #[tokio::test]
    async fn duplicate_spawn_fails_fast() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Player, RestartPolicy::Always, registry);

        supervisor.spawn_entity(player_spec("e1")).await.unwrap();
        let result = supervisor.spawn_entity(player_spec("e1")).await;
        assert_eq!(
            result.err(),
            Some(SupervisorError::Registry(RegistryError::AlreadyExists(
                EntityId::from("e1")
            )))
        );
    }

    #[tokio::test]
    async fn wrong_class_is_rejected() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Player, RestartPolicy::Always, registry);
        let result = supervisor.spawn_entity(mob_spec("m1")).await;
        assert!(matches!(result, Err(SupervisorError::WrongClass { .. })));
    }

    #[tokio::test]
    async fn player_restarts_after_crash_with_fresh_state() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Player, RestartPolicy::Always, registry.clone());

        let handle = supervisor.spawn_entity(player_spec("e1")).await.unwrap();

        // Let the entity accumulate state that a restart must NOT keep.
        handle.process_tick(TickData::now(1, TickSource::Manual));
        wait_for(async || {
            handle
                .state()
                .await
                .is_ok_and(|state| state.last_tick == 1)
        })
        .await;

        handle.inject_failure("test crash").await.unwrap();

        // The supervisor restarts the player; the registry ends up with a
        // live replacement handle.
        wait_for(async || {
            registry
                .get_handle(&EntityId::from("e1"))
                .await
                .unwrap()
                .is_some_and(|h| h.is_alive() && !handle.is_alive())
        })
        .await;

        let fresh = registry
            .get_handle(&EntityId::from("e1"))
            .await
            .unwrap()
            .unwrap();
        let state = fresh.state().await.unwrap();
        // Fresh state from the spec: tick counter back at zero, health
        // back at the spec value.
        assert_eq!(state.last_tick, 0);
        assert_eq!(
            state.components.get(&ComponentKind::Health).map(|c| c.current),
            Some(80)
        );
    }

    #[tokio::test]
    async fn mob_crash_parks_until_explicit_restart() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Mob, RestartPolicy::OnDemand, registry.clone());

        let handle = supervisor.spawn_entity(mob_spec("m1")).await.unwrap();
        handle.inject_failure("test crash").await.unwrap();

        wait_for(async || {
            supervisor
                .crashed_children()
                .await
                .unwrap()
                .contains(&EntityId::from("m1"))
        })
        .await;

        // Not restarted automatically: the stale record was cleaned up and
        // nothing replaced it.
        assert!(registry.get_handle(&EntityId::from("m1")).await.unwrap().is_none());

        // Explicit restart brings it back.
        let restarted = supervisor.restart_entity(&EntityId::from("m1")).await.unwrap();
        assert!(restarted.is_alive());
        assert!(registry.get_handle(&EntityId::from("m1")).await.unwrap().is_some());
        assert!(supervisor.crashed_children().await.unwrap().is_empty());

        // Restarting a live entity is an error.
        let result = supervisor.restart_entity(&EntityId::from("m1")).await;
        assert!(matches!(result, Err(SupervisorError::NotCrashed(_))));
    }

    #[tokio::test]
    async fn crash_leaves_siblings_untouched() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Mob, RestartPolicy::OnDemand, registry.clone());

        let doomed = supervisor.spawn_entity(mob_spec("m1")).await.unwrap();
        let sibling = supervisor.spawn_entity(mob_spec("m2")).await.unwrap();

        doomed.inject_failure("test crash").await.unwrap();
        wait_for(async || supervisor.children().await.unwrap().len() == 1).await;

        assert!(sibling.is_alive());
        assert!(sibling.state().await.is_ok());
    }

    #[tokio::test]
    async fn graceful_stop_is_not_a_crash() {
        let registry = EntityRegistry::spawn();
        let supervisor =
            EntitySupervisor::spawn(EntityType::Mob, RestartPolicy::OnDemand, registry.clone());

        let handle = supervisor.spawn_entity(mob_spec("m1")).await.unwrap();
        supervisor.stop_entity(&EntityId::from("m1")).await.unwrap();

        wait_for(async || supervisor.children().await.unwrap().is_empty()).await;
        assert!(supervisor.crashed_children().await.unwrap().is_empty());
        assert!(!handle.is_alive());
        // The actor unregistered itself on the way out; after that the ID
        // is free again.
        assert!(registry.get_handle(&EntityId::from("m1")).await.unwrap().is_none());
        assert!(supervisor.spawn_entity(mob_spec("m1")).await.is_ok());
    }

    #[tokio::test]
    async fn set_routes_by_class_and_broadcasts() {
        let registry = EntityRegistry::spawn();
        let set = SupervisorSet::spawn(RestartPolicies::default(), &registry);

        let player = set.spawn_entity(player_spec("p1")).await.unwrap();
        let mob = set.spawn_entity(mob_spec("m1")).await.unwrap();

        set.broadcast_tick(&TickData::now(1, TickSource::Manual));

        wait_for(async || {
            let p = player.state().await;
            let m = mob.state().await;
            p.is_ok_and(|s| s.last_tick == 1) && m.is_ok_and(|s| s.last_tick == 1)
        })
        .await;
    }
}
