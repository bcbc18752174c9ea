//! One concurrent unit of execution per game entity.
//!
//! Every entity (player, NPC, mob, item) runs as its own tokio task with
//! a private mailbox. The task owns its [`EntityState`] exclusively; all
//! reads and mutations arrive as [`EntityCommand`] messages, so the state
//! needs no locks and is never observed mid-update.
//!
//! Synchronous requests (component edits, position changes, state reads)
//! carry a `oneshot` reply channel and block only the caller. Tick
//! notifications are fire-and-forget: they are dropped with a warning if
//! the mailbox is full rather than ever blocking the tick emitter.
//!
//! Every mutation the entity registry indexes by (components, position,
//! status) pushes an idempotent metadata update to the registry. On loop
//! exit the actor unregisters itself; a panic skips that cleanup, which
//! the supervisor and the registry reconciliation sweep compensate for.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use thicket_entity::{EntityError, EntityState};
use thicket_types::{
    Component, ComponentField, ComponentKind, EntityId, EntityStatus, Position, TickData,
};

use crate::entity_registry::{MetadataUpdate, RegistryHandle};

/// Mailbox capacity for one entity actor.
const MAILBOX_CAPACITY: usize = 64;

/// Errors returned by [`EntityHandle`] requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    /// The target actor's mailbox is gone (the actor stopped or crashed).
    /// Callers must treat this as fatal for the request and requery the
    /// registry for a fresh handle.
    #[error("entity actor {0} is not available")]
    Unavailable(EntityId),

    /// A domain-level entity operation failed.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Messages processed by an entity actor's mailbox loop.
pub(crate) enum EntityCommand {
    /// Attach (or replace) a component.
    AddComponent {
        kind: ComponentKind,
        component: Component,
        reply: oneshot::Sender<()>,
    },
    /// Update one field of an attached component.
    UpdateComponent {
        kind: ComponentKind,
        field: ComponentField,
        value: u32,
        reply: oneshot::Sender<Result<(), EntityError>>,
    },
    /// Detach a component.
    RemoveComponent {
        kind: ComponentKind,
        reply: oneshot::Sender<Result<(), EntityError>>,
    },
    /// Read a component.
    GetComponent {
        kind: ComponentKind,
        reply: oneshot::Sender<Option<Component>>,
    },
    /// Move the entity.
    SetPosition {
        position: Position,
        reply: oneshot::Sender<()>,
    },
    /// Change the lifecycle status.
    SetStatus {
        status: EntityStatus,
        reply: oneshot::Sender<()>,
    },
    /// Fire-and-forget tick notification.
    ProcessTick(TickData),
    /// Read a snapshot of the full state.
    GetState {
        reply: oneshot::Sender<EntityState>,
    },
    /// Graceful shutdown; the reply fires after unregistration completes.
    Stop { reply: oneshot::Sender<()> },
    /// Fault injection: abort the actor task as if it had crashed.
    /// Exists to exercise supervision restart paths.
    Fail { reason: String },
}

/// Cloneable client for one entity actor.
#[derive(Debug, Clone)]
pub struct EntityHandle {
    /// The entity this handle addresses.
    id: EntityId,
    /// Mailbox sender.
    tx: mpsc::Sender<EntityCommand>,
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tx.same_channel(&other.tx)
    }
}

impl EntityHandle {
    /// The entity this handle addresses.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Whether the actor's mailbox is still open.
    ///
    /// A dead handle means the actor stopped or crashed; requests through
    /// it will fail with [`ActorError::Unavailable`].
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Attach (or replace) a component.
    pub async fn add_component(
        &self,
        kind: ComponentKind,
        component: Component,
    ) -> Result<(), ActorError> {
        self.request(|reply| EntityCommand::AddComponent {
            kind,
            component,
            reply,
        })
        .await
    }

    /// Update one field of an attached component.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ComponentNotFound`] (wrapped) if no
    /// component of the given kind is attached.
    pub async fn update_component(
        &self,
        kind: ComponentKind,
        field: ComponentField,
        value: u32,
    ) -> Result<(), ActorError> {
        let result = self
            .request(|reply| EntityCommand::UpdateComponent {
                kind,
                field,
                value,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Detach a component.
    pub async fn remove_component(&self, kind: ComponentKind) -> Result<(), ActorError> {
        let result = self
            .request(|reply| EntityCommand::RemoveComponent { kind, reply })
            .await?;
        Ok(result?)
    }

    /// Read a component, or `None` if absent.
    pub async fn get_component(&self, kind: ComponentKind) -> Result<Option<Component>, ActorError> {
        self.request(|reply| EntityCommand::GetComponent { kind, reply })
            .await
    }

    /// Move the entity.
    pub async fn set_position(&self, position: Position) -> Result<(), ActorError> {
        self.request(|reply| EntityCommand::SetPosition { position, reply })
            .await
    }

    /// Change the lifecycle status.
    pub async fn set_status(&self, status: EntityStatus) -> Result<(), ActorError> {
        self.request(|reply| EntityCommand::SetStatus { status, reply })
            .await
    }

    /// Read a snapshot of the full entity state.
    pub async fn state(&self) -> Result<EntityState, ActorError> {
        self.request(|reply| EntityCommand::GetState { reply }).await
    }

    /// Deliver a tick without blocking.
    ///
    /// If the mailbox is full or closed the tick is dropped with a
    /// warning; tick emitters never wait on slow entities.
    pub fn process_tick(&self, tick: TickData) {
        match self.tx.try_send(EntityCommand::ProcessTick(tick)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(entity = %self.id, "Entity mailbox full, dropping tick");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(entity = %self.id, "Entity actor gone, dropping tick");
            }
        }
    }

    /// Stop the actor gracefully. Resolves after the actor has
    /// unregistered itself from the entity registry.
    pub async fn stop(&self) -> Result<(), ActorError> {
        self.request(|reply| EntityCommand::Stop { reply }).await
    }

    /// Inject a failure: the actor task aborts as if it had crashed,
    /// without running its shutdown cleanup. Exercises supervision
    /// restart and registry reconciliation paths.
    pub async fn inject_failure(&self, reason: impl Into<String>) -> Result<(), ActorError> {
        self.tx
            .send(EntityCommand::Fail {
                reason: reason.into(),
            })
            .await
            .map_err(|_send_err| ActorError::Unavailable(self.id.clone()))
    }

    /// Send a request and await its oneshot reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EntityCommand,
    ) -> Result<T, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_send_err| ActorError::Unavailable(self.id.clone()))?;
        reply_rx
            .await
            .map_err(|_recv_err| ActorError::Unavailable(self.id.clone()))
    }
}

/// Create the mailbox pair for a new entity actor.
pub(crate) fn open_mailbox(id: &EntityId) -> (EntityHandle, mpsc::Receiver<EntityCommand>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (
        EntityHandle {
            id: id.clone(),
            tx,
        },
        rx,
    )
}

/// The entity actor's mailbox loop.
///
/// Processes commands in arrival order until a `Stop` arrives or every
/// handle is dropped, then unregisters the entity exactly once.
pub(crate) async fn run_entity_actor(
    mut state: EntityState,
    registry: RegistryHandle,
    mut rx: mpsc::Receiver<EntityCommand>,
) {
    let id = state.id.clone();

    // Spawning is over once the mailbox loop is live.
    state.set_status(EntityStatus::Active);
    let _ = registry
        .update(id.clone(), MetadataUpdate::Status(EntityStatus::Active))
        .await;
    info!(entity = %id, entity_type = ?state.entity_type, "Entity actor started");

    let mut stop_reply = None;
    while let Some(command) = rx.recv().await {
        match command {
            EntityCommand::AddComponent {
                kind,
                component,
                reply,
            } => {
                state.components.add(kind, component);
                let _ = registry
                    .update(id.clone(), MetadataUpdate::Components(state.components.kinds()))
                    .await;
                let _ = reply.send(());
            }
            EntityCommand::UpdateComponent {
                kind,
                field,
                value,
                reply,
            } => {
                // Field edits do not change which kinds are attached, so
                // no registry index is affected.
                let result = state.components.update(&kind, field, value);
                let _ = reply.send(result);
            }
            EntityCommand::RemoveComponent { kind, reply } => {
                let result = state.components.remove(&kind).map(|_removed| ());
                if result.is_ok() {
                    let _ = registry
                        .update(id.clone(), MetadataUpdate::Components(state.components.kinds()))
                        .await;
                }
                let _ = reply.send(result);
            }
            EntityCommand::GetComponent { kind, reply } => {
                let _ = reply.send(state.components.get(&kind).cloned());
            }
            EntityCommand::SetPosition { position, reply } => {
                state.set_position(position);
                let _ = registry
                    .update(id.clone(), MetadataUpdate::Zone(state.position.zone.clone()))
                    .await;
                let _ = registry
                    .update(id.clone(), MetadataUpdate::Room(state.position.room.clone()))
                    .await;
                let _ = reply.send(());
            }
            EntityCommand::SetStatus { status, reply } => {
                state.set_status(status);
                let _ = registry
                    .update(id.clone(), MetadataUpdate::Status(status))
                    .await;
                let _ = reply.send(());
            }
            EntityCommand::ProcessTick(tick) => {
                if state.process_tick(&tick) {
                    let _ = registry
                        .update(id.clone(), MetadataUpdate::Seen(chrono::Utc::now()))
                        .await;
                }
            }
            EntityCommand::GetState { reply } => {
                let _ = reply.send(state.clone());
            }
            EntityCommand::Stop { reply } => {
                stop_reply = Some(reply);
                break;
            }
            EntityCommand::Fail { reason } => {
                warn!(entity = %id, reason, "Entity actor failure injected");
                // Unwind without running shutdown cleanup, exactly like an
                // unexpected crash. The supervisor observes the panic.
                #[allow(clippy::panic)]
                {
                    panic!("entity actor failure injected: {reason}");
                }
            }
        }
    }

    // Shutdown: refuse new messages, unregister exactly once, then
    // acknowledge the stop.
    rx.close();
    state.set_status(EntityStatus::Despawning);
    if let Err(err) = registry.unregister(&id).await {
        warn!(entity = %id, %err, "Entity unregistration failed during shutdown");
    }
    info!(entity = %id, "Entity actor stopped");
    if let Some(reply) = stop_reply {
        let _ = reply.send(());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thicket_types::{EntityType, TickSource};

    use super::*;
    use crate::entity_registry::EntityRegistry;

    fn make_state(id: &str) -> EntityState {
        let mut state = EntityState::new(
            EntityId::from(id),
            EntityType::Player,
            Position::new("z1", "r1"),
        );
        state
            .components
            .add(ComponentKind::Health, Component::with_current(80, 100, 15));
        state
    }

    /// Spawn an actor directly (bypassing the supervisor) for unit tests.
    fn spawn_actor(state: EntityState, registry: &RegistryHandle) -> EntityHandle {
        let (handle, rx) = open_mailbox(&state.id);
        let _join = tokio::spawn(run_entity_actor(state, registry.clone(), rx));
        handle
    }

    #[tokio::test]
    async fn component_lifecycle_through_handle() {
        let registry = EntityRegistry::spawn();
        let handle = spawn_actor(make_state("e1"), &registry);

        // Attach and read back.
        handle
            .add_component(ComponentKind::Mana, Component::full(50, 5))
            .await
            .unwrap();
        let mana = handle.get_component(ComponentKind::Mana).await.unwrap();
        assert_eq!(mana.map(|c| c.current), Some(50));

        // Update a field.
        handle
            .update_component(ComponentKind::Mana, ComponentField::Current, 10)
            .await
            .unwrap();
        let mana = handle.get_component(ComponentKind::Mana).await.unwrap();
        assert_eq!(mana.map(|c| c.current), Some(10));

        // Remove, then updates fail.
        handle.remove_component(ComponentKind::Mana).await.unwrap();
        let result = handle
            .update_component(ComponentKind::Mana, ComponentField::Current, 1)
            .await;
        assert_eq!(
            result,
            Err(ActorError::Entity(EntityError::ComponentNotFound(
                ComponentKind::Mana
            )))
        );
    }

    #[tokio::test]
    async fn ticks_regenerate_components() {
        let registry = EntityRegistry::spawn();
        let handle = spawn_actor(make_state("e1"), &registry);

        handle.process_tick(TickData::now(1, TickSource::Manual));
        handle.process_tick(TickData::now(2, TickSource::Manual));
        // A replayed tick number must not regenerate a third time.
        handle.process_tick(TickData::now(2, TickSource::Manual));

        let state = handle.state().await.unwrap();
        assert_eq!(
            state.components.get(&ComponentKind::Health).map(|c| c.current),
            Some(100)
        );
        assert_eq!(state.last_tick, 2);
    }

    #[tokio::test]
    async fn stop_makes_handle_unavailable() {
        let registry = EntityRegistry::spawn();
        let handle = spawn_actor(make_state("e1"), &registry);

        handle.stop().await.unwrap();
        assert!(!handle.is_alive());
        let result = handle.state().await;
        assert_eq!(result, Err(ActorError::Unavailable(EntityId::from("e1"))));
    }

    #[tokio::test]
    async fn actor_reports_position_and_status_to_registry() {
        let registry = EntityRegistry::spawn();
        let state = make_state("e1");
        let record = state.record();
        let (handle, rx) = open_mailbox(&state.id);
        registry
            .register(state.id.clone(), handle.clone(), record)
            .await
            .unwrap();
        let _join = tokio::spawn(run_entity_actor(state, registry.clone(), rx));

        handle.set_position(Position::new("z2", "r7")).await.unwrap();
        handle.set_status(EntityStatus::Inactive).await.unwrap();

        let in_z2 = registry.entities_in_zone("z2").await.unwrap();
        assert_eq!(in_z2.len(), 1);
        let (_, record) = in_z2.into_iter().next().unwrap();
        assert_eq!(record.room, "r7");
        assert_eq!(record.status, EntityStatus::Inactive);
        assert!(registry.entities_in_zone("z1").await.unwrap().is_empty());

        // Graceful stop unregisters.
        handle.stop().await.unwrap();
        assert!(registry.get_handle(&EntityId::from("e1")).await.unwrap().is_none());
    }
}
