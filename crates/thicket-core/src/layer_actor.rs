//! One concurrent unit of execution per (layer, zone) pair.
//!
//! A world layer actor owns a [`LayerState`] (map, layer-local entities,
//! connections) exclusively. All access arrives as [`LayerCommand`]
//! messages through its private mailbox.
//!
//! # Two clocks
//!
//! A layer receives world ticks fanned out by the world manager *and*
//! emits its own local ticks from a `tokio` interval timer when its
//! descriptor configures a non-zero `tick_interval_ms`. The two streams
//! are not synchronized; each carries its own [`TickSource`] and its own
//! monotonic counter. A timer firing is just another mailbox event,
//! interleaved with pending queries in arrival order. Stopping the actor
//! drops the timer with the task.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use thicket_types::{
    LayerConnection, LayerEntity, LayerEntityId, LayerName, TickData, TickSource, WorldLayer,
};
use thicket_world::{LayerState, WorldError, layer_tick};

/// Mailbox capacity for one layer actor.
const MAILBOX_CAPACITY: usize = 128;

/// Errors returned by [`LayerHandle`] requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerActorError {
    /// The target actor's mailbox is gone (the actor stopped or crashed).
    #[error("layer actor ({layer}, {zone}) is not available")]
    Unavailable {
        /// The layer of the dead actor.
        layer: LayerName,
        /// The zone of the dead actor.
        zone: String,
    },

    /// A domain-level world operation failed.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Messages processed by a layer actor's mailbox loop.
pub(crate) enum LayerCommand {
    GetMap {
        reply: oneshot::Sender<thicket_world::LayerMap>,
    },
    GetAt {
        x: u32,
        y: u32,
        reply: oneshot::Sender<Option<char>>,
    },
    SetAt {
        x: u32,
        y: u32,
        ch: char,
        reply: oneshot::Sender<()>,
    },
    GetRegion {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        reply: oneshot::Sender<Vec<String>>,
    },
    EntitiesAt {
        x: u32,
        y: u32,
        reply: oneshot::Sender<Vec<LayerEntity>>,
    },
    AddEntity {
        entity: LayerEntity,
        reply: oneshot::Sender<Result<(), WorldError>>,
    },
    RemoveEntity {
        id: LayerEntityId,
        reply: oneshot::Sender<Result<LayerEntity, WorldError>>,
    },
    MoveEntity {
        id: LayerEntityId,
        x: u32,
        y: u32,
        reply: oneshot::Sender<Result<(), WorldError>>,
    },
    GetConnections {
        reply: oneshot::Sender<Vec<LayerConnection>>,
    },
    AddConnection {
        connection: LayerConnection,
        reply: oneshot::Sender<Result<(), WorldError>>,
    },
    Descriptor {
        reply: oneshot::Sender<WorldLayer>,
    },
    /// Fire-and-forget world tick from the manager.
    ProcessTick(TickData),
    /// Graceful shutdown.
    Stop { reply: oneshot::Sender<()> },
}

/// Cloneable client for one world layer actor.
#[derive(Debug, Clone)]
pub struct LayerHandle {
    /// The layer this handle addresses.
    layer: LayerName,
    /// The zone this handle addresses.
    zone: String,
    /// Mailbox sender.
    tx: mpsc::Sender<LayerCommand>,
}

impl PartialEq for LayerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.layer == other.layer
            && self.zone == other.zone
            && self.tx.same_channel(&other.tx)
    }
}

impl LayerHandle {
    /// The layer this handle addresses.
    pub const fn layer(&self) -> LayerName {
        self.layer
    }

    /// The zone this handle addresses.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Whether the actor's mailbox is still open.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Snapshot the full layer map.
    pub async fn get_map(&self) -> Result<thicket_world::LayerMap, LayerActorError> {
        self.request(|reply| LayerCommand::GetMap { reply }).await
    }

    /// Read the character at `(x, y)`, or `None` if out of bounds.
    pub async fn get_at(&self, x: u32, y: u32) -> Result<Option<char>, LayerActorError> {
        self.request(|reply| LayerCommand::GetAt { x, y, reply })
            .await
    }

    /// Replace the character at `(x, y)`; a no-op outside the bounds.
    pub async fn set_at(&self, x: u32, y: u32, ch: char) -> Result<(), LayerActorError> {
        self.request(|reply| LayerCommand::SetAt { x, y, ch, reply })
            .await
    }

    /// Extract a region of the map (empty if it exceeds the bounds).
    pub async fn get_region(
        &self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Vec<String>, LayerActorError> {
        self.request(|reply| LayerCommand::GetRegion { x, y, w, h, reply })
            .await
    }

    /// All layer entities at `(x, y)`.
    pub async fn get_entities_at(&self, x: u32, y: u32) -> Result<Vec<LayerEntity>, LayerActorError> {
        self.request(|reply| LayerCommand::EntitiesAt { x, y, reply })
            .await
    }

    /// Add a layer entity.
    pub async fn add_entity(&self, entity: LayerEntity) -> Result<(), LayerActorError> {
        let result = self
            .request(|reply| LayerCommand::AddEntity { entity, reply })
            .await?;
        Ok(result?)
    }

    /// Remove a layer entity and return it.
    pub async fn remove_entity(&self, id: &LayerEntityId) -> Result<LayerEntity, LayerActorError> {
        let result = self
            .request(|reply| LayerCommand::RemoveEntity {
                id: id.clone(),
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Move a layer entity to new coordinates.
    pub async fn move_entity(
        &self,
        id: &LayerEntityId,
        x: u32,
        y: u32,
    ) -> Result<(), LayerActorError> {
        let result = self
            .request(|reply| LayerCommand::MoveEntity {
                id: id.clone(),
                x,
                y,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// All connections anchored in this layer.
    pub async fn get_connections(&self) -> Result<Vec<LayerConnection>, LayerActorError> {
        self.request(|reply| LayerCommand::GetConnections { reply })
            .await
    }

    /// Add a connection, enforcing the one-per-anchor invariant.
    pub async fn add_connection(&self, connection: LayerConnection) -> Result<(), LayerActorError> {
        let result = self
            .request(|reply| LayerCommand::AddConnection { connection, reply })
            .await?;
        Ok(result?)
    }

    /// The layer's descriptor.
    pub async fn descriptor(&self) -> Result<WorldLayer, LayerActorError> {
        self.request(|reply| LayerCommand::Descriptor { reply })
            .await
    }

    /// Deliver a world tick without blocking.
    ///
    /// If the mailbox is full or closed the tick is dropped with a
    /// warning; the world manager never waits on slow layers.
    pub fn process_world_tick(&self, tick: TickData) {
        match self.tx.try_send(LayerCommand::ProcessTick(tick)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(layer = %self.layer, zone = self.zone, "Layer mailbox full, dropping tick");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(layer = %self.layer, zone = self.zone, "Layer actor gone, dropping tick");
            }
        }
    }

    /// Stop the actor gracefully.
    pub async fn stop(&self) -> Result<(), LayerActorError> {
        self.request(|reply| LayerCommand::Stop { reply }).await
    }

    /// Send a request and await its oneshot reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> LayerCommand,
    ) -> Result<T, LayerActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let unavailable = || LayerActorError::Unavailable {
            layer: self.layer,
            zone: self.zone.clone(),
        };
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_send_err| unavailable())?;
        reply_rx.await.map_err(|_recv_err| unavailable())
    }
}

/// Create the mailbox pair for a new layer actor.
pub(crate) fn open_mailbox(
    layer: LayerName,
    zone: &str,
) -> (LayerHandle, mpsc::Receiver<LayerCommand>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (
        LayerHandle {
            layer,
            zone: zone.to_owned(),
            tx,
        },
        rx,
    )
}

/// The layer actor's mailbox loop.
///
/// Interleaves mailbox commands with local timer ticks until a `Stop`
/// arrives or every handle is dropped.
pub(crate) async fn run_layer_actor(
    mut state: LayerState,
    world_seed: u64,
    mut rx: mpsc::Receiver<LayerCommand>,
) {
    let layer = state.descriptor.name;
    let zone = state.map.zone_name().to_owned();
    let interval_ms = state.descriptor.tick_interval_ms;

    let mut timer = (interval_ms > 0).then(|| {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    // An interval's first tick completes immediately; consume it so the
    // first local tick lands one full period after startup.
    if let Some(interval) = timer.as_mut() {
        interval.tick().await;
    }

    let mut local_tick: u64 = 0;
    info!(%layer, zone, interval_ms, "Layer actor started");

    let mut stop_reply = None;
    loop {
        tokio::select! {
            maybe_command = rx.recv() => {
                match maybe_command {
                    None => break,
                    Some(LayerCommand::Stop { reply }) => {
                        stop_reply = Some(reply);
                        break;
                    }
                    Some(command) => handle_command(&mut state, world_seed, command),
                }
            }
            () = local_timer_tick(timer.as_mut()) => {
                local_tick = local_tick.saturating_add(1);
                let tick = TickData::now(local_tick, TickSource::LayerTimer);
                let _ = layer_tick::apply(&mut state, &tick, world_seed);
            }
        }
    }

    // Refuse new messages before acknowledging the stop, so handles
    // observe the actor as gone the moment the stop resolves.
    rx.close();
    info!(%layer, zone, "Layer actor stopped");
    if let Some(reply) = stop_reply {
        let _ = reply.send(());
    }
}

/// Await the next local timer tick, or forever when no timer is
/// configured.
async fn local_timer_tick(timer: Option<&mut tokio::time::Interval>) {
    match timer {
        Some(interval) => {
            let _ = interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Process one non-stop command against the layer state.
fn handle_command(state: &mut LayerState, world_seed: u64, command: LayerCommand) {
    match command {
        LayerCommand::GetMap { reply } => {
            let _ = reply.send(state.map.clone());
        }
        LayerCommand::GetAt { x, y, reply } => {
            let _ = reply.send(state.map.get_at(x, y));
        }
        LayerCommand::SetAt { x, y, ch, reply } => {
            state.map.set_at(x, y, ch);
            let _ = reply.send(());
        }
        LayerCommand::GetRegion { x, y, w, h, reply } => {
            let _ = reply.send(state.map.get_region(x, y, w, h));
        }
        LayerCommand::EntitiesAt { x, y, reply } => {
            let _ = reply.send(state.entities_at(x, y));
        }
        LayerCommand::AddEntity { entity, reply } => {
            let _ = reply.send(state.add_entity(entity));
        }
        LayerCommand::RemoveEntity { id, reply } => {
            let _ = reply.send(state.remove_entity(&id));
        }
        LayerCommand::MoveEntity { id, x, y, reply } => {
            let _ = reply.send(state.move_entity(&id, x, y));
        }
        LayerCommand::GetConnections { reply } => {
            let _ = reply.send(state.connections().to_vec());
        }
        LayerCommand::AddConnection { connection, reply } => {
            let _ = reply.send(state.add_connection(connection));
        }
        LayerCommand::Descriptor { reply } => {
            let _ = reply.send(state.descriptor.clone());
        }
        LayerCommand::ProcessTick(tick) => {
            let _ = layer_tick::apply(state, &tick, world_seed);
        }
        LayerCommand::Stop { reply } => {
            // Unreachable in practice: the loop intercepts Stop before
            // dispatching here. Acknowledge anyway.
            let _ = reply.send(());
        }
    }
}
