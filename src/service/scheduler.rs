//! Hand-off from connection tasks to the simulation.
//!
//! Packet handlers never run world logic inline. They submit a [`WorldTask`]
//! and return as soon as it is queued; whoever owns the [`World`] drains
//! the queue on its own schedule.

use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::service::auth::GameProfile;
use crate::service::world::{PlayerAction, World};

/// One unit of work for the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldTask {
    PlayerJoined {
        profile: GameProfile,
        address: SocketAddr,
    },
    PlayerLeft {
        profile: GameProfile,
    },
    Action {
        player: Uuid,
        action: PlayerAction,
    },
}

impl WorldTask {
    /// Apply this task to `world`.
    pub fn run(self, world: &mut dyn World) {
        match self {
            WorldTask::PlayerJoined { profile, address } => world.player_joined(&profile, address),
            WorldTask::PlayerLeft { profile } => world.player_left(&profile),
            WorldTask::Action { player, action } => world.player_action(player, action),
        }
    }
}

/// Submit-and-return work queue.
pub trait Scheduler: Send + Sync {
    /// Queue `task`. Must not block.
    fn submit(&self, task: WorldTask) -> Result<()>;
}

/// Scheduler backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<WorldTask>,
}

/// Receiving end of a [`ChannelScheduler`].
#[derive(Debug)]
pub struct TaskQueue {
    rx: mpsc::UnboundedReceiver<WorldTask>,
}

impl ChannelScheduler {
    pub fn new() -> (Self, TaskQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TaskQueue { rx })
    }
}

impl Scheduler for ChannelScheduler {
    fn submit(&self, task: WorldTask) -> Result<()> {
        trace!(?task, "Queueing world task");
        self.tx
            .send(task)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

impl TaskQueue {
    /// Run every task queued so far. Returns how many ran.
    pub fn drain(&mut self, world: &mut dyn World) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task.run(world);
            ran += 1;
        }
        if ran > 0 {
            debug!(tasks = ran, "Drained world tasks");
        }
        ran
    }

    /// Wait for the next task without running it.
    pub async fn next(&mut self) -> Option<WorldTask> {
        self.rx.recv().await
    }

    /// Run tasks until every scheduler handle is dropped.
    pub async fn run(mut self, world: &mut dyn World) {
        while let Some(task) = self.rx.recv().await {
            task.run(world);
        }
    }
}
