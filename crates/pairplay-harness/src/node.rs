//! A production runtime running on the simulated LAN.

use std::time::Duration;

use pairplay_app::{Command, CommandError, NodeHandle, Runtime, StatusSnapshot};
use pairplay_core::{PeerId, SessionConfig};
use tokio::task::JoinHandle;

use crate::{SimEnv, SimLan};

/// Rounds of `yield_now` that [`settle`] gives the scheduler.
const SETTLE_ROUNDS: usize = 64;

/// Let every spawned runtime drain its queues.
///
/// On a paused current-thread runtime this runs ready tasks without moving
/// the clock.
pub async fn settle() {
    for _ in 0..SETTLE_ROUNDS {
        tokio::task::yield_now().await;
    }
}

/// One node: a [`Runtime`] over a [`crate::SimDriver`], spawned on the
/// current tokio runtime.
pub struct SimNode {
    handle: NodeHandle,
    task: JoinHandle<()>,
}

impl SimNode {
    /// Attach a node to `lan` with the default session config.
    ///
    /// `seed` determines the node's peer identifier.
    pub fn spawn(lan: &SimLan, seed: u64, name: &str) -> Self {
        Self::spawn_with(lan, seed, name, SessionConfig::default())
    }

    /// Attach a node with an explicit session config.
    pub fn spawn_with(lan: &SimLan, seed: u64, name: &str, config: SessionConfig) -> Self {
        let (runtime, handle) = Runtime::new(lan.driver(), SimEnv::with_seed(seed), name, config);
        let task = tokio::spawn(runtime.run());
        tracing::debug!(node = %handle.status().local.id(), name, "sim node up");
        Self { handle, task }
    }

    /// Control handle.
    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    /// This node's peer identifier.
    pub fn id(&self) -> PeerId {
        self.handle.status().local.id()
    }

    /// Latest published snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.handle.status()
    }

    /// Run a command and let the LAN settle afterwards.
    ///
    /// # Errors
    ///
    /// Whatever the runtime answered.
    pub async fn run(&self, command: Command) -> Result<(), CommandError> {
        let outcome = self.handle.execute(command).await;
        settle().await;
        outcome
    }

    /// Wait up to `limit` of virtual time for a snapshot that satisfies
    /// `predicate`.
    ///
    /// # Errors
    ///
    /// `CommandError::Stopped` if the runtime exits or the time runs out.
    pub async fn wait_until(
        &self,
        limit: Duration,
        predicate: impl FnMut(&StatusSnapshot) -> bool,
    ) -> Result<StatusSnapshot, CommandError> {
        tokio::time::timeout(limit, self.handle.wait_for(predicate))
            .await
            .map_err(|_| CommandError::Stopped)?
    }

    /// Shut the node down and wait for its runtime to exit.
    pub async fn shutdown(self) {
        if let Err(e) = self.handle.execute(Command::Shutdown).await {
            tracing::debug!(error = %e, "node already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "sim node task failed");
        }
        settle().await;
    }
}
