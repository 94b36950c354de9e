//! Shutdown coordination
//!
//! When the application context closes the coordinator pauses the registered
//! connector, so no new connections are admitted, and then waits for the
//! connector's worker pool to drain. The wait is bounded by the configured
//! timeout and checked every [`CHECK_INTERVAL`], which means the worst case
//! wall-clock wait is the timeout rounded up to a whole number of intervals.
//!
//! Progress is published as a [`ShutdownPhase`] that health checks read
//! concurrently while the drain runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ShutdownConfig;
use crate::connector::Connector;
use crate::lifecycle::ContextClosed;
use crate::lifecycle::ContextId;
use crate::pool::WorkerPool;

/// Time between two drain checks, independent of the total timeout
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Shutdown progress
///
/// Phases only move forward: `NotStarted` -> `Draining` -> `TimedOut` or
/// `Completed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ShutdownPhase {
    /// No shutdown signal handled yet
    NotStarted = 0,
    /// Connector paused, waiting for in-flight work
    Draining = 1,
    /// Work was still running when the budget ran out and has been interrupted
    TimedOut = 2,
    /// All work finished (or there was no pool to wait for)
    Completed = 3,
}

impl ShutdownPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Draining,
            2 => Self::TimedOut,
            _ => Self::Completed,
        }
    }

    /// Whether the shutdown sequence has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TimedOut | Self::Completed)
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Draining => "draining",
            Self::TimedOut => "timed out",
            Self::Completed => "completed",
        };

        f.write_str(name)
    }
}

/// How waiting for the pool ended
enum Drain {
    /// Pool terminated within the budget
    Terminated,
    /// Budget used up, pool still busy
    Exhausted,
    /// Stopped waiting early
    Interrupted,
}

/// Sequences the drain of one connector when its context closes
pub struct ShutdownCoordinator {
    context: ContextId,
    config: ShutdownConfig,
    connector: RwLock<Option<Arc<dyn Connector>>>,
    started: AtomicBool,
    phase: AtomicU8,
    interrupt: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator for the application context `context`
    pub fn new(context: ContextId, config: ShutdownConfig) -> Self {
        Self {
            context,
            config,
            connector: RwLock::new(None),
            started: AtomicBool::new(false),
            phase: AtomicU8::new(ShutdownPhase::NotStarted as u8),
            interrupt: CancellationToken::new(),
        }
    }

    /// Register the connector to pause on shutdown
    ///
    /// Meant to be called once while the transport starts up, a later call
    /// replaces the earlier connector.
    pub fn register_connector(&self, connector: Arc<dyn Connector>) {
        tracing::debug!("Registered {connector} for graceful shutdown");

        *self.connector.write() = Some(connector);
    }

    /// Whether a closing context triggers a drain at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Current shutdown phase, never blocks
    pub fn current_phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Active tasks in the registered connector's pool, if there is one
    pub fn active_task_count(&self) -> Option<usize> {
        let connector = self.connector.read().clone();

        connector
            .and_then(|connector| connector.worker_pool())
            .map(|pool| pool.active_task_count())
    }

    /// Stop waiting for the pool to drain
    ///
    /// The pending drain forces the pool to shut down and still finishes in a
    /// terminal phase. Interrupting before a drain started makes that drain
    /// skip waiting altogether.
    pub fn interrupt(&self) {
        self.interrupt.cancel();
    }

    /// Handle a closing application context
    ///
    /// Runs the drain sequence when `event` comes from our own context, the
    /// coordinator is enabled and a connector is registered. Resolves once the
    /// pool drained or the timeout was used up. Only the first qualifying event
    /// has any effect.
    pub async fn on_context_closed(&self, event: &ContextClosed) {
        if event.source != self.context {
            tracing::debug!("Ignoring close of {}, not our context", event.source);
            return;
        }

        if !self.config.enabled {
            tracing::debug!("Graceful shutdown is disabled");
            return;
        }

        let connector = self.connector.read().clone();
        let Some(connector) = connector else {
            tracing::debug!("No connector registered, nothing to pause");
            return;
        };

        if self.started.swap(true, Ordering::AcqRel) {
            tracing::debug!("Graceful shutdown already handled");
            return;
        }

        self.drain(connector.as_ref()).await;
    }

    async fn drain(&self, connector: &dyn Connector) {
        self.advance(ShutdownPhase::Draining);

        let mut guard = DrainGuard {
            coordinator: self,
            pool: None,
        };

        if connector.is_paused() {
            tracing::debug!("{connector} was already paused");
        }

        connector.pause();
        tracing::info!("Paused {connector} to stop accepting new requests");

        let Some(pool) = connector.worker_pool() else {
            tracing::debug!("{connector} has no drainable pool, not waiting");
            guard.finish(ShutdownPhase::Completed);
            return;
        };

        guard.pool = Some(Arc::clone(&pool));

        pool.stop_accepting_new_tasks();

        let phase = match self.await_termination(pool.as_ref()).await {
            Drain::Terminated => ShutdownPhase::Completed,
            Drain::Exhausted => {
                let active = pool.active_task_count();
                if active == 0 {
                    ShutdownPhase::Completed
                } else {
                    tracing::warn!("{active} task(s) still active, force shutdown");
                    pool.force_shutdown_now();
                    ShutdownPhase::TimedOut
                }
            }
            Drain::Interrupted => {
                let active = pool.active_task_count();
                tracing::warn!("Stopped waiting with {active} task(s) active, force shutdown");
                pool.force_shutdown_now();
                if active == 0 {
                    ShutdownPhase::Completed
                } else {
                    ShutdownPhase::TimedOut
                }
            }
        };

        guard.finish(phase);
    }

    async fn await_termination(&self, pool: &dyn WorkerPool) -> Drain {
        let mut remaining = self.config.timeout();

        while !remaining.is_zero() {
            let terminated = tokio::select! {
                biased;
                () = self.interrupt.cancelled() => {
                    tracing::warn!("Interrupted while waiting for termination");
                    return Drain::Interrupted;
                }
                terminated = pool.await_termination(CHECK_INTERVAL) => terminated,
            };

            match terminated {
                Ok(true) => return Drain::Terminated,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!("Unable to wait for termination: {err}");
                    return Drain::Interrupted;
                }
            }

            tracing::info!(
                "{} task(s) active, {} seconds remaining",
                pool.active_task_count(),
                remaining.as_secs()
            );

            remaining = remaining.saturating_sub(CHECK_INTERVAL);
        }

        Drain::Exhausted
    }

    fn advance(&self, phase: ShutdownPhase) {
        let previous = ShutdownPhase::from_u8(self.phase.fetch_max(phase as u8, Ordering::AcqRel));

        if previous < phase {
            tracing::debug!("Shutdown phase: {previous} -> {phase}");
        }
    }
}

/// Makes sure a drain always ends in a terminal phase
///
/// When the drain future is dropped halfway, the pool is forced down and the
/// phase recorded as timed out.
struct DrainGuard<'a> {
    coordinator: &'a ShutdownCoordinator,
    pool: Option<Arc<dyn WorkerPool>>,
}

impl DrainGuard<'_> {
    fn finish(&mut self, phase: ShutdownPhase) {
        self.pool = None;
        self.coordinator.advance(phase);
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.coordinator.current_phase().is_terminal() {
            return;
        }

        tracing::warn!("Graceful shutdown cancelled before the pool drained");

        if let Some(pool) = self.pool.take() {
            pool.force_shutdown_now();
        }

        self.coordinator.advance(ShutdownPhase::TimedOut);
    }
}
