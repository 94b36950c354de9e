//! Worker pools the coordinator can drain
//!
//! The coordinator only needs a small capability set from a pool: how busy it
//! is, a way to stop admitting work, a bounded wait and a last resort
//! interruption. [`RequestPool`] provides that set for HTTP requests served by
//! this process.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::response::Error;

/// Worker pool errors
#[derive(Debug, Error)]
#[allow(dead_code)] // request pools never fail, other pools may
pub enum PoolError {
    /// The pool can no longer report on its own state
    #[error("Worker pool failure: {0}")]
    Internal(String),
}

/// Something whose load can be polled and stopped
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Number of tasks currently running
    ///
    /// Best-effort, it may be stale by the time it is read.
    fn active_task_count(&self) -> usize;

    /// Stop admitting new tasks, already admitted tasks keep running
    ///
    /// Idempotent.
    fn stop_accepting_new_tasks(&self);

    /// Wait up to `timeout` for the pool to terminate
    ///
    /// Returns `Ok(true)` when the pool stopped accepting and has no tasks left,
    /// `Ok(false)` when `timeout` elapsed first.
    ///
    /// # Errors
    ///
    /// Will return `Err` only when the pool itself fails, never on timeout
    async fn await_termination(&self, timeout: Duration) -> Result<bool, PoolError>;

    /// Interrupt all in-flight tasks
    ///
    /// Idempotent, best-effort.
    fn force_shutdown_now(&self);
}

/// Pool of in-flight HTTP requests
///
/// Every request routed through [`track_requests`] counts as one task for as
/// long as its handler runs.
#[derive(Clone, Debug, Default)]
pub struct RequestPool {
    tracker: TaskTracker,
    interrupt: CancellationToken,
}

impl RequestPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether new requests are refused
    pub fn is_shutting_down(&self) -> bool {
        self.tracker.is_closed()
    }
}

#[async_trait]
impl WorkerPool for RequestPool {
    fn active_task_count(&self) -> usize {
        self.tracker.len()
    }

    fn stop_accepting_new_tasks(&self) {
        if self.tracker.close() {
            tracing::debug!("Request pool closed for new requests");
        }
    }

    async fn await_termination(&self, timeout: Duration) -> Result<bool, PoolError> {
        Ok(tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok())
    }

    fn force_shutdown_now(&self) {
        if !self.interrupt.is_cancelled() {
            tracing::debug!(
                "Interrupting {} in-flight request(s)",
                self.tracker.len()
            );
        }

        self.interrupt.cancel();
    }
}

/// Middleware admitting requests into the pool
///
/// Once the pool stopped accepting, requests arriving on already open
/// connections are refused. In-flight requests are cut short with the same
/// response when the pool is forced to shut down.
pub async fn track_requests(
    State(pool): State<RequestPool>,
    request: Request,
    next: Next,
) -> Response {
    // tracked before the closed check, a close racing with this request either
    // refuses it or has to wait for it
    let response = pool.tracker.track_future({
        let pool = pool.clone();
        async move {
            if pool.is_shutting_down() {
                return None;
            }

            Some(next.run(request).await)
        }
    });

    tokio::select! {
        response = response => response.unwrap_or_else(|| {
            Error::service_unavailable("Server is shutting down").into_response()
        }),
        () = pool.interrupt.cancelled() => {
            Error::service_unavailable("Server is shutting down")
                .with_description("Request interrupted before it completed")
                .into_response()
        }
    }
}
