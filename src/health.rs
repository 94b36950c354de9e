//! Health checks reflecting the shutdown phase
//!
//! Load balancers stop routing to an instance once it reports `DOWN`, which
//! happens as soon as the shutdown starts and not just when the process exits.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::coordinator::ShutdownCoordinator;
use crate::coordinator::ShutdownPhase;

/// Health status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
}

impl From<ShutdownPhase> for Status {
    fn from(phase: ShutdownPhase) -> Self {
        match phase {
            ShutdownPhase::NotStarted => Self::Up,
            ShutdownPhase::Draining | ShutdownPhase::TimedOut | ShutdownPhase::Completed => {
                Self::Down
            }
        }
    }
}

impl Status {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Up => StatusCode::OK,
            Self::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Point-in-time health
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: Status,
    pub phase: ShutdownPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tasks: Option<usize>,
}

/// Reports health from the coordinator's phase
#[derive(Clone)]
pub struct ShutdownHealthIndicator {
    coordinator: Arc<ShutdownCoordinator>,
}

impl ShutdownHealthIndicator {
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Current health, no side effects
    pub fn health(&self) -> Health {
        let phase = self.coordinator.current_phase();

        Health {
            status: Status::from(phase),
            phase,
            active_tasks: self.coordinator.active_task_count(),
        }
    }
}

/// `GET /health`
pub async fn health(
    State(indicator): State<ShutdownHealthIndicator>,
) -> (StatusCode, Json<Health>) {
    let health = indicator.health();

    (health.status.status_code(), Json(health))
}
