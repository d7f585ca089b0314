// ABOUTME: Error types for readiness waits.
// ABOUTME: Timeouts, cancellation, and the terminal failures that end a wait early.

use crate::runtime::ContainerError;
use crate::types::ContainerId;
use std::time::Duration;

/// Why a container never became ready.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaitError {
    /// The deadline passed before any probe reported ready.
    #[error("timeout reached while waiting for container {id} after {elapsed:?}")]
    Timeout { id: ContainerId, elapsed: Duration },

    /// The wait's cancellation token fired.
    #[error("wait for container {id} was cancelled")]
    Cancelled { id: ContainerId },

    #[error("health check failed: container {id} is unhealthy")]
    HealthCheckFailed { id: ContainerId },

    #[error("health check not configured for container {id}")]
    HealthCheckNotConfigured { id: ContainerId },

    #[error("unknown health status {status} for container {id}")]
    UnknownHealthStatus { id: ContainerId, status: String },

    /// The container could not be inspected.
    #[error("unable to retrieve state for container {id}: {source}")]
    State {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },

    /// The probe target cannot be resolved and never will be, e.g. an
    /// unexposed port.
    #[error("cannot resolve probe target for container {id}: {source}")]
    Resolve {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },
}

impl WaitError {
    pub fn container_id(&self) -> &ContainerId {
        match self {
            WaitError::Timeout { id, .. }
            | WaitError::Cancelled { id }
            | WaitError::HealthCheckFailed { id }
            | WaitError::HealthCheckNotConfigured { id }
            | WaitError::UnknownHealthStatus { id, .. }
            | WaitError::State { id, .. }
            | WaitError::Resolve { id, .. } => id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}
