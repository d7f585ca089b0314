// ABOUTME: Errors from starting a container.
// ABOUTME: One variant per launch phase: ports, create, pull, start, wait.

use crate::ports::PortError;
use crate::runtime::{ContainerError, ImageError};
use crate::types::ContainerId;
use crate::wait::WaitError;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// No host port could be allocated. Raised before any engine call.
    #[error("failed to allocate host port: {0}")]
    Ports(#[from] PortError),

    #[error("failed to create container from {image}: {source}")]
    Create {
        image: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to pull image {image}: {source}")]
    Pull {
        image: String,
        #[source]
        source: ImageError,
    },

    #[error("failed to start container {id}: {source}")]
    Start {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },

    /// The container started but never became ready. It has been removed.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl StartError {
    /// Whether the failure came from the readiness wait.
    pub fn is_wait(&self) -> bool {
        matches!(self, StartError::Wait(_))
    }
}
