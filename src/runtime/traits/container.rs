// ABOUTME: Container lifecycle trait for engine bindings.
// ABOUTME: Create, start, stop, restart, kill, remove and inspect.

use super::shared_types::{ContainerConfig, ContainerInfo};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Create a container. Must report a missing image as `ContainerError::ImageNotFound`
    /// rather than pulling it.
    async fn create_container(&self, config: &ContainerConfig)
    -> Result<ContainerId, ContainerError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration)
    -> Result<(), ContainerError>;

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Send a signal (SIGKILL when `None`).
    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: Option<&str>,
    ) -> Result<(), ContainerError>;

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("container {0} has been removed")]
    Removed(String),

    #[error("port {port} is not exposed by container {id}")]
    PortNotExposed { id: String, port: String },

    #[error("no address available for container {0}")]
    AddressUnavailable(String),

    #[error("container {id} is not attached to network {network}")]
    NetworkNotAttached { id: String, network: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
