// ABOUTME: Exec trait for engine bindings.
// ABOUTME: Runs a command inside a running container and captures its output.

use super::shared_types::{ExecConfig, ExecResult};
use crate::types::ContainerId;
use async_trait::async_trait;

#[async_trait]
pub trait ExecOps: Send + Sync {
    /// Run a command to completion. A nonzero exit code is a successful
    /// `ExecResult`, not an error.
    async fn exec(&self, container: &ContainerId, config: &ExecConfig)
    -> Result<ExecResult, ExecError>;
}

/// Errors from exec operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
