// ABOUTME: Waits until the engine reports the container as running.
// ABOUTME: The default strategy when a spec names none.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use crate::runtime::ContainerState;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerRunning;

#[async_trait]
impl Probe for ContainerRunning {
    fn describe(&self) -> String {
        "container running".to_string()
    }

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError> {
        let info = container
            .inspect()
            .await
            .map_err(|source| WaitError::State {
                id: container.id().clone(),
                source,
            })?;

        if info.state == ContainerState::Running {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::not_ready(format_args!("state is {}", info.state)))
        }
    }
}
