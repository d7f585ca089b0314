// ABOUTME: Waits on the engine-run health check.
// ABOUTME: Unhealthy, missing, and unrecognized statuses end the wait at once.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use crate::runtime::HealthState;
use async_trait::async_trait;

/// Polls `State.Health.Status`.
///
/// The container needs a health check, either baked into the image or set
/// with `ContainerBuilder::with_healthcheck`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCheck;

#[async_trait]
impl Probe for HealthCheck {
    fn describe(&self) -> String {
        "health check".to_string()
    }

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError> {
        let id = container.id();
        let info = container
            .inspect()
            .await
            .map_err(|source| WaitError::State {
                id: id.clone(),
                source,
            })?;

        match info.health {
            Some(HealthState::Healthy) => Ok(Readiness::Ready),
            Some(HealthState::Starting) => Ok(Readiness::not_ready("health check starting")),
            Some(HealthState::Unhealthy) => Err(WaitError::HealthCheckFailed { id: id.clone() }),
            Some(HealthState::None) | None => {
                Err(WaitError::HealthCheckNotConfigured { id: id.clone() })
            }
            Some(HealthState::Unknown(status)) => Err(WaitError::UnknownHealthStatus {
                id: id.clone(),
                status,
            }),
        }
    }
}
