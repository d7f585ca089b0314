// ABOUTME: State transition methods for container launches.
// ABOUTME: Each method consumes self and returns the next state on success.

use super::Launch;
use super::state::{Created, Pending, Started};
use crate::container::StartError;
use crate::runtime::{ContainerError, ContainerOps, ImageOps};
use crate::types::ContainerId;

/// Result type for transitions whose failure leaves something to clean up.
pub type TransitionResult<T, S> = Result<Launch<T>, (Launch<S>, StartError)>;

impl<S> Launch<S> {
    fn transition<T>(self, state: T) -> Launch<T> {
        Launch {
            config: self.config,
            auth: self.auth,
            state,
        }
    }
}

// =============================================================================
// Pending -> Created
// =============================================================================

impl Launch<Pending> {
    /// Create the container.
    ///
    /// A missing image is pulled once and creation retried once. A second
    /// failure of any kind is final.
    pub async fn create<R>(self, runtime: &R) -> Result<Launch<Created>, StartError>
    where
        R: ContainerOps + ImageOps + ?Sized,
    {
        let image = self.config.image.to_string();

        let id = match runtime.create_container(&self.config).await {
            Ok(id) => id,
            Err(ContainerError::ImageNotFound(_)) => {
                tracing::debug!(image = %image, "image not present locally, pulling");
                runtime
                    .pull_image(&self.config.image, self.auth.as_ref())
                    .await
                    .map_err(|source| StartError::Pull {
                        image: image.clone(),
                        source,
                    })?;
                runtime
                    .create_container(&self.config)
                    .await
                    .map_err(|source| StartError::Create {
                        image: image.clone(),
                        source,
                    })?
            }
            Err(source) => return Err(StartError::Create { image, source }),
        };

        tracing::debug!(container = %id.short(), image = %image, "container created");
        Ok(self.transition(Created { id }))
    }
}

// =============================================================================
// Created -> Started
// =============================================================================

impl Launch<Created> {
    /// Start the container. On failure the created container is handed back
    /// so the caller can discard it.
    pub async fn start<R>(self, runtime: &R) -> TransitionResult<Started, Created>
    where
        R: ContainerOps + ?Sized,
    {
        match runtime.start_container(&self.state.id).await {
            Ok(()) => {
                tracing::debug!(container = %self.state.id.short(), "container started");
                let id = self.state.id.clone();
                Ok(self.transition(Started { id }))
            }
            Err(source) => {
                let id = self.state.id.clone();
                Err((self, StartError::Start { id, source }))
            }
        }
    }

    /// Remove the container, logging rather than returning failures.
    pub async fn discard<R>(self, runtime: &R)
    where
        R: ContainerOps + ?Sized,
    {
        discard(runtime, &self.state.id).await;
    }
}

// =============================================================================
// Started
// =============================================================================

impl Launch<Started> {
    pub fn into_id(self) -> ContainerId {
        self.state.id
    }

    pub async fn discard<R>(self, runtime: &R)
    where
        R: ContainerOps + ?Sized,
    {
        discard(runtime, &self.state.id).await;
    }
}

async fn discard<R>(runtime: &R, id: &ContainerId)
where
    R: ContainerOps + ?Sized,
{
    if let Err(e) = runtime.remove_container(id, true).await {
        tracing::warn!(container = %id.short(), error = %e, "failed to remove container");
    }
}
