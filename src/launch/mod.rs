// ABOUTME: Container launch sequence using the type state pattern.
// ABOUTME: Pending -> Created -> Started; invalid orders do not compile.

mod state;
mod transitions;

pub use state::{Created, Pending, Started};
pub use transitions::TransitionResult;

use crate::runtime::{ContainerConfig, RegistryAuth};
use crate::types::ContainerId;

/// One attempt at bringing a container up, parameterized by its state.
#[derive(Debug)]
pub struct Launch<S> {
    pub(crate) config: ContainerConfig,
    pub(crate) auth: Option<RegistryAuth>,
    pub(crate) state: S,
}

impl Launch<Pending> {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            auth: None,
            state: Pending,
        }
    }

    /// Credentials for the one pull a missing image triggers.
    pub fn with_auth(mut self, auth: Option<RegistryAuth>) -> Self {
        self.auth = auth;
        self
    }
}

impl<S> Launch<S> {
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl Launch<Created> {
    pub fn container_id(&self) -> &ContainerId {
        &self.state.id
    }
}

impl Launch<Started> {
    pub fn container_id(&self) -> &ContainerId {
        &self.state.id
    }
}
