// ABOUTME: Turns a ContainerSpec into a started, ready, registered container.
// ABOUTME: Allocates ports, drives the launch states, waits, and cleans up on failure.

use super::error::StartError;
use super::spec::{ContainerSpec, PortStrategy};
use super::started::StartedContainer;
use crate::context::Context;
use crate::launch::Launch;
use crate::ports::{FixedPortGenerator, PortError, PortGenerator, RandomUniquePortGenerator};
use crate::runtime::{
    ContainerConfig, HealthcheckConfig, PortMapping, Runtime, RuntimeError, connect_from_env,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Label set on every container this crate creates.
pub const LABEL_MANAGED: &str = "cairn.managed";
/// Label carrying the creating process id.
pub const LABEL_SESSION: &str = "cairn.session";

/// Starts containers on one engine within one [`Context`].
#[derive(Clone)]
pub struct Orchestrator {
    runtime: Arc<dyn Runtime>,
    context: Arc<Context>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Use `runtime` with the global context.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self::with_context(runtime, Context::global())
    }

    pub fn with_context(runtime: Arc<dyn Runtime>, context: Arc<Context>) -> Self {
        Self {
            runtime,
            context,
            cancel: CancellationToken::new(),
        }
    }

    /// Detect the local engine (honoring `CAIRN_*` overrides) and use the
    /// global context.
    pub fn connect_local() -> Result<Self, RuntimeError> {
        Ok(Self::new(connect_from_env()?))
    }

    /// Cancel all waits started through this orchestrator when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Create, start and wait for a container.
    ///
    /// The handle is registered as soon as the container runs, so it is
    /// cleaned up even if the process dies during the wait. If the wait
    /// fails the container is removed before the error is returned.
    pub async fn start(&self, spec: ContainerSpec) -> Result<StartedContainer, StartError> {
        self.start_with(spec, &self.cancel).await
    }

    /// Like [`Orchestrator::start`] with a caller-provided cancellation token.
    pub async fn start_with(
        &self,
        spec: ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<StartedContainer, StartError> {
        let span = tracing::info_span!("start", image = %spec.image);
        self.launch(spec, cancel).instrument(span).await
    }

    async fn launch(
        &self,
        spec: ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<StartedContainer, StartError> {
        let ports = self.allocate_ports(&spec)?;
        let config = container_config(&spec, ports);
        let runtime = self.runtime.as_ref();

        let created = Launch::new(config)
            .with_auth(spec.auth.clone())
            .create(runtime)
            .await?;

        let started = match created.start(runtime).await {
            Ok(started) => started,
            Err((created, e)) => {
                created.discard(runtime).await;
                return Err(e);
            }
        };

        let container = StartedContainer::new(
            started.into_id(),
            Arc::clone(&self.runtime),
            Arc::clone(&self.context),
            &spec,
        );
        container.register();

        let strategy = spec.wait.clone().unwrap_or_default();
        if let Err(e) = strategy.wait(&container, cancel).await {
            tracing::debug!(container = %container.id().short(), error = %e, "wait failed, removing");
            if let Err(remove_err) = container.remove().await {
                tracing::warn!(
                    container = %container.id().short(),
                    error = %remove_err,
                    "failed to remove container after wait failure"
                );
            }
            return Err(e.into());
        }

        Ok(container)
    }

    /// One host port per exposed port, in order.
    fn allocate_ports(&self, spec: &ContainerSpec) -> Result<Vec<PortMapping>, PortError> {
        if spec.exposed_ports.is_empty() {
            return Ok(Vec::new());
        }

        let mut generator: Box<dyn PortGenerator> = match &spec.port_strategy {
            PortStrategy::RandomUnique => Box::new(RandomUniquePortGenerator::new(
                self.context.assigned_ports().clone(),
            )),
            PortStrategy::Fixed(ports) => Box::new(FixedPortGenerator::new(ports.iter().copied())),
        };

        spec.exposed_ports
            .iter()
            .map(|port| {
                Ok(PortMapping {
                    container: *port,
                    host_port: Some(generator.generate_port()?),
                    host_ip: None,
                })
            })
            .collect()
    }
}

/// Engine-level creation request for `spec`.
pub(crate) fn container_config(spec: &ContainerSpec, ports: Vec<PortMapping>) -> ContainerConfig {
    let mut config = ContainerConfig::new(spec.image.clone());
    config.name = spec.name.clone();
    config.env = spec
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    config.labels = spec
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    config
        .labels
        .insert(LABEL_MANAGED.to_string(), "true".to_string());
    config
        .labels
        .insert(LABEL_SESSION.to_string(), std::process::id().to_string());
    config.ports = ports;
    config.volumes = spec.mounts.clone();
    config.command = spec.command.clone();
    config.entrypoint = spec.entrypoint.as_ref().map(|e| vec![e.clone()]);
    config.healthcheck = spec.healthcheck.as_ref().map(|hc| HealthcheckConfig {
        test: vec!["CMD-SHELL".to_string(), hc.command.clone()],
        interval: hc.interval,
        timeout: None,
        retries: None,
    });
    config.privileged = spec.privileged;
    config.network = spec.network.clone();
    config
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerBuilder;
    use crate::types::ExposedPort;
    use std::time::Duration;

    #[test]
    fn config_carries_spec_and_management_labels() {
        let spec = ContainerBuilder::new("redis:7")
            .with_entrypoint("redis-server")
            .with_command(["--appendonly", "yes"])
            .with_env("A", "1")
            .with_label("team", "db")
            .with_healthcheck_interval("redis-cli ping", Duration::from_millis(250))
            .with_privileged(true)
            .with_network("backend")
            .build()
            .unwrap();
        let ports = vec![PortMapping {
            container: ExposedPort::tcp(6379),
            host_port: Some(40000),
            host_ip: None,
        }];

        let config = container_config(&spec, ports.clone());
        assert_eq!(config.image.to_string(), "redis:7");
        assert_eq!(config.entrypoint, Some(vec!["redis-server".to_string()]));
        assert_eq!(config.command, ["--appendonly", "yes"]);
        assert_eq!(config.env["A"], "1");
        assert_eq!(config.labels["team"], "db");
        assert_eq!(config.labels[LABEL_MANAGED], "true");
        assert_eq!(config.labels[LABEL_SESSION], std::process::id().to_string());
        assert_eq!(config.ports, ports);
        assert!(config.privileged);
        assert_eq!(config.network.as_deref(), Some("backend"));

        let hc = config.healthcheck.unwrap();
        assert_eq!(hc.test, ["CMD-SHELL", "redis-cli ping"]);
        assert_eq!(hc.interval, Duration::from_millis(250));
    }
}
