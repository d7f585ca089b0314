// ABOUTME: Handle to a started container: exec, logs, lifecycle, address and ports.
// ABOUTME: Clones share one state; removal is idempotent and deregisters the handle.

use super::resolve::{resolve_address, resolve_host_port};
use super::spec::ContainerSpec;
use crate::context::Context;
use crate::registry::CleanupEntry;
use crate::runtime::{
    ContainerError, ContainerInfo, ExecConfig, ExecError, ExecResult, LogError, LogLine,
    LogOptions, Runtime, collect_logs,
};
use crate::types::{ContainerId, ExposedPort, NetworkId};
use std::collections::HashMap;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A container that has been started, and possibly stopped since.
///
/// Every handle is registered with its [`Context`] and removed at process
/// exit if [`StartedContainer::remove`] is never called. After removal,
/// lifecycle calls fail with `ContainerError::Removed`.
#[derive(Clone)]
pub struct StartedContainer {
    inner: Arc<Inner>,
}

struct Inner {
    key: u64,
    entry: CleanupEntry,
    context: Arc<Context>,
    network: Option<String>,
    exposed_ports: Vec<ExposedPort>,
    stop_timeout: Duration,
}

impl StartedContainer {
    pub(crate) fn new(
        id: ContainerId,
        runtime: Arc<dyn Runtime>,
        context: Arc<Context>,
        spec: &ContainerSpec,
    ) -> Self {
        let key = context.next_key();
        Self {
            inner: Arc::new(Inner {
                key,
                entry: CleanupEntry::new(id, runtime),
                context,
                network: spec.network.clone(),
                exposed_ports: spec.exposed_ports.clone(),
                stop_timeout: spec.stop_timeout,
            }),
        }
    }

    pub(crate) fn register(&self) {
        self.inner
            .context
            .registry()
            .add(self.inner.key, self.inner.entry.clone());
    }

    pub fn id(&self) -> &ContainerId {
        self.inner.entry.id()
    }

    /// Registry key of this handle, unique within its context.
    pub fn key(&self) -> u64 {
        self.inner.key
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        self.inner.entry.runtime()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.entry.is_removed()
    }

    /// Exposed container ports, in declaration order.
    pub fn exposed_ports(&self) -> &[ExposedPort] {
        &self.inner.exposed_ports
    }

    fn ensure_live(&self) -> Result<(), ContainerError> {
        if self.is_removed() {
            Err(ContainerError::Removed(self.id().to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn inspect(&self) -> Result<ContainerInfo, ContainerError> {
        self.ensure_live()?;
        self.runtime().inspect_container(self.id()).await
    }

    /// Run a command inside the container and capture its output.
    pub async fn exec<I, S>(&self, cmd: I) -> Result<ExecResult, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_with(&ExecConfig::command(cmd)).await
    }

    pub async fn exec_with(&self, config: &ExecConfig) -> Result<ExecResult, ExecError> {
        if self.is_removed() {
            return Err(ExecError::ContainerNotFound(self.id().to_string()));
        }
        self.runtime().exec(self.id(), config).await
    }

    /// Everything written to stdout and stderr so far, with control
    /// characters other than newlines and tabs stripped.
    pub async fn logs(&self) -> Result<String, LogError> {
        if self.is_removed() {
            return Err(LogError::ContainerNotFound(self.id().to_string()));
        }
        collect_logs(self.runtime().as_ref(), self.id()).await
    }

    /// Raw log stream, e.g. with [`LogOptions::follow_all`].
    pub async fn log_stream(
        &self,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        if self.is_removed() {
            return Err(LogError::ContainerNotFound(self.id().to_string()));
        }
        self.runtime().container_logs(self.id(), opts).await
    }

    /// Stop the container. It stays registered and can be started again.
    pub async fn stop(&self) -> Result<(), ContainerError> {
        self.ensure_live()?;
        tracing::debug!(container = %self.id().short(), "stopping container");
        match self
            .runtime()
            .stop_container(self.id(), self.inner.stop_timeout)
            .await
        {
            Ok(()) | Err(ContainerError::NotRunning(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn start(&self) -> Result<(), ContainerError> {
        self.ensure_live()?;
        tracing::debug!(container = %self.id().short(), "starting container");
        match self.runtime().start_container(self.id()).await {
            Ok(()) | Err(ContainerError::AlreadyRunning(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn restart(&self) -> Result<(), ContainerError> {
        self.ensure_live()?;
        tracing::debug!(container = %self.id().short(), "restarting container");
        self.runtime()
            .restart_container(self.id(), self.inner.stop_timeout)
            .await
    }

    /// Send `signal`, or SIGKILL when `None`.
    pub async fn kill(&self, signal: Option<&str>) -> Result<(), ContainerError> {
        self.ensure_live()?;
        self.runtime().kill_container(self.id(), signal).await
    }

    /// Stop and delete the container, and deregister the handle.
    ///
    /// Safe to call repeatedly and from several clones. A clone that races
    /// a delete in flight waits for it, and the handle stays registered
    /// until the engine confirms the container is gone.
    pub async fn remove(&self) -> Result<(), ContainerError> {
        self.inner.entry.reap().await?;
        self.inner.context.registry().remove(self.inner.key);
        Ok(())
    }

    /// Host to use with mapped ports.
    pub fn host(&self) -> &str {
        self.inner.context.host()
    }

    /// Address on the configured network, or on the default bridge.
    pub async fn address(&self) -> Result<String, ContainerError> {
        let info = self.inspect().await?;
        resolve_address(&info, self.inner.network.as_deref())
    }

    /// Address on a specific network.
    pub async fn ip_address(&self, network: &str) -> Result<String, ContainerError> {
        let info = self.inspect().await?;
        resolve_address(&info, Some(network))
    }

    /// Host port bound to a container port; bare numbers mean tcp.
    pub async fn mapped_port(&self, port: impl Into<ExposedPort>) -> Result<u16, ContainerError> {
        let port = port.into();
        let info = self.inspect().await?;
        resolve_host_port(&info, &port)
    }

    /// Host port bound to the first exposed port.
    pub async fn first_mapped_port(&self) -> Result<u16, ContainerError> {
        let port = self.inner.exposed_ports.first().copied().ok_or_else(|| {
            ContainerError::PortNotExposed {
                id: self.id().to_string(),
                port: "(none)".to_string(),
            }
        })?;
        self.mapped_port(port).await
    }

    /// Container name as the engine reports it, without the leading slash.
    pub async fn name(&self) -> Result<String, ContainerError> {
        Ok(self.inspect().await?.name)
    }

    pub async fn labels(&self) -> Result<HashMap<String, String>, ContainerError> {
        Ok(self.inspect().await?.labels)
    }

    /// Engine id of an attached network.
    pub async fn network_id(&self, network: &str) -> Result<NetworkId, ContainerError> {
        let info = self.inspect().await?;
        info.network_settings
            .networks
            .get(network)
            .map(|endpoint| endpoint.network_id.as_str())
            .filter(|id| !id.is_empty())
            .map(NetworkId::new)
            .ok_or_else(|| ContainerError::NetworkNotAttached {
                id: info.id.to_string(),
                network: network.to_string(),
            })
    }

    /// Names of the networks the container is attached to, sorted.
    pub async fn network_names(&self) -> Result<Vec<String>, ContainerError> {
        let info = self.inspect().await?;
        let mut names: Vec<String> = info.network_settings.networks.into_keys().collect();
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for StartedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartedContainer")
            .field("id", self.id())
            .field("key", &self.inner.key)
            .field("removed", &self.is_removed())
            .finish()
    }
}
