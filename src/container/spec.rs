// ABOUTME: Declarative description of a container to start, and its builder.
// ABOUTME: Building only validates; nothing touches the engine until start.

use crate::runtime::{RegistryAuth, VolumeMount};
use crate::types::{ExposedPort, ImageRef, ParseImageRefError, ParsePortError};
use crate::wait::WaitStrategy;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("invalid image reference: {0}")]
    Image(#[from] ParseImageRefError),

    #[error("invalid exposed port '{token}': {source}")]
    Port {
        token: String,
        #[source]
        source: ParsePortError,
    },

    #[error("health check command cannot be empty")]
    EmptyHealthcheck,

    #[error("invalid environment variable name '{0}'")]
    InvalidEnvName(String),
}

/// Shell command the engine runs to decide container health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthcheckSpec {
    pub command: String,
    pub interval: Duration,
}

/// How host ports are picked for exposed ports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PortStrategy {
    /// Random ports, never repeated within the context.
    #[default]
    RandomUnique,
    /// These host ports, in exposed-port order.
    Fixed(Vec<u16>),
}

/// A validated, immutable container description.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub(crate) image: ImageRef,
    pub(crate) name: Option<String>,
    pub(crate) entrypoint: Option<String>,
    pub(crate) command: Vec<String>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) mounts: Vec<VolumeMount>,
    pub(crate) exposed_ports: Vec<ExposedPort>,
    pub(crate) healthcheck: Option<HealthcheckSpec>,
    pub(crate) privileged: bool,
    pub(crate) network: Option<String>,
    pub(crate) wait: Option<WaitStrategy>,
    pub(crate) port_strategy: PortStrategy,
    pub(crate) auth: Option<RegistryAuth>,
    pub(crate) stop_timeout: Duration,
}

impl ContainerSpec {
    pub fn builder(image: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder::new(image)
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn mounts(&self) -> &[VolumeMount] {
        &self.mounts
    }

    pub fn exposed_ports(&self) -> &[ExposedPort] {
        &self.exposed_ports
    }

    pub fn healthcheck(&self) -> Option<&HealthcheckSpec> {
        self.healthcheck.as_ref()
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    /// The configured wait strategy; `None` means "until running".
    pub fn wait(&self) -> Option<&WaitStrategy> {
        self.wait.as_ref()
    }

    pub fn port_strategy(&self) -> &PortStrategy {
        &self.port_strategy
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }
}

/// Mutable builder for [`ContainerSpec`].
///
/// ```
/// use cairn::container::ContainerBuilder;
/// use cairn::wait::WaitStrategy;
///
/// let spec = ContainerBuilder::new("redis:7")
///     .with_exposed_port(6379)
///     .with_wait(WaitStrategy::log("Ready to accept connections"))
///     .build()
///     .unwrap();
/// assert_eq!(spec.exposed_ports()[0].to_string(), "6379/tcp");
/// ```
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    image: String,
    name: Option<String>,
    entrypoint: Option<String>,
    command: Vec<String>,
    env: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    mounts: Vec<VolumeMount>,
    exposed_ports: Vec<String>,
    healthcheck: Option<HealthcheckSpec>,
    privileged: bool,
    network: Option<String>,
    wait: Option<WaitStrategy>,
    port_strategy: PortStrategy,
    auth: Option<RegistryAuth>,
    stop_timeout: Duration,
}

impl ContainerBuilder {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: None,
            entrypoint: None,
            command: Vec::new(),
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            mounts: Vec::new(),
            exposed_ports: Vec::new(),
            healthcheck: None,
            privileged: false,
            network: None,
            wait: None,
            port_strategy: PortStrategy::default(),
            auth: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set an environment variable; a later value for the same name wins.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Bind-mount `source` on the host at `target` in the container.
    pub fn with_mount(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mounts.push(VolumeMount {
            source: source.into(),
            target: target.into(),
            read_only: false,
        });
        self
    }

    pub fn with_read_only_mount(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.mounts.push(VolumeMount {
            source: source.into(),
            target: target.into(),
            read_only: true,
        });
        self
    }

    /// Expose a container port: `6379`, `"6379/tcp"` or `"53/udp"`.
    pub fn with_exposed_port(mut self, port: impl fmt::Display) -> Self {
        self.exposed_ports.push(port.to_string());
        self
    }

    pub fn with_exposed_ports<I, P>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        self.exposed_ports
            .extend(ports.into_iter().map(|p| p.to_string()));
        self
    }

    /// Shell command run by the engine as health check, every second.
    pub fn with_healthcheck(self, command: impl Into<String>) -> Self {
        self.with_healthcheck_interval(command, DEFAULT_HEALTHCHECK_INTERVAL)
    }

    pub fn with_healthcheck_interval(
        mut self,
        command: impl Into<String>,
        interval: Duration,
    ) -> Self {
        self.healthcheck = Some(HealthcheckSpec {
            command: command.into(),
            interval,
        });
        self
    }

    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_wait(mut self, wait: impl Into<WaitStrategy>) -> Self {
        self.wait = Some(wait.into());
        self
    }

    /// Change the deadline of the configured wait, or of the default
    /// running check when none is set.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        let wait = self.wait.take().unwrap_or_default();
        self.wait = Some(wait.with_timeout(timeout));
        self
    }

    pub fn with_port_strategy(mut self, strategy: PortStrategy) -> Self {
        self.port_strategy = strategy;
        self
    }

    /// Bind exposed ports to these host ports, in order.
    pub fn with_fixed_ports(self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.with_port_strategy(PortStrategy::Fixed(ports.into_iter().collect()))
    }

    /// Credentials used if the image has to be pulled.
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Grace period for `stop` and `restart` before the engine kills.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// The image this builder was created with, unparsed.
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn build(self) -> Result<ContainerSpec, SpecError> {
        let image = ImageRef::parse(&self.image)?;

        let exposed_ports = self
            .exposed_ports
            .iter()
            .map(|token| {
                ExposedPort::parse(token).map_err(|source| SpecError::Port {
                    token: token.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(bad) = self
            .env
            .keys()
            .find(|name| name.is_empty() || name.contains('='))
        {
            return Err(SpecError::InvalidEnvName(bad.clone()));
        }

        if let Some(ref hc) = self.healthcheck
            && hc.command.trim().is_empty()
        {
            return Err(SpecError::EmptyHealthcheck);
        }

        Ok(ContainerSpec {
            image,
            name: self.name,
            entrypoint: self.entrypoint,
            command: self.command,
            env: self.env,
            labels: self.labels,
            mounts: self.mounts,
            exposed_ports,
            healthcheck: self.healthcheck,
            privileged: self.privileged,
            network: self.network,
            wait: self.wait,
            port_strategy: self.port_strategy,
            auth: self.auth,
            stop_timeout: self.stop_timeout,
        })
    }
}
