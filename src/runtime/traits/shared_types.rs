// ABOUTME: Value types shared by the runtime traits.
// ABOUTME: Creation requests, inspection snapshots, exec requests and results.

use crate::types::{ContainerId, ExposedPort, ImageRef};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Engine-level creation request, produced by the orchestrator from a spec.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Container name; the engine picks one when `None`.
    pub name: Option<String>,
    pub image: ImageRef,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    /// Overrides the image CMD when non-empty.
    pub command: Vec<String>,
    /// Overrides the image ENTRYPOINT.
    pub entrypoint: Option<Vec<String>>,
    pub healthcheck: Option<HealthcheckConfig>,
    pub privileged: bool,
    /// Network to attach the container to.
    pub network: Option<String>,
}

impl ContainerConfig {
    pub fn new(image: ImageRef) -> Self {
        Self {
            name: None,
            image,
            env: HashMap::new(),
            labels: HashMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            command: Vec::new(),
            entrypoint: None,
            healthcheck: None,
            privileged: false,
            network: None,
        }
    }
}

/// Binding of a container port to a host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container: ExposedPort,
    /// Host port; the engine picks one when `None`.
    pub host_port: Option<u16>,
    pub host_ip: Option<String>,
}

/// Bind mount of a host path into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Engine-run health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthcheckConfig {
    /// Test in engine notation, e.g. `["CMD-SHELL", "redis-cli ping"]`.
    pub test: Vec<String>,
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

/// Inspection snapshot of a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// `None` when the engine reports no health section at all.
    pub health: Option<HealthState>,
    pub labels: HashMap<String, String>,
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    /// Map the engine's `State.Status` string. Unknown values are treated as exited.
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "created" | "configured" | "initialized" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" | "stopping" => ContainerState::Removing,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Exited,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Engine-reported health, from `State.Health.Status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    /// The engine explicitly reports that no health check is configured.
    None,
    /// Anything else, kept verbatim for error reporting.
    Unknown(String),
}

impl HealthState {
    pub fn from_status(status: &str) -> Self {
        match status.trim().trim_matches('"') {
            "starting" => HealthState::Starting,
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            "none" => HealthState::None,
            other => HealthState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Starting => f.write_str("starting"),
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
            HealthState::None => f.write_str("none"),
            HealthState::Unknown(s) => f.write_str(s),
        }
    }
}

/// Network part of an inspection snapshot.
#[derive(Debug, Clone, Default)]
pub struct NetworkSettings {
    /// Address on the default bridge network, if attached to it.
    pub ip_address: Option<String>,
    /// Per-network endpoints, keyed by network name.
    pub networks: HashMap<String, NetworkInfo>,
    /// Host bindings keyed by `port/protocol`.
    pub ports: HashMap<String, Vec<HostBinding>>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    pub network_id: String,
    pub ip_address: String,
    pub gateway: String,
    pub aliases: Vec<String>,
}

/// One host-side binding of a container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
}

/// Registry credentials for pulls.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    /// Registry server, e.g. `ghcr.io`.
    pub server: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// "Docker" or "Podman".
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}

/// Exec request.
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    /// `KEY=VALUE` pairs.
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub privileged: bool,
}

impl ExecConfig {
    pub fn command<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Outcome of an exec: exit code and captured output.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr, lossily decoded.
    pub fn output(&self) -> String {
        let mut out = self.stdout_str();
        out.push_str(&self.stderr_str());
        out
    }
}
