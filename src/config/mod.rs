// ABOUTME: Spec files (cairn.yml) describing a container for the CLI.
// ABOUTME: Parses YAML, resolves env references, and converts into a ContainerBuilder.

mod deserialize;
mod env_value;
mod healthcheck;
mod wait;

pub use deserialize::parse_mount;
pub use env_value::{EnvValue, resolve_env_map};
pub use healthcheck::HealthcheckFile;
pub use wait::{HttpWaitFile, TcpWaitFile, WaitFile};

use crate::container::{ContainerBuilder, ContainerSpec};
use crate::error::{Error, Result};
use crate::runtime::VolumeMount;
use crate::types::ExposedPort;
use deserialize::{deserialize_command, deserialize_mounts};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const SPEC_FILENAME: &str = "cairn.yml";
pub const SPEC_FILENAME_ALT: &str = "cairn.yaml";
pub const SPEC_FILENAME_DIR: &str = ".cairn/spec.yml";

/// A container described in YAML.
///
/// ```yaml
/// image: redis:7
/// ports: [6379]
/// env:
///   REDIS_PASSWORD: { env: REDIS_PASSWORD, default: secret }
/// wait:
///   log: Ready to accept connections
///   timeout: 30s
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    pub image: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub entrypoint: Option<String>,

    #[serde(default, deserialize_with = "deserialize_command")]
    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub ports: Vec<ExposedPort>,

    #[serde(default, deserialize_with = "deserialize_mounts")]
    pub mounts: Vec<VolumeMount>,

    #[serde(default)]
    pub privileged: bool,

    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub healthcheck: Option<HealthcheckFile>,

    #[serde(default)]
    pub wait: Option<WaitFile>,

    #[serde(default, with = "humantime_serde")]
    pub stop_timeout: Option<Duration>,
}

impl SpecFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::SpecFileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::from_yaml(&content)
    }

    /// Load the first spec file found in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(SPEC_FILENAME),
            dir.join(SPEC_FILENAME_ALT),
            dir.join(SPEC_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::SpecFileNotFound(dir.to_path_buf()))
    }

    /// A builder preloaded with this file, so callers can layer overrides.
    /// Environment references are resolved here.
    pub fn into_builder(self) -> Result<ContainerBuilder> {
        let env = resolve_env_map(&self.env)?;
        let wait = self.wait.as_ref().map(WaitFile::to_strategy).transpose()?;

        let mut builder = ContainerBuilder::new(self.image)
            .with_command(self.command)
            .with_envs(env)
            .with_exposed_ports(self.ports)
            .with_privileged(self.privileged);

        if let Some(name) = self.name {
            builder = builder.with_name(name);
        }
        if let Some(entrypoint) = self.entrypoint {
            builder = builder.with_entrypoint(entrypoint);
        }
        for (key, value) in self.labels {
            builder = builder.with_label(key, value);
        }
        for mount in self.mounts {
            builder = if mount.read_only {
                builder.with_read_only_mount(mount.source, mount.target)
            } else {
                builder.with_mount(mount.source, mount.target)
            };
        }
        if let Some(network) = self.network {
            builder = builder.with_network(network);
        }
        if let Some(hc) = self.healthcheck {
            builder = builder.with_healthcheck_interval(hc.cmd, hc.interval);
        }
        if let Some(wait) = wait {
            builder = builder.with_wait(wait);
        }
        if let Some(timeout) = self.stop_timeout {
            builder = builder.with_stop_timeout(timeout);
        }
        Ok(builder)
    }

    pub fn into_spec(self) -> Result<ContainerSpec> {
        Ok(self.into_builder()?.build()?)
    }
}
