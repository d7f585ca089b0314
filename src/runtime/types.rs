// ABOUTME: Runtime selection types: engine kind, binding kind, detected socket.
// ABOUTME: RuntimeConfig reads explicit overrides from CAIRN_* environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ENV_RUNTIME: &str = "CAIRN_RUNTIME";
pub const ENV_SOCKET: &str = "CAIRN_SOCKET";
pub const ENV_CLIENT: &str = "CAIRN_CLIENT";
pub const ENV_BINARY: &str = "CAIRN_BINARY";

/// The container engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    /// Name of the engine's command-line tool.
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for RuntimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeType::Docker),
            "podman" => Ok(RuntimeType::Podman),
            other => Err(format!("unknown runtime '{}' (expected docker or podman)", other)),
        }
    }
}

/// How to talk to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// HTTP API over the engine's Unix socket.
    #[default]
    Api,
    /// Shell out to the engine's command-line tool.
    Cli,
}

impl FromStr for ClientKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(ClientKind::Api),
            "cli" => Ok(ClientKind::Cli),
            other => Err(format!("unknown client '{}' (expected api or cli)", other)),
        }
    }
}

/// A detected engine.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

/// Explicit runtime overrides. Unset fields fall back to auto-detection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
    #[serde(default)]
    pub client: ClientKind,
    /// Path to the command-line tool for the `cli` client.
    pub binary: Option<String>,
}

impl RuntimeConfig {
    /// Read `CAIRN_RUNTIME`, `CAIRN_SOCKET`, `CAIRN_CLIENT` and `CAIRN_BINARY`.
    pub fn from_env() -> Result<Self, String> {
        let runtime = read_env(ENV_RUNTIME).map(|v| v.parse()).transpose()?;
        let client = read_env(ENV_CLIENT)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            runtime,
            socket: read_env(ENV_SOCKET),
            client,
            binary: read_env(ENV_BINARY),
        })
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_means_auto_detect() {
        temp_env::with_vars_unset([ENV_RUNTIME, ENV_SOCKET, ENV_CLIENT, ENV_BINARY], || {
            let config = RuntimeConfig::from_env().unwrap();
            assert_eq!(config.runtime, None);
            assert_eq!(config.socket, None);
            assert_eq!(config.client, ClientKind::Api);
        });
    }

    #[test]
    fn environment_overrides_are_parsed() {
        temp_env::with_vars(
            [
                (ENV_RUNTIME, Some("Podman")),
                (ENV_SOCKET, Some("/tmp/podman.sock")),
                (ENV_CLIENT, Some("cli")),
                (ENV_BINARY, None),
            ],
            || {
                let config = RuntimeConfig::from_env().unwrap();
                assert_eq!(config.runtime, Some(RuntimeType::Podman));
                assert_eq!(config.socket.as_deref(), Some("/tmp/podman.sock"));
                assert_eq!(config.client, ClientKind::Cli);
                assert_eq!(config.binary, None);
            },
        );
    }

    #[test]
    fn invalid_runtime_is_rejected() {
        temp_env::with_var(ENV_RUNTIME, Some("containerd"), || {
            let err = RuntimeConfig::from_env().unwrap_err();
            assert!(err.contains("containerd"));
        });
    }
}
