// ABOUTME: Local container engine detection.
// ABOUTME: Honors explicit config, then checks Podman sockets before Docker.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured socket does not exist: {0}")]
    SocketMissing(String),
}

/// Detect the engine on this machine.
///
/// An explicit runtime in `config` wins (with its default socket unless one
/// is given). Otherwise the first existing socket is used, in order:
/// 1. Rootless Podman (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman (`/run/podman/podman.sock`)
/// 3. Docker (`/var/run/docker.sock`)
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<RuntimeInfo, DetectionError> {
    if let Some(cfg) = config {
        match (cfg.runtime, &cfg.socket) {
            (Some(runtime_type), socket) => {
                let socket_path = socket
                    .clone()
                    .unwrap_or_else(|| default_socket_path(runtime_type));
                return Ok(RuntimeInfo {
                    runtime_type,
                    socket_path,
                });
            }
            (None, Some(socket)) => {
                if !Path::new(socket).exists() {
                    return Err(DetectionError::SocketMissing(socket.clone()));
                }
                let runtime_type = if socket.contains("podman") {
                    RuntimeType::Podman
                } else {
                    RuntimeType::Docker
                };
                return Ok(RuntimeInfo {
                    runtime_type,
                    socket_path: socket.clone(),
                });
            }
            (None, None) => {}
        }
    }

    candidate_sockets()
        .into_iter()
        .find(|(_, path)| Path::new(path).exists())
        .map(|(runtime_type, socket_path)| RuntimeInfo {
            runtime_type,
            socket_path,
        })
        .ok_or(DetectionError::NoRuntimeFound)
}

fn candidate_sockets() -> Vec<(RuntimeType, String)> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(uid) = current_uid() {
        candidates.push((
            RuntimeType::Podman,
            format!("/run/user/{}/podman/podman.sock", uid),
        ));
    }
    candidates.push((RuntimeType::Podman, ROOTFUL_PODMAN.to_string()));
    candidates.push((RuntimeType::Docker, DOCKER_SOCKET.to_string()));
    candidates
}

fn current_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status").ok().and_then(|status| {
            status
                .lines()
                .find(|l| l.starts_with("Uid:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .map(str::to_string)
        })
    })
}

pub(crate) fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_runtime_uses_default_socket() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            ..Default::default()
        };
        let info = detect_local(Some(&config)).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Docker);
        assert_eq!(info.socket_path, DOCKER_SOCKET);
    }

    #[test]
    fn explicit_socket_is_kept() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Podman),
            socket: Some("/tmp/custom.sock".to_string()),
            ..Default::default()
        };
        let info = detect_local(Some(&config)).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Podman);
        assert_eq!(info.socket_path, "/tmp/custom.sock");
    }

    #[test]
    fn missing_explicit_socket_is_an_error() {
        let config = RuntimeConfig {
            socket: Some("/nonexistent/cairn-test.sock".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            detect_local(Some(&config)),
            Err(DetectionError::SocketMissing(_))
        ));
    }

    #[test]
    fn rootless_podman_is_checked_first() {
        let candidates = candidate_sockets();
        assert_eq!(candidates.last().unwrap().0, RuntimeType::Docker);
        assert!(candidates.iter().take(2).all(|(rt, _)| *rt == RuntimeType::Podman));
    }
}
