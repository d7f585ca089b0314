// ABOUTME: Bollard-based engine binding over the Docker-compatible HTTP API.
// ABOUTME: Serves both Docker and Podman through their Unix sockets.

use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerInfo, ContainerOps, ContainerState, ExecConfig,
    ExecError, ExecOps, ExecResult, HealthState, HostBinding, ImageError, ImageOps, LogError,
    LogLine, LogOps, LogOptions, LogStream, NetworkInfo, NetworkSettings, RegistryAuth,
    RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::cli::is_missing_image;
use crate::runtime::types::RuntimeType;
use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerCreateBody, ContainerStateStatusEnum, HealthConfig, HealthStatusEnum, HostConfig,
    Mount, MountTypeEnum, PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    KillContainerOptionsBuilder, LogsOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Address port bindings listen on unless the caller picks one.
const DEFAULT_HOST_IP: &str = "0.0.0.0";

/// How long to keep reading a Podman exec stream after the process exited.
const EXEC_DRAIN_GRACE: Duration = Duration::from_millis(200);
const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match status_of(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        Some((401 | 403, message)) => ImageError::AuthenticationFailed(message.to_string()),
        _ => {
            let text = e.to_string();
            if text.contains("unauthorized") || text.contains("authentication required") {
                ImageError::AuthenticationFailed(format!("{}: {}", image_name, text))
            } else {
                ImageError::PullFailed(format!("{}: {}", image_name, text))
            }
        }
    }
}

/// Create also answers 404 for a missing network, which no pull can fix.
fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) if is_missing_image(message) => {
            ContainerError::ImageNotFound(message.to_string())
        }
        Some((404, message)) => ContainerError::InvalidConfig(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        Some((400, message)) => ContainerError::InvalidConfig(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::NotRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_kill_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((409, message)) => ContainerError::NotRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> ExecError {
    match status_of(&e) {
        Some((404, message)) => ExecError::ContainerNotFound(message.to_string()),
        Some((409, message)) => ExecError::ContainerNotRunning(message.to_string()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn map_exec_start_error(e: bollard::errors::Error) -> ExecError {
    match status_of(&e) {
        Some((404, message)) => ExecError::ContainerNotFound(message.to_string()),
        Some((409, message)) => ExecError::ContainerNotRunning(message.to_string()),
        _ => ExecError::Failed(e.to_string()),
    }
}

fn map_log_error(e: bollard::errors::Error) -> LogError {
    match status_of(&e) {
        Some((404, message)) => LogError::ContainerNotFound(message.to_string()),
        _ => LogError::StreamError(e.to_string()),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Engine binding using bollard.
///
/// Serves Docker and Podman alike through the Docker-compatible API. Podman
/// exec streams are read with an exit watchdog, since they do not always
/// close once the process has finished.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the engine described by a detection result.
    pub fn connect(info: &super::types::RuntimeInfo) -> Result<Self, RuntimeInfoError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, info.runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    async fn exec_exit_code(&self, exec_id: &str) -> Result<(bool, Option<i64>), ExecError> {
        let details = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(map_exec_start_error)?;
        Ok((details.running.unwrap_or(false), details.exit_code))
    }

    /// Read attached exec output. For Podman the exec is also polled, and the
    /// stream is abandoned shortly after the process has exited.
    async fn read_exec_output(
        &self,
        exec_id: &str,
        mut output: Pin<Box<dyn Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send>>,
    ) -> Result<(Vec<u8>, Vec<u8>), ExecError> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let watch_exit = self.runtime_type == RuntimeType::Podman;

        let mut push = |item: Result<LogOutput, bollard::errors::Error>| -> Result<(), ExecError> {
            match item.map_err(|e| ExecError::Failed(e.to_string()))? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stdout.extend_from_slice(&message)
                }
                LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                LogOutput::StdIn { .. } => {}
            }
            Ok(())
        };

        loop {
            tokio::select! {
                item = output.next() => match item {
                    Some(item) => push(item)?,
                    None => break,
                },
                _ = tokio::time::sleep(EXEC_POLL_INTERVAL), if watch_exit => {
                    let (running, _) = self.exec_exit_code(exec_id).await?;
                    if !running {
                        while let Ok(Some(item)) =
                            tokio::time::timeout(EXEC_DRAIN_GRACE, output.next()).await
                        {
                            push(item)?;
                        }
                        break;
                    }
                }
            }
        }

        Ok((stdout, stderr))
    }
}

fn container_state(status: Option<ContainerStateStatusEnum>) -> ContainerState {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerState::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerState::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerState::Removing,
        Some(ContainerStateStatusEnum::DEAD) => ContainerState::Dead,
        _ => ContainerState::Exited,
    }
}

fn health_state(status: HealthStatusEnum) -> HealthState {
    match status {
        HealthStatusEnum::STARTING => HealthState::Starting,
        HealthStatusEnum::HEALTHY => HealthState::Healthy,
        HealthStatusEnum::UNHEALTHY => HealthState::Unhealthy,
        HealthStatusEnum::NONE => HealthState::None,
        other => HealthState::Unknown(other.to_string()),
    }
}

/// Address on the default bridge, or else on the alphabetically first
/// network that assigned one.
fn default_address(networks: &HashMap<String, NetworkInfo>) -> Option<String> {
    if let Some(bridge) = networks.get("bridge")
        && !bridge.ip_address.is_empty()
    {
        return Some(bridge.ip_address.clone());
    }
    let mut named: Vec<_> = networks
        .iter()
        .filter(|(_, n)| !n.ip_address.is_empty())
        .collect();
    named.sort_by(|a, b| a.0.cmp(b.0));
    named.first().map(|(_, n)| n.ip_address.clone())
}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();

        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        let credentials = auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server.clone(),
            ..Default::default()
        });

        // The pull only finishes once its progress stream is drained.
        let mut stream = self.client.create_image(Some(opts), None, credentials);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, &image_name))?;
        }

        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut host_config = HostConfig {
            privileged: Some(config.privileged),
            ..Default::default()
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for mapping in &config.ports {
            let port_key = mapping.container.key();
            exposed_ports.push(port_key.clone());
            port_bindings.insert(
                port_key,
                Some(vec![PortBinding {
                    host_ip: Some(
                        mapping
                            .host_ip
                            .clone()
                            .unwrap_or_else(|| DEFAULT_HOST_IP.to_string()),
                    ),
                    host_port: mapping.host_port.map(|p| p.to_string()),
                }]),
            );
        }
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        if let Some(ref network) = config.network {
            host_config.network_mode = Some(network.clone());
        }

        let healthcheck = config.healthcheck.as_ref().map(|hc| HealthConfig {
            test: Some(hc.test.clone()),
            interval: Some(hc.interval.as_nanos() as i64),
            timeout: hc.timeout.map(|t| t.as_nanos() as i64),
            retries: hc.retries.map(i64::from),
            ..Default::default()
        });

        let body = ContainerCreateBody {
            image: Some(config.image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: if config.command.is_empty() {
                None
            } else {
                Some(config.command.clone())
            },
            entrypoint: config.entrypoint.clone(),
            host_config: Some(host_config),
            healthcheck,
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: config.name.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = RestartContainerOptions {
            t: Some(timeout.as_secs() as i32),
            ..Default::default()
        };

        self.client
            .restart_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: Option<&str>,
    ) -> Result<(), ContainerError> {
        let opts = KillContainerOptionsBuilder::default()
            .signal(signal.unwrap_or("SIGKILL"))
            .build();

        self.client
            .kill_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_kill_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = container_state(details.state.as_ref().and_then(|s| s.status));

        // A missing or empty health status means no health check; the engine
        // may also report "none" explicitly, which maps to HealthState::None.
        let health = details
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .filter(|s| *s != HealthStatusEnum::EMPTY)
            .map(health_state);

        let mut networks = HashMap::new();
        let mut ports = HashMap::new();
        if let Some(ref settings) = details.network_settings {
            if let Some(ref nets) = settings.networks {
                for (name, endpoint) in nets {
                    networks.insert(
                        name.clone(),
                        NetworkInfo {
                            network_id: endpoint.network_id.clone().unwrap_or_default(),
                            ip_address: endpoint.ip_address.clone().unwrap_or_default(),
                            gateway: endpoint.gateway.clone().unwrap_or_default(),
                            aliases: endpoint.aliases.clone().unwrap_or_default(),
                        },
                    );
                }
            }
            if let Some(ref bindings) = settings.ports {
                for (key, entries) in bindings {
                    let entries = entries
                        .iter()
                        .flatten()
                        .map(|b| HostBinding {
                            host_ip: b.host_ip.clone(),
                            host_port: b.host_port.as_deref().and_then(|p| p.parse().ok()),
                        })
                        .collect();
                    ports.insert(key.clone(), entries);
                }
            }
        }

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            health,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
            network_settings: NetworkSettings {
                ip_address: default_address(&networks),
                networks,
                ports,
            },
        })
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            privileged: Some(config.privileged),
            ..Default::default()
        };

        let exec_id = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?
            .id;

        let started = self
            .client
            .start_exec(
                &exec_id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_start_error)?;

        let (stdout, stderr) = match started {
            StartExecResults::Attached { output, .. } => {
                self.read_exec_output(&exec_id, output).await?
            }
            StartExecResults::Detached => (Vec::new(), Vec::new()),
        };

        let (_, exit_code) = self.exec_exit_code(&exec_id).await?;

        Ok(ExecResult {
            exit_code: exit_code.unwrap_or(0),
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            timestamps: opts.timestamps,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(|result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        LogOutput::StdErr { message } => (LogStream::Stderr, message),
                        LogOutput::StdOut { message }
                        | LogOutput::StdIn { message }
                        | LogOutput::Console { message } => (LogStream::Stdout, message),
                    };

                    LogLine {
                        content: String::from_utf8_lossy(&data).into_owned(),
                        stream,
                    }
                })
                .map_err(map_log_error)
        });

        Ok(Box::pin(mapped_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn missing_image_on_create_is_image_not_found() {
        let err = map_container_create_error(server_error(404, "No such image: redis:7"));
        assert!(matches!(err, ContainerError::ImageNotFound(m) if m.contains("redis:7")));
    }

    #[test]
    fn podman_missing_image_on_create_is_image_not_found() {
        let err = map_container_create_error(server_error(
            404,
            "docker.io/library/redis:7: image not known",
        ));
        assert!(matches!(err, ContainerError::ImageNotFound(_)));
    }

    #[test]
    fn missing_network_on_create_is_not_an_image_error() {
        let err = map_container_create_error(server_error(404, "network backend not found"));
        assert!(matches!(err, ContainerError::InvalidConfig(m) if m.contains("backend")));
    }

    #[test]
    fn name_conflict_on_create_is_already_exists() {
        let err = map_container_create_error(server_error(409, "Conflict"));
        assert!(matches!(err, ContainerError::AlreadyExists(_)));
    }

    #[test]
    fn pull_errors_distinguish_auth() {
        let err = map_image_pull_error(server_error(401, "denied"), "private/img");
        assert!(matches!(err, ImageError::AuthenticationFailed(_)));

        let err = map_image_pull_error(server_error(500, "boom"), "redis");
        assert!(matches!(err, ImageError::PullFailed(m) if m.starts_with("redis")));
    }

    #[test]
    fn health_enum_taxonomy() {
        assert_eq!(health_state(HealthStatusEnum::HEALTHY), HealthState::Healthy);
        assert_eq!(health_state(HealthStatusEnum::STARTING), HealthState::Starting);
        assert_eq!(health_state(HealthStatusEnum::NONE), HealthState::None);
        assert!(matches!(
            health_state(HealthStatusEnum::EMPTY),
            HealthState::Unknown(_)
        ));
    }

    #[test]
    fn default_address_prefers_bridge() {
        let mut networks = HashMap::new();
        networks.insert(
            "zeta".to_string(),
            NetworkInfo {
                ip_address: "10.0.0.9".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(default_address(&networks).as_deref(), Some("10.0.0.9"));

        networks.insert(
            "bridge".to_string(),
            NetworkInfo {
                ip_address: "172.17.0.2".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(default_address(&networks).as_deref(), Some("172.17.0.2"));
    }
}
