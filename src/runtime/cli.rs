// ABOUTME: Engine binding that shells out to the docker or podman command-line tool.
// ABOUTME: Used where the engine socket is not reachable but the CLI is on PATH.

use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerInfo, ContainerOps, ContainerState, ExecConfig,
    ExecError, ExecOps, ExecResult, HealthState, HostBinding, ImageError, ImageOps, LogError,
    LogLine, LogOps, LogOptions, LogStream, NetworkInfo, NetworkSettings, RegistryAuth,
    RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::types::RuntimeType;
use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

const DEFAULT_HOST_IP: &str = "0.0.0.0";

/// Engine binding over the `docker` or `podman` executable.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
    runtime_type: RuntimeType,
}

impl CliRuntime {
    pub fn new(runtime_type: RuntimeType) -> Self {
        Self {
            binary: runtime_type.binary().to_string(),
            runtime_type,
        }
    }

    /// Use a specific executable instead of the one on PATH.
    pub fn with_binary(runtime_type: RuntimeType, binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            runtime_type,
        }
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    async fn run<I, S>(&self, args: I) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        tracing::trace!(binary = %self.binary, "running engine command");
        cmd.output().await
    }

    async fn run_container_cmd(&self, args: Vec<String>) -> Result<Output, ContainerError> {
        let output = self
            .run(&args)
            .await
            .map_err(|e| ContainerError::Runtime(format!("{}: {}", self.binary, e)))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(map_container_failure(&stderr_text(&output)))
        }
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

pub(super) fn is_missing_image(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such image")
        || lower.contains("image not known")
        || lower.contains("not found locally")
        || lower.contains("unable to find image")
}

fn is_missing_container(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such container") || lower.contains("no container with name or id")
}

fn is_not_running(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("is not running") || lower.contains("container state improper")
}

fn map_container_failure(stderr: &str) -> ContainerError {
    let lower = stderr.to_ascii_lowercase();
    if is_missing_image(stderr) {
        ContainerError::ImageNotFound(stderr.to_string())
    } else if is_missing_container(stderr) {
        ContainerError::NotFound(stderr.to_string())
    } else if lower.contains("conflict") || lower.contains("already in use") {
        ContainerError::AlreadyExists(stderr.to_string())
    } else if is_not_running(stderr) {
        ContainerError::NotRunning(stderr.to_string())
    } else {
        ContainerError::Runtime(stderr.to_string())
    }
}

/// Go duration notation accepted by both CLIs.
fn go_duration(d: Duration) -> String {
    format!("{}ms", d.as_millis())
}

/// Translate an engine-level creation request into `create` arguments.
fn create_args(config: &ContainerConfig) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--pull".to_string(), "never".to_string()];

    if let Some(ref name) = config.name {
        args.extend(["--name".to_string(), name.clone()]);
    }

    let mut env: Vec<_> = config.env.iter().collect();
    env.sort();
    for (key, value) in env {
        args.extend(["-e".to_string(), format!("{}={}", key, value)]);
    }

    let mut labels: Vec<_> = config.labels.iter().collect();
    labels.sort();
    for (key, value) in labels {
        args.extend(["--label".to_string(), format!("{}={}", key, value)]);
    }

    for mapping in &config.ports {
        let host_ip = mapping.host_ip.as_deref().unwrap_or(DEFAULT_HOST_IP);
        let host_port = mapping.host_port.map(|p| p.to_string()).unwrap_or_default();
        args.extend([
            "-p".to_string(),
            format!("{}:{}:{}", host_ip, host_port, mapping.container.key()),
        ]);
    }

    for mount in &config.volumes {
        let mut spec = format!("{}:{}", mount.source, mount.target);
        if mount.read_only {
            spec.push_str(":ro");
        }
        args.extend(["-v".to_string(), spec]);
    }

    if config.privileged {
        args.push("--privileged".to_string());
    }

    if let Some(ref network) = config.network {
        args.extend(["--network".to_string(), network.clone()]);
    }

    if let Some(ref hc) = config.healthcheck {
        let cmd = match hc.test.split_first() {
            Some((kind, rest)) if kind == "CMD-SHELL" || kind == "CMD" => rest.join(" "),
            _ => hc.test.join(" "),
        };
        args.extend([
            "--health-cmd".to_string(),
            cmd,
            "--health-interval".to_string(),
            go_duration(hc.interval),
        ]);
        if let Some(timeout) = hc.timeout {
            args.extend(["--health-timeout".to_string(), go_duration(timeout)]);
        }
        if let Some(retries) = hc.retries {
            args.extend(["--health-retries".to_string(), retries.to_string()]);
        }
    }

    // The CLI takes a single entrypoint word; further words lead the command.
    let mut trailing = Vec::new();
    if let Some((first, rest)) = config.entrypoint.as_deref().and_then(|e| e.split_first()) {
        args.extend(["--entrypoint".to_string(), first.clone()]);
        trailing.extend(rest.iter().cloned());
    }

    args.push(config.image.to_string());
    args.extend(trailing);
    args.extend(config.command.iter().cloned());
    args
}

// =============================================================================
// Inspect output
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: Option<InspectConfig>,
    #[serde(default)]
    state: Option<InspectState>,
    #[serde(default)]
    network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default, alias = "Healthcheck")]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<HashMap<String, InspectEndpoint>>,
    #[serde(default)]
    ports: Option<HashMap<String, Option<Vec<InspectBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEndpoint {
    #[serde(default, rename = "NetworkID")]
    network_id: Option<String>,
    #[serde(default, rename = "IPAddress")]
    ip_address: Option<String>,
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default)]
    aliases: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectBinding {
    #[serde(default)]
    host_ip: Option<String>,
    #[serde(default)]
    host_port: Option<String>,
}

fn parse_inspect(id: &ContainerId, json: &[u8]) -> Result<ContainerInfo, ContainerError> {
    let mut docs: Vec<InspectDoc> = serde_json::from_slice(json)
        .map_err(|e| ContainerError::Runtime(format!("unreadable inspect output: {}", e)))?;
    if docs.is_empty() {
        return Err(ContainerError::NotFound(id.to_string()));
    }
    let doc = docs.swap_remove(0);

    let (state, health) = match doc.state {
        Some(state) => {
            let health = state
                .health
                .map(|h| h.status)
                .filter(|s| !s.is_empty())
                .map(|s| HealthState::from_status(&s));
            (ContainerState::from_status(&state.status), health)
        }
        None => (ContainerState::Exited, None),
    };

    let mut networks = HashMap::new();
    let mut ports = HashMap::new();
    if let Some(settings) = doc.network_settings {
        for (name, endpoint) in settings.networks.unwrap_or_default() {
            networks.insert(
                name,
                NetworkInfo {
                    network_id: endpoint.network_id.unwrap_or_default(),
                    ip_address: endpoint.ip_address.unwrap_or_default(),
                    gateway: endpoint.gateway.unwrap_or_default(),
                    aliases: endpoint.aliases.unwrap_or_default(),
                },
            );
        }
        for (key, bindings) in settings.ports.unwrap_or_default() {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip,
                    host_port: b.host_port.and_then(|p| p.parse().ok()),
                })
                .collect();
            ports.insert(key, bindings);
        }
    }

    let ip_address = networks
        .get("bridge")
        .map(|n| n.ip_address.clone())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            let mut named: Vec<_> = networks
                .iter()
                .filter(|(_, n)| !n.ip_address.is_empty())
                .collect();
            named.sort_by(|a, b| a.0.cmp(b.0));
            named.first().map(|(_, n)| n.ip_address.clone())
        });

    let (image, labels) = match doc.config {
        Some(config) => (
            config.image.unwrap_or_default(),
            config.labels.unwrap_or_default(),
        ),
        None => (String::new(), HashMap::new()),
    };

    Ok(ContainerInfo {
        id: id.clone(),
        name: doc.name.trim_start_matches('/').to_string(),
        image,
        state,
        health,
        labels,
        network_settings: NetworkSettings {
            ip_address,
            networks,
            ports,
        },
    })
}

fn line_stream<R>(reader: R, stream: LogStream) -> impl Stream<Item = Result<LogLine, LogError>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::unfold(Some(BufReader::new(reader).lines()), move |lines| async move {
        let mut lines = lines?;
        match lines.next_line().await {
            Ok(Some(line)) => Some((
                Ok(LogLine {
                    content: format!("{}\n", line),
                    stream,
                }),
                Some(lines),
            )),
            Ok(None) => None,
            Err(e) => Some((Err(LogError::StreamError(e.to_string())), None)),
        }
    })
}

#[async_trait]
impl RuntimeInfo for CliRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let output = self
            .run(["info", "--format", "{{json .}}"])
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(format!("{}: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(RuntimeInfoError::ConnectionFailed(stderr_text(&output)));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| RuntimeInfoError::Runtime(e.to_string()))?;
        // Docker and Podman lay `info` out differently.
        let field = |docker: &str, podman: &str| {
            value
                .pointer(docker)
                .or_else(|| value.pointer(podman))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: field("/ServerVersion", "/version/Version"),
            api_version: field("/ServerVersion", "/version/APIVersion"),
            os: field("/OperatingSystem", "/host/os"),
            arch: field("/Architecture", "/host/arch"),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        let output = self
            .run(["version"])
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(format!("{}: {}", self.binary, e)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RuntimeInfoError::ConnectionFailed(stderr_text(&output)))
        }
    }
}

#[async_trait]
impl ImageOps for CliRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let mut args = vec!["pull".to_string(), "--quiet".to_string()];
        if let Some(auth) = auth {
            if self.runtime_type != RuntimeType::Podman {
                return Err(ImageError::AuthenticationFailed(
                    "registry credentials with the docker CLI need the api client".to_string(),
                ));
            }
            args.extend([
                "--creds".to_string(),
                format!("{}:{}", auth.username, auth.password),
            ]);
        }
        args.push(image_name.clone());

        let output = self
            .run(&args)
            .await
            .map_err(|e| ImageError::Runtime(format!("{}: {}", self.binary, e)))?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_text(&output);
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("unauthorized") || lower.contains("authentication required") {
            Err(ImageError::AuthenticationFailed(format!("{}: {}", image_name, stderr)))
        } else if lower.contains("manifest unknown") || lower.contains("not found") {
            Err(ImageError::NotFound(image_name))
        } else {
            Err(ImageError::PullFailed(format!("{}: {}", image_name, stderr)))
        }
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();
        let output = self
            .run(["image", "inspect", "--format", "{{.Id}}", image_name.as_str()])
            .await
            .map_err(|e| ImageError::Runtime(format!("{}: {}", self.binary, e)))?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = stderr_text(&output);
        if is_missing_image(&stderr) {
            Ok(false)
        } else {
            Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, stderr
            )))
        }
    }
}

#[async_trait]
impl ContainerOps for CliRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let output = self.run_container_cmd(create_args(config)).await?;
        let id = String::from_utf8_lossy(&output.stdout)
            .lines()
            .last()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ContainerError::Runtime("create printed no container id".to_string()))?;
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.run_container_cmd(vec!["start".to_string(), id.to_string()])
            .await
            .map(drop)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        self.run_container_cmd(vec![
            "stop".to_string(),
            "-t".to_string(),
            timeout.as_secs().to_string(),
            id.to_string(),
        ])
        .await
        .map(drop)
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        self.run_container_cmd(vec![
            "restart".to_string(),
            "-t".to_string(),
            timeout.as_secs().to_string(),
            id.to_string(),
        ])
        .await
        .map(drop)
    }

    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: Option<&str>,
    ) -> Result<(), ContainerError> {
        self.run_container_cmd(vec![
            "kill".to_string(),
            "-s".to_string(),
            signal.unwrap_or("SIGKILL").to_string(),
            id.to_string(),
        ])
        .await
        .map(drop)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let mut args = vec!["rm".to_string(), "-v".to_string()];
        if force {
            args.push("-f".to_string());
        }
        args.push(id.to_string());
        self.run_container_cmd(args).await.map(drop)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let output = self
            .run_container_cmd(vec![
                "inspect".to_string(),
                "--type".to_string(),
                "container".to_string(),
                id.to_string(),
            ])
            .await?;
        parse_inspect(id, &output.stdout)
    }
}

#[async_trait]
impl ExecOps for CliRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let mut args = vec!["exec".to_string()];
        for pair in &config.env {
            args.extend(["-e".to_string(), pair.clone()]);
        }
        if let Some(ref dir) = config.working_dir {
            args.extend(["-w".to_string(), dir.clone()]);
        }
        if let Some(ref user) = config.user {
            args.extend(["-u".to_string(), user.clone()]);
        }
        if config.privileged {
            args.push("--privileged".to_string());
        }
        args.push(container.to_string());
        args.extend(config.cmd.iter().cloned());

        let output = self
            .run(&args)
            .await
            .map_err(|e| ExecError::Runtime(format!("{}: {}", self.binary, e)))?;

        // Engine-side failures surface as CLI errors rather than command output.
        if !output.status.success() {
            let stderr = stderr_text(&output);
            if is_missing_container(&stderr) {
                return Err(ExecError::ContainerNotFound(container.to_string()));
            }
            if is_not_running(&stderr) {
                return Err(ExecError::ContainerNotRunning(container.to_string()));
            }
        }

        let exit_code = output
            .status
            .code()
            .ok_or_else(|| ExecError::Failed("exec terminated by signal".to_string()))?;

        Ok(ExecResult {
            exit_code: i64::from(exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[async_trait]
impl LogOps for CliRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        let mut args = vec!["logs".to_string()];
        if opts.follow {
            args.push("--follow".to_string());
        }
        if opts.timestamps {
            args.push("--timestamps".to_string());
        }
        if let Some(tail) = opts.tail {
            args.extend(["--tail".to_string(), tail.to_string()]);
        }
        args.push(id.to_string());

        let mut cmd = self.command();
        cmd.args(&args)
            .stdout(if opts.stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        if !opts.follow {
            let output = cmd
                .output()
                .await
                .map_err(|e| LogError::Runtime(format!("{}: {}", self.binary, e)))?;
            if !output.status.success() {
                let stderr = stderr_text(&output);
                return Err(if is_missing_container(&stderr) {
                    LogError::ContainerNotFound(id.to_string())
                } else {
                    LogError::Runtime(stderr)
                });
            }
            let mut lines = Vec::new();
            if opts.stdout {
                lines.push(Ok(LogLine {
                    content: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stream: LogStream::Stdout,
                }));
            }
            if opts.stderr {
                lines.push(Ok(LogLine {
                    content: String::from_utf8_lossy(&output.stderr).into_owned(),
                    stream: LogStream::Stderr,
                }));
            }
            return Ok(Box::pin(futures::stream::iter(lines)));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LogError::Runtime(format!("{}: {}", self.binary, e)))?;

        let stdout = child.stdout.take().map(|out| line_stream(out, LogStream::Stdout).boxed());
        let stderr = child
            .stderr
            .take()
            .filter(|_| opts.stderr)
            .map(|err| line_stream(err, LogStream::Stderr).boxed());

        let merged = futures::stream::select(
            stdout.unwrap_or_else(|| futures::stream::empty().boxed()),
            stderr.unwrap_or_else(|| futures::stream::empty().boxed()),
        );

        // The child lives as long as the stream and is killed when it is dropped.
        let guarded = merged.map(move |item| {
            let _ = &child;
            item
        });

        Ok(Box::pin(guarded))
    }
}
