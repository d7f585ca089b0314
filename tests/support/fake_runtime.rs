// ABOUTME: Scripted in-memory engine implementing the runtime traits.
// ABOUTME: Records every call and replays queued failures, health states, logs and exec results.

use async_trait::async_trait;
use cairn::runtime::{
    ContainerConfig, ContainerError, ContainerInfo, ContainerOps, ContainerState, ExecConfig,
    ExecError, ExecOps, ExecResult, HealthState, HostBinding, ImageError, ImageOps, LogError,
    LogLine, LogOps, LogOptions, LogStream, NetworkInfo, NetworkSettings, RegistryAuth,
};
use cairn::types::{ContainerId, ImageRef};
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Start(String),
    Stop(String),
    Restart(String),
    Kill(String, Option<String>),
    Remove(String),
    Inspect(String),
    Exec(String, Vec<String>),
    Logs(String),
    Pull(String),
}

struct FakeContainer {
    config: ContainerConfig,
    running: bool,
    started_at: Option<Instant>,
    index: u32,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    containers: HashMap<String, FakeContainer>,
    next_index: u32,
    create_errors: VecDeque<ContainerError>,
    start_errors: VecDeque<ContainerError>,
    remove_errors: VecDeque<ContainerError>,
    pull_error: Option<ImageError>,
    health: VecDeque<Option<HealthState>>,
    status: VecDeque<ContainerState>,
    logs: Vec<(Duration, String)>,
    exec_results: VecDeque<Result<ExecResult, ExecError>>,
    remove_delay: Duration,
    exec_delay: Duration,
}

/// Next value of a script; the last one repeats forever.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next create call with `error`. Queued errors are used in order.
    pub fn fail_create(&self, error: ContainerError) {
        self.state.lock().create_errors.push_back(error);
    }

    pub fn fail_start(&self, error: ContainerError) {
        self.state.lock().start_errors.push_back(error);
    }

    pub fn fail_remove(&self, error: ContainerError) {
        self.state.lock().remove_errors.push_back(error);
    }

    /// Make every remove take `delay` before it answers.
    pub fn delay_remove(&self, delay: Duration) {
        self.state.lock().remove_delay = delay;
    }

    /// Make every exec take `delay` before it answers.
    pub fn delay_exec(&self, delay: Duration) {
        self.state.lock().exec_delay = delay;
    }

    /// Fail every pull with `error`.
    pub fn fail_pull(&self, error: ImageError) {
        self.state.lock().pull_error = Some(error);
    }

    /// Health reported by successive inspects.
    pub fn script_health(&self, health: impl IntoIterator<Item = Option<HealthState>>) {
        self.state.lock().health = health.into_iter().collect();
    }

    /// Status reported by successive inspects, instead of the tracked one.
    pub fn script_status(&self, status: impl IntoIterator<Item = ContainerState>) {
        self.state.lock().status = status.into_iter().collect();
    }

    /// Make `line` appear in the logs `at` after the container starts.
    pub fn log_at(&self, at: Duration, line: impl Into<String>) {
        self.state.lock().logs.push((at, line.into()));
    }

    pub fn script_exec(&self, results: impl IntoIterator<Item = Result<ExecResult, ExecError>>) {
        self.state.lock().exec_results = results.into_iter().collect();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::Create(_)))
    }

    pub fn pulls(&self) -> usize {
        self.count(|c| matches!(c, Call::Pull(_)))
    }

    pub fn removes(&self) -> usize {
        self.count(|c| matches!(c, Call::Remove(_)))
    }

    pub fn inspects(&self) -> usize {
        self.count(|c| matches!(c, Call::Inspect(_)))
    }

    /// Containers created and not yet removed.
    pub fn live_containers(&self) -> usize {
        self.state.lock().containers.len()
    }

    /// Configuration of the only live container.
    pub fn only_config(&self) -> ContainerConfig {
        let state = self.state.lock();
        assert_eq!(state.containers.len(), 1, "expected exactly one container");
        state.containers.values().next().unwrap().config.clone()
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Create(config.image.to_string()));
        if let Some(error) = state.create_errors.pop_front() {
            return Err(error);
        }

        state.next_index += 1;
        let index = state.next_index;
        let id = format!("{:012x}{}", index, "f".repeat(52));
        state.containers.insert(
            id.clone(),
            FakeContainer {
                config: config.clone(),
                running: false,
                started_at: None,
                index,
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Start(id.to_string()));
        if let Some(error) = state.start_errors.pop_front() {
            return Err(error);
        }
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if container.running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.running = true;
        container.started_at.get_or_insert_with(Instant::now);
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Stop(id.to_string()));
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !container.running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.running = false;
        Ok(())
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Restart(id.to_string()));
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        container.running = true;
        Ok(())
    }

    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: Option<&str>,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::Kill(id.to_string(), signal.map(String::from)));
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !container.running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push(Call::Remove(id.to_string()));
            state.remove_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if let Some(error) = state.remove_errors.pop_front() {
            return Err(error);
        }
        state
            .containers
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Inspect(id.to_string()));
        let health = next_scripted(&mut state.health).flatten();
        let scripted_status = next_scripted(&mut state.status);
        let container = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        let status = scripted_status.unwrap_or(match (container.running, container.started_at) {
            (true, _) => ContainerState::Running,
            (false, None) => ContainerState::Created,
            (false, Some(_)) => ContainerState::Exited,
        });

        let bridge_ip = format!("172.17.0.{}", container.index + 1);
        let mut settings = NetworkSettings {
            ip_address: Some(bridge_ip.clone()),
            ..Default::default()
        };
        settings.networks.insert(
            "bridge".to_string(),
            NetworkInfo {
                network_id: "net-bridge".to_string(),
                ip_address: bridge_ip,
                ..Default::default()
            },
        );
        if let Some(network) = &container.config.network {
            settings.networks.insert(
                network.clone(),
                NetworkInfo {
                    network_id: format!("net-{}", network),
                    ip_address: format!("10.89.0.{}", container.index + 1),
                    ..Default::default()
                },
            );
        }
        for mapping in &container.config.ports {
            settings.ports.insert(
                mapping.container.key(),
                vec![HostBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: mapping.host_port,
                }],
            );
        }

        Ok(ContainerInfo {
            id: id.clone(),
            name: container.config.name.clone().unwrap_or_default(),
            image: container.config.image.to_string(),
            state: status,
            health,
            labels: container.config.labels.clone(),
            network_settings: settings,
        })
    }
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let delay = {
            let mut state = self.state.lock();
            state
                .calls
                .push(Call::Exec(container.to_string(), config.cmd.clone()));
            state.exec_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if !state.containers.contains_key(container.as_str()) {
            return Err(ExecError::ContainerNotFound(container.to_string()));
        }
        next_scripted(&mut state.exec_results).unwrap_or_else(|| {
            Ok(ExecResult {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        })
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Logs(id.to_string()));
        let started_at = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?
            .started_at;

        let elapsed = started_at.map(|t| t.elapsed()).unwrap_or_default();
        let lines: Vec<Result<LogLine, LogError>> = state
            .logs
            .iter()
            .filter(|(at, _)| started_at.is_some() && *at <= elapsed)
            .map(|(_, line)| {
                Ok(LogLine {
                    content: format!("{}\n", line),
                    stream: LogStream::Stdout,
                })
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(lines)))
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Pull(reference.to_string()));
        match &state.pull_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn image_exists(&self, _reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(true)
    }
}
