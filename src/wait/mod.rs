// ABOUTME: Readiness waits for started containers.
// ABOUTME: One Probe per strategy, all driven by the shared deadline and poll loop.

mod error;
mod exec;
mod health;
mod http;
mod log;
mod nothing;
mod poll;
mod running;
mod tcp;

pub use error::WaitError;
pub use exec::{ExecCheck, ExecPredicate};
pub use health::HealthCheck;
pub use http::HttpCheck;
pub use log::LogMatch;
pub use nothing::NoWait;
pub use poll::poll_until_ready;
pub use running::ContainerRunning;
pub use tcp::TcpPortOpen;

use crate::container::StartedContainer;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not yet; the reason is only logged.
    NotReady(String),
}

impl Readiness {
    pub fn not_ready(reason: impl fmt::Display) -> Self {
        Readiness::NotReady(reason.to_string())
    }
}

/// A single readiness check.
///
/// `Ok(NotReady)` asks the loop to try again; `Err` ends the wait at once and
/// is reserved for conditions more waiting cannot fix.
#[async_trait]
pub trait Probe: Send + Sync + fmt::Debug {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError>;
}

/// A probe with its deadline and poll interval.
#[derive(Debug, Clone)]
pub struct WaitStrategy {
    probe: Arc<dyn Probe>,
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitStrategy {
    pub fn new(probe: impl Probe + 'static) -> Self {
        Self {
            probe: Arc::new(probe),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Ready once the engine reports the container running.
    pub fn running() -> Self {
        Self::new(ContainerRunning)
    }

    /// Ready once the logs contain `message`.
    pub fn log(message: impl Into<String>) -> Self {
        Self::new(LogMatch::new(message))
    }

    /// Ready once the logs match `pattern`.
    pub fn log_regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(LogMatch::regex(pattern)?))
    }

    /// Ready once `cmd` exits 0 inside the container.
    pub fn exec<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ExecCheck::new(cmd))
    }

    /// Ready once `GET /` on `port` answers 200.
    pub fn http(port: u16) -> Self {
        Self::new(HttpCheck::new(port))
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(TcpPortOpen::new(port))
    }

    /// Ready once the engine's health check reports healthy.
    pub fn healthy() -> Self {
        Self::new(HealthCheck)
    }

    pub fn none() -> Self {
        Self::new(NoWait)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn describe(&self) -> String {
        self.probe.describe()
    }

    /// Block until the container is ready.
    pub async fn wait(
        &self,
        container: &StartedContainer,
        cancel: &CancellationToken,
    ) -> Result<(), WaitError> {
        tracing::debug!(
            container = %container.id().short(),
            strategy = %self.probe.describe(),
            timeout = ?self.timeout,
            "waiting for container"
        );
        poll_until_ready(
            container.id(),
            self.timeout,
            self.poll_interval,
            cancel,
            || self.probe.probe(container),
        )
        .await
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::running()
    }
}

impl<P: Probe + 'static> From<P> for WaitStrategy {
    fn from(probe: P) -> Self {
        Self::new(probe)
    }
}
