// ABOUTME: Waits until a TCP port in the container accepts connections.
// ABOUTME: One connect attempt per poll, bounded by the connect timeout.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use crate::runtime::ContainerError;
use crate::types::ExposedPort;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct TcpPortOpen {
    port: u16,
    use_mapped_port: bool,
    connect_timeout: Duration,
}

impl TcpPortOpen {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            use_mapped_port: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Connect to the host's mapped port instead of the container address.
    pub fn using_mapped_port(mut self) -> Self {
        self.use_mapped_port = true;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for TcpPortOpen {
    fn describe(&self) -> String {
        if self.use_mapped_port {
            format!("TCP port {} (mapped)", self.port)
        } else {
            format!("TCP port {}", self.port)
        }
    }

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError> {
        let target = if self.use_mapped_port {
            container
                .mapped_port(ExposedPort::tcp(self.port))
                .await
                .map(|port| (container.host().to_string(), port))
        } else {
            container.address().await.map(|address| (address, self.port))
        };

        let (host, port) = match target {
            Ok(target) => target,
            Err(source @ ContainerError::PortNotExposed { .. }) => {
                return Err(WaitError::Resolve {
                    id: container.id().clone(),
                    source,
                });
            }
            Err(e) => return Ok(Readiness::not_ready(e)),
        };

        match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
        {
            Ok(Ok(_)) => Ok(Readiness::Ready),
            Ok(Err(e)) => Ok(Readiness::not_ready(format_args!(
                "connect to {}:{} failed: {}",
                host, port, e
            ))),
            Err(_) => Ok(Readiness::not_ready("connect timed out")),
        }
    }
}
