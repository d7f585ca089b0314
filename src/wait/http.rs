// ABOUTME: Waits until an HTTP endpoint in the container answers with the expected status.
// ABOUTME: Targets the container address, or the mapped port on the host.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use crate::runtime::ContainerError;
use crate::types::ExposedPort;
use async_trait::async_trait;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HttpCheck {
    port: u16,
    method: Method,
    path: String,
    expected_status: StatusCode,
    use_mapped_port: bool,
    request_timeout: Duration,
}

impl HttpCheck {
    /// `GET /` on container port `port`, expecting 200.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            method: Method::GET,
            path: "/".to_string(),
            expected_status: StatusCode::OK,
            use_mapped_port: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn with_expected_status(mut self, status: StatusCode) -> Self {
        self.expected_status = status;
        self
    }

    /// Probe the host's mapped port instead of the container address. Needed
    /// when the container network is not routable from the test process.
    pub fn using_mapped_port(mut self) -> Self {
        self.use_mapped_port = true;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn request(&self, host: &str, port: u16) -> Result<StatusCode, String> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| format!("connect to {}:{} failed: {}", host, port, e))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| format!("HTTP handshake failed: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!("probe connection closed: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method(self.method.clone())
            .uri(&self.path)
            .header(hyper::header::HOST, format!("{}:{}", host, port))
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| format!("failed to build request: {}", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        Ok(resp.status())
    }
}

#[async_trait]
impl Probe for HttpCheck {
    fn describe(&self) -> String {
        format!(
            "HTTP {} {} on port {} expecting {}",
            self.method,
            self.path,
            self.port,
            self.expected_status.as_u16()
        )
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

        match tokio::time::timeout(self.request_timeout, self.request(&host, port)).await {
            Ok(Ok(status)) if status == self.expected_status => Ok(Readiness::Ready),
            Ok(Ok(status)) => Ok(Readiness::not_ready(format_args!("status {}", status))),
            Ok(Err(reason)) => Ok(Readiness::NotReady(reason)),
            Err(_) => Ok(Readiness::not_ready("request timed out")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_normalized() {
        let check = HttpCheck::new(8080).with_path("health");
        assert_eq!(check.path, "/health");
        assert_eq!(
            check.describe(),
            "HTTP GET /health on port 8080 expecting 200"
        );
    }
}
