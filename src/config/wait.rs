// ABOUTME: Wait section of a spec file and its conversion to a WaitStrategy.
// ABOUTME: Exactly one readiness kind may be named; timings apply to whichever is chosen.

use crate::error::{Error, Result};
use crate::wait::{ExecCheck, HttpCheck, TcpPortOpen, WaitStrategy};
use hyper::{Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitFile {
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub exec: Option<Vec<String>>,
    #[serde(default)]
    pub http: Option<HttpWaitFile>,
    #[serde(default)]
    pub tcp: Option<TcpWaitFile>,
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub none: bool,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpWaitFile {
    pub port: u16,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    /// Probe the host's mapped port instead of the container address.
    #[serde(default)]
    pub mapped: bool,
}

/// `tcp: 6379` or `tcp: { port: 6379, mapped: true }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TcpWaitFile {
    Port(u16),
    Detailed {
        port: u16,
        #[serde(default)]
        mapped: bool,
    },
}

impl WaitFile {
    fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.log.is_some() {
            kinds.push("log");
        }
        if self.regex.is_some() {
            kinds.push("regex");
        }
        if self.exec.is_some() {
            kinds.push("exec");
        }
        if self.http.is_some() {
            kinds.push("http");
        }
        if self.tcp.is_some() {
            kinds.push("tcp");
        }
        if self.healthy {
            kinds.push("healthy");
        }
        if self.running {
            kinds.push("running");
        }
        if self.none {
            kinds.push("none");
        }
        kinds
    }

    /// The strategy this section describes. Naming no kind means the
    /// default running check, with any timings given.
    pub fn to_strategy(&self) -> Result<WaitStrategy> {
        let kinds = self.kinds();
        if kinds.len() > 1 {
            return Err(Error::InvalidSpec(format!(
                "wait: only one kind may be set, found {}",
                kinds.join(", ")
            )));
        }

        let mut strategy = if let Some(message) = &self.log {
            WaitStrategy::log(message.clone())
        } else if let Some(pattern) = &self.regex {
            WaitStrategy::log_regex(pattern)
                .map_err(|e| Error::InvalidSpec(format!("wait.regex: {}", e)))?
        } else if let Some(cmd) = &self.exec {
            if cmd.is_empty() {
                return Err(Error::InvalidSpec("wait.exec: command is empty".to_string()));
            }
            WaitStrategy::new(ExecCheck::new(cmd.iter().cloned()))
        } else if let Some(http) = &self.http {
            WaitStrategy::new(http.to_check()?)
        } else if let Some(tcp) = &self.tcp {
            WaitStrategy::new(tcp.to_check())
        } else if self.healthy {
            WaitStrategy::healthy()
        } else if self.none {
            WaitStrategy::none()
        } else {
            WaitStrategy::running()
        };

        if let Some(timeout) = self.timeout {
            strategy = strategy.with_timeout(timeout);
        }
        if let Some(interval) = self.poll_interval {
            if interval.is_zero() {
                return Err(Error::InvalidSpec(
                    "wait.poll_interval: must be greater than zero".to_string(),
                ));
            }
            strategy = strategy.with_poll_interval(interval);
        }
        Ok(strategy)
    }
}

impl HttpWaitFile {
    fn to_check(&self) -> Result<HttpCheck> {
        let mut check = HttpCheck::new(self.port);
        if let Some(path) = &self.path {
            check = check.with_path(path.clone());
        }
        if let Some(method) = &self.method {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| Error::InvalidSpec(format!("wait.http.method: '{}'", method)))?;
            check = check.with_method(method);
        }
        if let Some(status) = self.status {
            let status = StatusCode::from_u16(status)
                .map_err(|_| Error::InvalidSpec(format!("wait.http.status: {}", status)))?;
            check = check.with_expected_status(status);
        }
        if self.mapped {
            check = check.using_mapped_port();
        }
        Ok(check)
    }
}

impl TcpWaitFile {
    fn to_check(&self) -> TcpPortOpen {
        match *self {
            TcpWaitFile::Port(port) => TcpPortOpen::new(port),
            TcpWaitFile::Detailed { port, mapped } => {
                let check = TcpPortOpen::new(port);
                if mapped { check.using_mapped_port() } else { check }
            }
        }
    }
}
