// ABOUTME: Exposed port tokens in the engines' `port/protocol` notation.
// ABOUTME: Bare port numbers normalize to tcp.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsePortError {
    #[error("invalid port number: {0}")]
    InvalidNumber(String),

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

/// Transport protocol of an exposed port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InternetProtocol {
    #[default]
    Tcp,
    Udp,
}

impl InternetProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternetProtocol::Tcp => "tcp",
            InternetProtocol::Udp => "udp",
        }
    }
}

impl FromStr for InternetProtocol {
    type Err = ParsePortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(InternetProtocol::Tcp),
            "udp" => Ok(InternetProtocol::Udp),
            _ => Err(ParsePortError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for InternetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container-side port, e.g. `6379/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: InternetProtocol,
}

impl ExposedPort {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: InternetProtocol::Tcp,
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: InternetProtocol::Udp,
        }
    }

    /// Parse `8080`, `8080/tcp` or `53/udp`.
    pub fn parse(input: &str) -> Result<Self, ParsePortError> {
        let input = input.trim();
        let (number, protocol) = match input.split_once('/') {
            Some((number, protocol)) => (number, protocol.parse()?),
            None => (input, InternetProtocol::Tcp),
        };

        let port = number
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ParsePortError::InvalidNumber(number.to_string()))?;

        Ok(Self { port, protocol })
    }

    /// The key used by the engines' port binding tables.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl From<u16> for ExposedPort {
    fn from(port: u16) -> Self {
        Self::tcp(port)
    }
}

impl FromStr for ExposedPort {
    type Err = ParsePortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

impl<'de> Deserialize<'de> for ExposedPort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u16),
            Token(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(port) => Ok(Self::tcp(port)),
            Raw::Token(token) => Self::parse(&token).map_err(serde::de::Error::custom),
        }
    }
}
