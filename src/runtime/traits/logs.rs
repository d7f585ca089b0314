// ABOUTME: Log trait for engine bindings.
// ABOUTME: Streams container output and collects snapshots for log matching.

use crate::types::ContainerId;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

#[async_trait]
pub trait LogOps: Send + Sync {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError>;
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    /// Keep the stream open for new output (like `tail -f`).
    pub follow: bool,
    pub timestamps: bool,
    /// Number of lines from the end; `None` means everything.
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Everything written so far on both streams.
    pub fn snapshot() -> Self {
        Self {
            stdout: true,
            stderr: true,
            ..Default::default()
        }
    }

    pub fn follow_all() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        }
    }

    pub fn tail(n: u64) -> Self {
        Self {
            tail: Some(n),
            ..Self::snapshot()
        }
    }
}

/// A chunk of container output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Collect the current stdout and stderr of a container into one string.
///
/// Control characters other than newlines and tabs are dropped, so terminal
/// escapes and stray frame bytes cannot break substring matches.
pub async fn collect_logs<R: LogOps + ?Sized>(
    runtime: &R,
    id: &ContainerId,
) -> Result<String, LogError> {
    let mut stream = runtime.container_logs(id, &LogOptions::snapshot()).await?;
    let mut output = String::new();
    while let Some(line) = stream.next().await {
        output.push_str(&line?.content);
    }
    Ok(strip_control_chars(&output))
}

pub(crate) fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}
