// ABOUTME: Waits until a command run inside the container succeeds.
// ABOUTME: Success is exit code 0 unless a predicate over code and output decides.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Decides readiness from an exit code and the combined stdout and stderr.
pub type ExecPredicate = Arc<dyn Fn(i64, &str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ExecCheck {
    cmd: Vec<String>,
    predicate: Option<ExecPredicate>,
}

impl ExecCheck {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            predicate: None,
        }
    }

    /// Replace the default exit-code check.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(i64, &str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    fn accepts(&self, exit_code: i64, output: &str) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(exit_code, output),
            None => exit_code == 0,
        }
    }
}

impl fmt::Debug for ExecCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecCheck")
            .field("cmd", &self.cmd)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[async_trait]
impl Probe for ExecCheck {
    fn describe(&self) -> String {
        format!("exec {:?}", self.cmd.join(" "))
    }

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError> {
        match container.exec(self.cmd.iter().cloned()).await {
            Ok(result) if self.accepts(result.exit_code, &result.output()) => Ok(Readiness::Ready),
            Ok(result) => Ok(Readiness::not_ready(format_args!(
                "command exited with {}",
                result.exit_code
            ))),
            Err(e) => Ok(Readiness::not_ready(format_args!("exec failed: {}", e))),
        }
    }
}
