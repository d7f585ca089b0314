// ABOUTME: Engine health check section of a spec file.
// ABOUTME: A shell command and how often the engine runs it.

use crate::container::DEFAULT_HEALTHCHECK_INTERVAL;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthcheckFile {
    pub cmd: String,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

fn default_interval() -> Duration {
    DEFAULT_HEALTHCHECK_INTERVAL
}
