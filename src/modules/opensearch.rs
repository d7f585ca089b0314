// ABOUTME: OpenSearch single-node preset.
// ABOUTME: Waits up to 30s for the node's started log line; security can be disabled.

use super::{DEFAULT_TAG, Preset, image};
use crate::container::ContainerBuilder;
use crate::wait::{LogMatch, WaitStrategy};
use std::time::Duration;

pub const OPENSEARCH_PORT: u16 = 9200;
pub const OPENSEARCH_ADMIN_PASSWORD: &str = "c3o_ZPHo!";
const STARTED_PATTERN: &str = r"\]\s+started";
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OpenSearch {
    tag: String,
    security_disabled: bool,
}

impl OpenSearch {
    pub fn new() -> Self {
        Self::with_tag(DEFAULT_TAG)
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            security_disabled: false,
        }
    }

    /// Serve plain HTTP without authentication.
    pub fn with_disabled_security_plugin(mut self) -> Self {
        self.security_disabled = true;
        self
    }
}

impl Default for OpenSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Preset for OpenSearch {
    fn into_builder(self) -> ContainerBuilder {
        let started = LogMatch::from_regex(started_regex());
        let mut builder = ContainerBuilder::new(image("opensearchproject/opensearch", &self.tag))
            .with_exposed_port(OPENSEARCH_PORT)
            .with_env("discovery.type", "single-node")
            .with_env("OPENSEARCH_INITIAL_ADMIN_PASSWORD", OPENSEARCH_ADMIN_PASSWORD)
            .with_wait(WaitStrategy::new(started).with_timeout(STARTUP_TIMEOUT));
        if self.security_disabled {
            builder = builder.with_env("plugins.security.disabled", "true");
        }
        builder
    }
}

fn started_regex() -> regex::Regex {
    // Constant pattern; covered by the tests below.
    regex::Regex::new(STARTED_PATTERN).expect("valid started pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opensearch_defaults() {
        let spec = OpenSearch::new().build().unwrap();
        assert_eq!(spec.image().repository(), "opensearchproject/opensearch");
        assert_eq!(spec.env()["discovery.type"], "single-node");
        assert!(!spec.env().contains_key("plugins.security.disabled"));
        assert_eq!(spec.wait().unwrap().timeout(), STARTUP_TIMEOUT);
    }

    #[test]
    fn started_pattern_matches_node_log() {
        let line = "[2024-05-01T10:00:00,000][INFO ][o.o.n.Node] [node-1]   started";
        assert!(started_regex().is_match(line));
        assert!(!started_regex().is_match("[node-1] starting ..."));
    }

    #[test]
    fn security_can_be_disabled() {
        let spec = OpenSearch::new()
            .with_disabled_security_plugin()
            .build()
            .unwrap();
        assert_eq!(spec.env()["plugins.security.disabled"], "true");
    }
}
