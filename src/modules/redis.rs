// ABOUTME: Redis preset.
// ABOUTME: Exposes 6379 and waits for the server's ready log line.

use super::{DEFAULT_TAG, Preset, image};
use crate::container::ContainerBuilder;
use crate::wait::WaitStrategy;

pub const REDIS_PORT: u16 = 6379;
const READY_LINE: &str = "Ready to accept connections";

#[derive(Debug, Clone)]
pub struct Redis {
    tag: String,
}

impl Redis {
    pub fn new() -> Self {
        Self::with_tag(DEFAULT_TAG)
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for Redis {
    fn default() -> Self {
        Self::new()
    }
}

impl Preset for Redis {
    fn into_builder(self) -> ContainerBuilder {
        ContainerBuilder::new(image("redis", &self.tag))
            .with_exposed_port(REDIS_PORT)
            .with_wait(WaitStrategy::log(READY_LINE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_spec() {
        let spec = Redis::with_tag("7-alpine").build().unwrap();
        assert_eq!(spec.image().to_string(), "redis:7-alpine");
        assert_eq!(spec.exposed_ports()[0].key(), "6379/tcp");
        assert!(spec.wait().unwrap().describe().contains(READY_LINE));
    }
}
