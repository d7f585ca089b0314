// ABOUTME: Waits for a message to show up in the container's output.
// ABOUTME: Plain substring or regular expression over stdout and stderr.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use async_trait::async_trait;
use regex::Regex;

#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Pattern(Regex),
}

/// Ready once the accumulated logs contain a message.
///
/// Logs are re-read in full on every poll, so a message printed before the
/// wait began still counts.
#[derive(Debug, Clone)]
pub struct LogMatch {
    matcher: Matcher,
}

impl LogMatch {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Substring(message.into()),
        }
    }

    /// Match with a regular expression. The pattern is compiled here, so a
    /// bad pattern fails before any container is started.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: Matcher::Pattern(Regex::new(pattern)?),
        })
    }

    /// Match with an already compiled expression.
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            matcher: Matcher::Pattern(regex),
        }
    }

    fn matches(&self, logs: &str) -> bool {
        match &self.matcher {
            Matcher::Substring(message) => logs.contains(message.as_str()),
            Matcher::Pattern(regex) => regex.is_match(logs),
        }
    }
}

#[async_trait]
impl Probe for LogMatch {
    fn describe(&self) -> String {
        match &self.matcher {
            Matcher::Substring(message) => format!("log message {:?}", message),
            Matcher::Pattern(regex) => format!("log pattern /{}/", regex.as_str()),
        }
    }

    async fn probe(&self, container: &StartedContainer) -> Result<Readiness, WaitError> {
        match container.logs().await {
            Ok(logs) if self.matches(&logs) => Ok(Readiness::Ready),
            Ok(_) => Ok(Readiness::not_ready("message not in logs yet")),
            Err(e) => Ok(Readiness::not_ready(format_args!("log fetch failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_matches_anywhere() {
        let probe = LogMatch::new("Ready to accept connections");
        assert!(probe.matches("1:M 01 Jan * Ready to accept connections tcp\n"));
        assert!(!probe.matches("1:M 01 Jan * Server initialized\n"));
    }

    #[test]
    fn regex_matches_across_lines() {
        let probe = LogMatch::regex(r"\]\s+started").unwrap();
        assert!(probe.matches("[2024-01-01][INFO ][o.o.n.Node] [node-1] started\n"));
        assert!(!probe.matches("[node-1] starting ...\n"));
    }

    #[test]
    fn invalid_pattern_is_rejected_up_front() {
        assert!(LogMatch::regex("(unclosed").is_err());
    }
}
