// ABOUTME: A strategy that does not wait at all.
// ABOUTME: Used when the caller checks readiness on its own.

use super::{Probe, Readiness, WaitError};
use crate::container::StartedContainer;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoWait;

#[async_trait]
impl Probe for NoWait {
    fn describe(&self) -> String {
        "no wait".to_string()
    }

    async fn probe(&self, _container: &StartedContainer) -> Result<Readiness, WaitError> {
        Ok(Readiness::Ready)
    }
}
