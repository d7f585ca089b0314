// ABOUTME: Launch state markers for the type state pattern.
// ABOUTME: States past creation carry the container id they apply to.

use crate::types::ContainerId;

/// Nothing created yet.
/// Available actions: `create()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Container exists but is not running.
/// Available actions: `start()`, `discard()`
#[derive(Debug, Clone)]
pub struct Created {
    pub(crate) id: ContainerId,
}

/// Container is running; readiness is not yet known.
/// Available actions: `into_id()`, `discard()`
#[derive(Debug, Clone)]
pub struct Started {
    pub(crate) id: ContainerId,
}
