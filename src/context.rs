// ABOUTME: Shared state for starting containers: registry, assigned ports, host.
// ABOUTME: One lazily created global context plus any number of isolated ones.

use crate::ports::AssignedPorts;
use crate::registry::Registry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Host handles report for mapped ports.
pub const ENV_HOST: &str = "CAIRN_HOST";
pub const DEFAULT_HOST: &str = "127.0.0.1";

static GLOBAL: OnceLock<Arc<Context>> = OnceLock::new();

/// Owner of the cleanup registry and the set of host ports handed out.
///
/// Most callers use [`Context::global`]. Tests that want isolated port
/// bookkeeping and an explicit sweep create their own with [`Context::new`]
/// and call [`Context::cleanup`] when done.
#[derive(Debug)]
pub struct Context {
    registry: Registry,
    assigned_ports: AssignedPorts,
    host: String,
    next_key: AtomicU64,
}

impl Context {
    pub fn new() -> Self {
        Self::build(Registry::new())
    }

    fn build(registry: Registry) -> Self {
        Self {
            registry,
            assigned_ports: AssignedPorts::new(),
            host: DEFAULT_HOST.to_string(),
            next_key: AtomicU64::new(1),
        }
    }

    /// The process-wide context. Its containers are removed at exit.
    pub fn global() -> Arc<Context> {
        GLOBAL
            .get_or_init(|| {
                let host = std::env::var(ENV_HOST)
                    .ok()
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| DEFAULT_HOST.to_string());
                Arc::new(Self::build(Registry::with_exit_hook()).with_host(host))
            })
            .clone()
    }

    pub(crate) fn try_global() -> Option<&'static Arc<Context>> {
        GLOBAL.get()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn assigned_ports(&self) -> &AssignedPorts {
        &self.assigned_ports
    }

    /// A key unique among this context's handles.
    pub(crate) fn next_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove every container still registered here.
    pub async fn cleanup(&self) -> usize {
        self.registry.cleanup().await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
