// ABOUTME: Bookkeeping that guarantees started containers are eventually removed.
// ABOUTME: Explicit removal deregisters; an exit hook sweeps whatever is left.

use crate::runtime::{ContainerError, ContainerOps, Runtime};
use crate::types::ContainerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once the global registry holds its first entry.
static EXIT_HOOK_ARMED: AtomicBool = AtomicBool::new(false);

/// Removal outcome shared by every clone of an entry. The lock is held
/// across the engine call, so concurrent reaps see its result.
#[derive(Default)]
struct Removal {
    lock: tokio::sync::Mutex<()>,
    done: AtomicBool,
}

/// What the registry needs to remove one container: its id, the engine it
/// lives on, and the removal state shared with its handle.
#[derive(Clone)]
pub struct CleanupEntry {
    id: ContainerId,
    runtime: Arc<dyn Runtime>,
    removal: Arc<Removal>,
}

impl CleanupEntry {
    pub fn new(id: ContainerId, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            id,
            runtime,
            removal: Arc::default(),
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn is_removed(&self) -> bool {
        self.removal.done.load(Ordering::SeqCst)
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Force-remove the container, stopping it if needed.
    ///
    /// Returns `Ok(true)` for the call that removed the container and
    /// `Ok(false)` once it is already gone. Concurrent callers queue behind
    /// the delete in flight; if that one fails, the next caller tries again.
    /// A container the engine no longer knows counts as removed.
    pub async fn reap(&self) -> Result<bool, ContainerError> {
        self.reap_with(self.runtime.as_ref()).await
    }

    async fn reap_with(&self, runtime: &dyn Runtime) -> Result<bool, ContainerError> {
        let _guard = self.removal.lock.lock().await;
        if self.is_removed() {
            return Ok(false);
        }

        match runtime.remove_container(&self.id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => {
                self.removal.done.store(true, Ordering::SeqCst);
                tracing::debug!(container = %self.id.short(), "container removed");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for CleanupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupEntry")
            .field("id", &self.id)
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// Live containers keyed by handle identity.
pub struct Registry {
    entries: Mutex<HashMap<u64, CleanupEntry>>,
    arms_exit_hook: bool,
}

impl Registry {
    /// A registry swept only by explicit `cleanup()` calls.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            arms_exit_hook: false,
        }
    }

    /// The process-wide registry, swept at exit once it has held anything.
    pub(crate) fn with_exit_hook() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            arms_exit_hook: true,
        }
    }

    pub fn add(&self, key: u64, entry: CleanupEntry) {
        tracing::trace!(key, container = %entry.id.short(), "registering container");
        self.entries.lock().insert(key, entry);
        if self.arms_exit_hook && !EXIT_HOOK_ARMED.swap(true, Ordering::SeqCst) {
            tracing::debug!("exit cleanup armed");
        }
    }

    /// Forget `key`. Absent keys are ignored.
    pub fn remove(&self, key: u64) {
        self.entries.lock().remove(&key);
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.lock().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every registered container, returning how many were removed.
    ///
    /// Entries are drained first, so each is attempted exactly once even if
    /// handles are removed concurrently. Failures are logged and skipped.
    pub async fn cleanup(&self) -> usize {
        let drained: Vec<CleanupEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        let mut removed = 0;
        for entry in drained {
            match entry.reap().await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(container = %entry.id.short(), error = %e, "cleanup failed")
                }
            }
        }
        removed
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.len())
            .field("arms_exit_hook", &self.arms_exit_hook)
            .finish()
    }
}

/// Sweep the global registry when the process exits.
///
/// Runs on a fresh current-thread runtime since the caller's runtime is
/// gone by now. If an entry's own engine client no longer works, a new
/// connection from the environment is tried.
// Only touches this crate's statics and spawns its own runtime, so it does
// not depend on std state torn down before destructors run.
#[ctor::dtor]
unsafe fn cleanup_on_exit() {
    if !EXIT_HOOK_ARMED.load(Ordering::SeqCst) {
        return;
    }
    let Some(context) = crate::context::Context::try_global() else {
        return;
    };
    let registry = context.registry();
    if registry.is_empty() {
        return;
    }

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };

    rt.block_on(async {
        let drained: Vec<CleanupEntry> =
            registry.entries.lock().drain().map(|(_, e)| e).collect();
        let mut fallback = None;
        for entry in drained {
            let Err(e) = entry.reap().await else {
                continue;
            };
            if fallback.is_none() {
                fallback = crate::runtime::connect_from_env().ok();
            }
            let retried = match fallback {
                Some(ref runtime) => entry.reap_with(runtime.as_ref()).await.is_ok(),
                None => false,
            };
            if !retried {
                tracing::warn!(container = %entry.id.short(), error = %e, "exit cleanup failed");
            }
        }
    });
}
