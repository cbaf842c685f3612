//! Execution contexts.
//!
//! Every handle is acquired under a context, the thread or task that owns
//! it. The registry attributes handles to contexts so that when a context
//! ends, anything still open can be swept up. A handle acquired in one
//! context must not be used from another without an explicit hand-off
//! (re-registering it under the new context).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::registry::HandleRegistry;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a fresh context id. Ids are process-unique and never
    /// reused.
    pub(crate) fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Scope guard for an execution context.
///
/// Dropping the scope runs the registry's leak-recovery sweep: every handle
/// still registered to this context is closed and logged as a leak. This is
/// a safety net; well-behaved callers release explicitly before the scope
/// ends.
///
/// Native calls are not preemptible, so a caller-imposed timeout can only
/// be enforced by abandoning the scope and letting the sweep reclaim its
/// handles once the blocked call returns. That is lossy cancellation, not
/// cooperative cancellation.
pub struct ContextScope {
    id: ContextId,
    registry: Arc<HandleRegistry>,
}

impl ContextScope {
    pub(crate) fn new(registry: Arc<HandleRegistry>) -> Self {
        Self {
            id: ContextId::next(),
            registry,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Number of handles currently live under this context.
    pub fn live_handles(&self) -> usize {
        self.registry.live_count(self.id)
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.registry.release_all(self.id);
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope").field("id", &self.id).finish()
    }
}
