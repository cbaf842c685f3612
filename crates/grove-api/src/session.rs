//! Binding session: the root object tying the engine, the handle registry,
//! and the conversion cache together.

use std::sync::Arc;

use grove_ffi::NativeEngine;

use crate::api::{IdFileApi, VaultApi};
use crate::cache::{CacheConfig, LmbcsCache};
use crate::context::ContextScope;
use crate::registry::HandleRegistry;

/// A configured binding over one native engine.
///
/// The session owns the handle registry and the conversion cache; the cache
/// is shared by every context opened from this session and isolated from
/// any other session. Construct one session per process for a shared cache,
/// or one per context for isolated caches; the scope is decided here at
/// construction, not by a global switch.
pub struct GroveSession {
    engine: Arc<dyn NativeEngine>,
    registry: Arc<HandleRegistry>,
    cache: LmbcsCache,
}

impl GroveSession {
    pub fn new(engine: Arc<dyn NativeEngine>, cache_config: CacheConfig) -> Self {
        let registry = Arc::new(HandleRegistry::new(Arc::clone(&engine)));
        Self {
            engine,
            registry,
            cache: LmbcsCache::new(cache_config),
        }
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &LmbcsCache {
        &self.cache
    }

    /// Opens an execution context. All handles acquired through façade
    /// operations under this scope are swept when it drops.
    pub fn context(&self) -> ContextScope {
        self.registry.begin_context()
    }

    /// Credential-file operations.
    pub fn id_file_api(&self) -> IdFileApi<'_> {
        IdFileApi::new(self)
    }

    /// Id-vault operations.
    pub fn vault_api(&self) -> VaultApi<'_> {
        VaultApi::new(self)
    }
}

impl std::fmt::Debug for GroveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroveSession")
            .field("live_handles", &self.registry.total_live())
            .field("cache", &self.cache)
            .finish()
    }
}
