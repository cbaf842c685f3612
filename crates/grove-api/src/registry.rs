//! Native handle registry.
//!
//! The registry tracks every native handle the binding has acquired and
//! guarantees two properties: no handle leaks (anything still registered
//! when its context ends is closed by the sweep) and no double release
//! (each handle's close call runs exactly once, even when an explicit
//! `release` races the end-of-context sweep).
//!
//! Lifecycle per handle: registered on a successful acquisition call,
//! released exactly once, either explicitly by token or by
//! [`release_all`](HandleRegistry::release_all). Releasing a token twice,
//! releasing a token that was never issued, or registering a raw handle
//! that is already live in its context is a caller lifetime bug and is
//! reported as an error, never ignored.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use grove_ffi::status::NO_ERROR;
use grove_ffi::{NativeEngine, RawHandle, RawStatus};

use crate::context::{ContextId, ContextScope};
use crate::error::{GroveError, GroveResult, GroveStatus};
use crate::handle::HandleClass;

/// Token identifying one registered handle. Issued by
/// [`HandleRegistry::register`]; tokens are process-unique and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleToken(u64);

impl HandleToken {
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

struct RegisteredHandle {
    context: ContextId,
    raw: RawHandle,
    class: HandleClass,
    close_flags: u32,
    // One-shot release guard. The CAS winner performs the native close;
    // everyone else sees a double release.
    released: AtomicBool,
}

/// Registry of live native handles.
pub struct HandleRegistry {
    engine: Arc<dyn NativeEngine>,
    next_token: AtomicU64,
    entries: DashMap<u64, RegisteredHandle>,
}

impl HandleRegistry {
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            engine,
            next_token: AtomicU64::new(1),
            entries: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Opens a new execution context attributed to this registry. Dropping
    /// the returned scope sweeps any handles still registered to it.
    pub fn begin_context(self: &Arc<Self>) -> ContextScope {
        ContextScope::new(Arc::clone(self))
    }

    /// Registers a handle acquired under `context`. The registry takes
    /// over release responsibility: exactly one matching close call will
    /// run, chosen by `class`.
    ///
    /// Registering a raw handle that is already live in the same context
    /// is reported as [`GroveError::AlreadyRegistered`]: a second token
    /// for one acquisition would turn into a second native close against
    /// a retired, possibly reused handle value.
    pub fn register(
        &self,
        context: ContextId,
        raw: RawHandle,
        class: HandleClass,
    ) -> GroveResult<HandleToken> {
        self.register_with_flags(context, raw, class, 0)
    }

    /// Like [`register`](Self::register), but the close call will pass
    /// `close_flags` (e.g. write-id-file-on-close for credential handles
    /// refreshed by a vault operation).
    pub fn register_with_flags(
        &self,
        context: ContextId,
        raw: RawHandle,
        class: HandleClass,
        close_flags: u32,
    ) -> GroveResult<HandleToken> {
        let duplicate = self.entries.iter().any(|e| {
            let entry = e.value();
            entry.context == context
                && entry.raw == raw
                && entry.class == class
                && !entry.released.load(Ordering::Acquire)
        });
        if duplicate {
            return Err(GroveError::AlreadyRegistered { raw });
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            token,
            RegisteredHandle {
                context,
                raw,
                class,
                close_flags,
                released: AtomicBool::new(false),
            },
        );
        log::debug!("registered {class} handle 0x{raw:x} under {context} (token {token})");
        Ok(HandleToken(token))
    }

    /// Releases a registered handle, invoking its matching native close
    /// exactly once.
    ///
    /// Errors: [`GroveError::UnknownHandle`] for a token never issued,
    /// [`GroveError::DoubleRelease`] for a token already released,
    /// [`GroveError::NativeCallFailed`] if the close call itself fails (the
    /// handle is considered retired either way; the engine frees the slot
    /// even when the close reports an error).
    pub fn release(&self, token: HandleToken) -> GroveResult<()> {
        let status = {
            let entry = self
                .entries
                .get(&token.0)
                .ok_or(GroveError::UnknownHandle { token: token.0 })?;
            if entry.released.swap(true, Ordering::AcqRel) {
                return Err(GroveError::DoubleRelease { token: token.0 });
            }
            self.close(&entry)
        };
        GroveStatus::from_raw(status).check(self.engine.as_ref())
    }

    /// Releases every handle still registered under `context`, in
    /// unspecified order, and purges the context's entries. Returns the
    /// number of handles recovered.
    ///
    /// This is the safety net behind [`ContextScope`]'s drop. Each handle
    /// recovered here was leaked by the primary (explicit) release path and
    /// is logged as such; close failures during the sweep are logged and do
    /// not stop it. The per-handle one-shot guard makes the sweep safe
    /// against an in-flight explicit release of the same handle.
    pub fn release_all(&self, context: ContextId) -> usize {
        let tokens: Vec<u64> = self
            .entries
            .iter()
            .filter(|e| e.value().context == context)
            .map(|e| *e.key())
            .collect();

        let mut recovered = 0;
        for token in &tokens {
            if let Some(entry) = self.entries.get(token) {
                if entry.released.swap(true, Ordering::AcqRel) {
                    continue;
                }
                log::warn!(
                    "leak recovered: {} handle 0x{:x} still open at end of {} (token {token})",
                    entry.class,
                    entry.raw,
                    context,
                );
                let status = self.close(&entry);
                if status != NO_ERROR {
                    log::error!(
                        "close of leaked {} handle 0x{:x} failed with status {status}",
                        entry.class,
                        entry.raw,
                    );
                }
                recovered += 1;
            }
        }
        for token in tokens {
            self.entries.remove(&token);
        }
        recovered
    }

    /// Number of handles currently live (registered, not yet released)
    /// under `context`.
    pub fn live_count(&self, context: ContextId) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().context == context && !e.value().released.load(Ordering::Acquire))
            .count()
    }

    /// Total live handles across all contexts.
    pub fn total_live(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.value().released.load(Ordering::Acquire))
            .count()
    }

    fn close(&self, entry: &RegisteredHandle) -> RawStatus {
        match entry.class {
            HandleClass::Database => self.engine.db_close(entry.raw),
            HandleClass::IdFile => self.engine.kfm_close(entry.raw, entry.close_flags),
            HandleClass::Memory => self.engine.mem_free(entry.raw),
        }
    }
}
