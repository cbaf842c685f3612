//! High-level operation façades.
//!
//! Each façade wraps a family of native entry points into safe methods:
//! encode parameters, call, check status, decode out-buffers, and release
//! every transient handle through the registry. A façade method never
//! returns with a handle it acquired still live: on error paths the
//! release runs before the error surfaces, and on panic the guard's drop
//! closes the handle during unwind.

mod idfile;
mod vault;

pub use idfile::IdFileApi;
pub use vault::{SyncResult, UserId, VaultApi};

use crate::error::GroveResult;
use crate::registry::{HandleRegistry, HandleToken};

/// Releases a registered handle on drop unless consumed by
/// [`release`](TokenGuard::release) first. Drop swallows the close status
/// (it runs during unwind); the normal path calls `release` so close
/// failures stay observable.
struct TokenGuard<'a> {
    registry: &'a HandleRegistry,
    token: Option<HandleToken>,
}

impl<'a> TokenGuard<'a> {
    fn new(registry: &'a HandleRegistry, token: HandleToken) -> Self {
        Self {
            registry,
            token: Some(token),
        }
    }

    fn release(mut self) -> GroveResult<()> {
        match self.token.take() {
            Some(token) => self.registry.release(token),
            None => Ok(()),
        }
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.registry.release(token) {
                log::warn!("handle release during unwind failed: {err}");
            }
        }
    }
}

/// Combines an operation body's result with its handle-release result.
///
/// The body's error wins: a close failure after an already-failed call is
/// logged, not returned, so the caller sees the cause rather than the
/// cleanup symptom. A close failure after a successful body does surface.
fn finish<T>(body: GroveResult<T>, release: GroveResult<()>) -> GroveResult<T> {
    match (body, release) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            log::warn!("handle release failed after an earlier error: {close_err}");
            Err(err)
        }
    }
}
