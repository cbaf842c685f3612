//! Safe Rust binding over the Grove engine's C API.
//!
//! This crate wraps the raw entry points exposed by `grove-ffi` into a safe
//! surface: type-safe handles, registry-tracked lifetimes with leak
//! recovery, legacy text conversion with a bounded cache, and façades for
//! the credential and vault operation families.
//!
//! # Architecture
//!
//! - [`session`]: the root [`GroveSession`] tying engine, registry and
//!   cache together
//! - [`handle`] and [`registry`]: type-safe handles and exactly-once
//!   release tracking
//! - [`context`]: execution scopes whose drop sweeps leaked handles
//! - [`lmbcs`] and [`cache`]: legacy text codec and conversion cache
//! - [`record`] and [`layouts`]: fixed-layout native record marshaling
//! - [`api`]: credential and vault operation façades
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use grove_api::{CacheConfig, GroveResult, GroveSession};
//! use grove_ffi::LinkedEngine;
//!
//! fn check() -> GroveResult<()> {
//!     let session = GroveSession::new(Arc::new(LinkedEngine::new()), CacheConfig::default());
//!     let scope = session.context();
//!     session
//!         .id_file_api()
//!         .check_id_password(&scope, "user.id", "secret")
//! }
//! ```

pub mod api;
pub mod cache;
pub mod context;
pub mod error;
pub mod handle;
pub mod layouts;
pub mod lmbcs;
pub mod record;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use api::{IdFileApi, SyncResult, UserId, VaultApi};
pub use cache::{CacheConfig, LmbcsCache};
pub use context::{ContextId, ContextScope};
pub use error::{GroveError, GroveResult, GroveStatus};
pub use handle::{
    DatabaseHandle, DatabaseKind, GroveHandle, HandleClass, HandleKind, IdFileHandle, IdFileKind,
    MemoryHandle, MemoryKind, RawHandle,
};
pub use lmbcs::LmbcsString;
pub use record::{FieldDef, FieldKind, FieldValue, Record, RecordLayout};
pub use registry::{HandleRegistry, HandleToken};
pub use session::GroveSession;
