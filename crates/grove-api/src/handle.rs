//! Type-safe opaque handle wrappers.
//!
//! Native handles are plain integers identifying engine-side resources.
//! This module wraps them in phantom-typed values so a database handle can
//! never be passed where a credential handle is expected, and tags each
//! kind with the close operation the registry must use to release it.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

pub use grove_ffi::RawHandle;

/// The native close operation matching a handle's acquisition call.
///
/// A handle must be released through the same family it was acquired from;
/// closing a database handle through the credential path is undefined
/// behavior in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleClass {
    /// Closed via `db_close`.
    Database,
    /// Closed via `kfm_close`.
    IdFile,
    /// Freed via `mem_free`.
    Memory,
}

impl fmt::Display for HandleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleClass::Database => "database",
            HandleClass::IdFile => "id-file",
            HandleClass::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

/// Marker trait for handle kinds.
pub trait HandleKind: Send + Sync + 'static {
    /// Kind name for debugging.
    fn kind_name() -> &'static str;

    /// The close operation for this kind.
    fn class() -> HandleClass;
}

/// A type-safe native handle.
///
/// The phantom parameter `K` records what engine resource the value refers
/// to. The wrapper is `Copy`; it carries no ownership by itself. Lifetime
/// is tracked by the [`HandleRegistry`](crate::registry::HandleRegistry),
/// which issues a token per registered handle.
#[derive(Clone, Copy)]
pub struct GroveHandle<K: HandleKind> {
    raw: RawHandle,
    _marker: PhantomData<K>,
}

impl<K: HandleKind> GroveHandle<K> {
    /// The null handle.
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Creates a handle from a raw value. Returns `None` for 0.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> RawHandle {
        self.raw
    }

    /// Returns true if this is the null handle.
    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }
}

impl<K: HandleKind> fmt::Debug for GroveHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:x})", K::kind_name(), self.raw)
    }
}

impl<K: HandleKind> fmt::Display for GroveHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.raw)
    }
}

impl<K: HandleKind> PartialEq for GroveHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: HandleKind> Eq for GroveHandle<K> {}

impl<K: HandleKind> Hash for GroveHandle<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_handle_kind {
    ($kind:ident, $name:literal, $class:expr, $alias:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;

        impl HandleKind for $kind {
            fn kind_name() -> &'static str {
                $name
            }

            fn class() -> HandleClass {
                $class
            }
        }

        pub type $alias = GroveHandle<$kind>;
    };
}

define_handle_kind!(DatabaseKind, "Database", HandleClass::Database, DatabaseHandle);
define_handle_kind!(IdFileKind, "IdFile", HandleClass::IdFile, IdFileHandle);
define_handle_kind!(MemoryKind, "Memory", HandleClass::Memory, MemoryHandle);
