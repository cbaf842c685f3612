//! Raw FFI surface for the Grove groupware engine C API.
//!
//! This crate holds the unsafe half of the binding:
//!
//! - [`consts`]: native limits and flag words
//! - [`status`]: raw 16-bit status codes
//! - [`NativeEngine`]: trait modeling the C entry points 1:1
//! - [`LinkedEngine`]: implementation over `extern "C"` declarations
//!   (feature `native-link`), with logging stubs otherwise
//! - [`MockEngine`]: in-memory engine for tests (feature `mock-engine`)
//!
//! The safe wrappers, handle lifetime tracking, and text conversion live in
//! the `grove-api` crate; nothing here should be called directly by
//! application code.

pub mod consts;
mod engine;
mod linked;
#[cfg(any(test, feature = "mock-engine"))]
mod mock;
pub mod status;

pub use engine::{NativeEngine, RawHandle};
pub use linked::LinkedEngine;
#[cfg(any(test, feature = "mock-engine"))]
pub use mock::MockEngine;
pub use status::RawStatus;
