//! Error types and status handling.
//!
//! This module converts raw native status codes into Rust's Result type and
//! defines the error taxonomy of the binding. Native failures and malformed
//! records always surface to the immediate caller; registry misuse
//! (double release, unknown token) is a caller bug and is never silently
//! swallowed.

use std::fmt;

use grove_ffi::status::{static_error_text, NO_ERROR};
use grove_ffi::{NativeEngine, RawStatus};
use thiserror::Error;

/// A native status code paired with success/error interpretation.
///
/// Zero means success; any nonzero value is an engine error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroveStatus(RawStatus);

impl GroveStatus {
    pub const SUCCESS: Self = GroveStatus(NO_ERROR);

    pub const fn from_raw(code: RawStatus) -> Self {
        GroveStatus(code)
    }

    pub const fn as_raw(&self) -> RawStatus {
        self.0
    }

    pub const fn is_success(&self) -> bool {
        self.0 == NO_ERROR
    }

    pub const fn is_error(&self) -> bool {
        self.0 != NO_ERROR
    }

    /// Converts to a Result without message resolution.
    pub fn into_result(self) -> GroveResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(GroveError::NativeCallFailed {
                code: self.0,
                message: static_error_text(self.0).map(str::to_owned),
            })
        }
    }

    /// Converts to a Result, resolving the error message through the
    /// engine's own error-text lookup.
    pub fn check(self, engine: &dyn NativeEngine) -> GroveResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(GroveError::NativeCallFailed {
                code: self.0,
                message: engine.error_text(self.0),
            })
        }
    }
}

impl fmt::Display for GroveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match static_error_text(self.0) {
            Some(text) => write!(f, "{} ({})", self.0, text),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Error type for binding operations.
#[derive(Debug, Clone, Error)]
pub enum GroveError {
    /// A native entry point returned a nonzero status.
    #[error("native call failed with status {code}{}", fmt_message(.message))]
    NativeCallFailed {
        code: RawStatus,
        message: Option<String>,
    },

    /// A byte buffer was shorter than its declared record layout.
    #[error("malformed {layout} record: expected {expected} bytes, got {actual}")]
    MalformedRecord {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An encoded value exceeds a native-imposed maximum length.
    #[error("{what} exceeds native limit: {actual} bytes (max {max})")]
    LimitExceeded {
        what: &'static str,
        max: usize,
        actual: usize,
    },

    /// A handle token was released twice. Always a caller lifetime bug.
    #[error("handle token {token} released twice")]
    DoubleRelease { token: u64 },

    /// A raw handle was registered a second time in a context where it is
    /// still live. Always a caller lifetime bug: two tokens for one
    /// acquisition would mean two native close calls.
    #[error("handle 0x{raw:x} is already registered in this context")]
    AlreadyRegistered { raw: u64 },

    /// A handle token was never issued by the registry. Always a caller
    /// lifetime bug.
    #[error("unknown handle token {token}")]
    UnknownHandle { token: u64 },

    /// Invalid parameter passed to a binding operation.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },
}

impl GroveError {
    /// Creates a native failure from a raw code with engine-resolved text.
    pub fn native(engine: &dyn NativeEngine, code: RawStatus) -> Self {
        GroveError::NativeCallFailed {
            code,
            message: engine.error_text(code),
        }
    }

    /// Creates an invalid parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        GroveError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Returns the raw status code if this is a native failure.
    pub fn status(&self) -> Option<RawStatus> {
        match self {
            GroveError::NativeCallFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for registry misuse errors, which indicate a lifetime bug in
    /// the caller rather than an engine condition.
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            GroveError::DoubleRelease { .. }
                | GroveError::UnknownHandle { .. }
                | GroveError::AlreadyRegistered { .. }
        )
    }
}

fn fmt_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

/// Result type for binding operations.
pub type GroveResult<T> = Result<T, GroveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use grove_ffi::status::{ERR_NOT_FOUND, ERR_WRONG_PASSWORD};
    use grove_ffi::MockEngine;

    #[test]
    fn test_status_success() {
        assert!(GroveStatus::SUCCESS.is_success());
        assert!(!GroveStatus::SUCCESS.is_error());
        assert!(GroveStatus::SUCCESS.into_result().is_ok());
    }

    #[test]
    fn test_status_error_carries_code() {
        let err = GroveStatus::from_raw(ERR_NOT_FOUND).into_result().unwrap_err();
        assert_eq!(err.status(), Some(ERR_NOT_FOUND));
    }

    #[test]
    fn test_check_resolves_message_through_engine() {
        let engine = MockEngine::new();
        let err = GroveStatus::from_raw(ERR_WRONG_PASSWORD)
            .check(&engine)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("6408"), "{text}");
        assert!(text.contains("wrong password"), "{text}");
    }

    #[test]
    fn test_caller_bug_classification() {
        assert!(GroveError::DoubleRelease { token: 1 }.is_caller_bug());
        assert!(GroveError::UnknownHandle { token: 1 }.is_caller_bug());
        assert!(GroveError::AlreadyRegistered { raw: 0x1001 }.is_caller_bug());
        assert!(!GroveError::invalid_parameter("x").is_caller_bug());
    }
}
