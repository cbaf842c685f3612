//! Raw status codes returned by the native entry points.
//!
//! Every native call returns a 16-bit status where zero means success and
//! any nonzero value is an error code. The symbolic names below cover the
//! codes the binding inspects or produces; everything else is passed
//! through numerically and resolved to text via
//! [`NativeEngine::error_text`](crate::NativeEngine::error_text).

/// 16-bit native status code. Zero is success.
pub type RawStatus = u16;

/// Success.
pub const NO_ERROR: RawStatus = 0;

/// The supplied password does not match the credential file.
pub const ERR_WRONG_PASSWORD: RawStatus = 6408;

/// A required parameter was null or empty.
pub const ERR_BSAFE_NULLPARAM: RawStatus = 6401;

/// The credential file requires a password and none was supplied.
pub const ERR_BSAFE_PASSWORD_REQUIRED: RawStatus = 6402;

/// The new password is shorter than the minimum configured for the id.
pub const ERR_REG_MINPSWDCHARS: RawStatus = 6403;

/// The named object (id file, database, user) was not found.
pub const ERR_NOT_FOUND: RawStatus = 578;

/// No vault could be located for the user.
pub const ERR_NO_SUCH_VAULT: RawStatus = 22792;

/// The handle value is not a live handle of the expected type.
pub const ERR_INVALID_HANDLE: RawStatus = 582;

/// The entry point is not available (stub engine, or an engine build
/// without the feature).
pub const ERR_NOT_SUPPORTED: RawStatus = 500;

/// Returns a static description for the codes the binding knows about.
///
/// This is the fallback when the engine's own error-text lookup is
/// unavailable; [`NativeEngine::error_text`](crate::NativeEngine::error_text)
/// is authoritative when it answers.
pub fn static_error_text(code: RawStatus) -> Option<&'static str> {
    match code {
        NO_ERROR => Some("success"),
        ERR_WRONG_PASSWORD => Some("wrong password"),
        ERR_BSAFE_NULLPARAM => Some("required parameter was null"),
        ERR_BSAFE_PASSWORD_REQUIRED => Some("password required"),
        ERR_REG_MINPSWDCHARS => Some("password shorter than required minimum"),
        ERR_NOT_FOUND => Some("not found"),
        ERR_NO_SUCH_VAULT => Some("no vault found for user"),
        ERR_INVALID_HANDLE => Some("invalid handle"),
        ERR_NOT_SUPPORTED => Some("entry point not available"),
        _ => None,
    }
}
