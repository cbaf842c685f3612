//! The native entry-point seam.
//!
//! [`NativeEngine`] models the Grove C entry points one method per native
//! function, preserving their calling convention: synchronous, possibly
//! blocking on native I/O, returning a 16-bit status with results written
//! through out-parameters. String parameters are LMBCS-encoded and
//! null-terminated by the caller; out-buffers are filled null-terminated by
//! the engine.
//!
//! Putting a trait at this seam keeps the safe layer testable without the
//! proprietary client libraries installed: production code links
//! [`LinkedEngine`](crate::LinkedEngine), tests use
//! [`MockEngine`](crate::MockEngine).

use crate::status::RawStatus;

/// Opaque native handle value.
///
/// This is an identifier, not a pointer; it must never be dereferenced.
/// 32-bit engine builds zero-extend their handles into this type.
pub type RawHandle = u64;

/// One method per native entry point.
///
/// All methods may block for the duration of the underlying native
/// operation (disk or network I/O). None of them are reentrant for the
/// same handle; the safe layer serializes per-handle use within a context.
pub trait NativeEngine: Send + Sync {
    /// Opens a credential (id) file. On success writes the new handle to
    /// `out_handle`.
    fn kfm_open(
        &self,
        id_path: &[u8],
        password: &[u8],
        flags: u32,
        out_handle: &mut RawHandle,
    ) -> RawStatus;

    /// Closes a credential handle previously returned by [`Self::kfm_open`]
    /// or an in-memory vault download.
    fn kfm_close(&self, handle: RawHandle, flags: u32) -> RawStatus;

    /// Changes the password of an id file on disk.
    fn kfm_change_password(&self, id_path: &[u8], old: &[u8], new: &[u8]) -> RawStatus;

    /// Writes the active user name, null-terminated, into `out_username`.
    fn kfm_get_username(&self, out_username: &mut [u8]) -> RawStatus;

    /// Switches the process to the given id file and writes its user name,
    /// null-terminated, into `out_username`.
    fn kfm_switch_to_id(
        &self,
        id_path: &[u8],
        password: &[u8],
        out_username: &mut [u8],
        flags: u32,
    ) -> RawStatus;

    /// Fills `out_info` with the fixed-layout ID_FILE_INFO record for an
    /// open credential handle. The engine writes at most `out_info.len()`
    /// bytes and reports how many it wrote through `out_len`; the caller is
    /// responsible for validating the record length against its layout.
    fn kfm_id_info(&self, handle: RawHandle, out_info: &mut [u8], out_len: &mut u16) -> RawStatus;

    /// Locates a vault for `username` and downloads the id.
    ///
    /// When `id_path` is `Some`, the id file is written to that path; when
    /// `out_handle` is `Some`, an in-memory credential handle is returned
    /// instead. The vault server name is written null-terminated into
    /// `out_server`.
    fn idf_get(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        out_handle: Option<&mut RawHandle>,
        out_server: &mut [u8],
    ) -> RawStatus;

    /// Uploads the open credential `handle` into the user's vault. The
    /// vault server name is written null-terminated into `out_server`.
    fn idf_put(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
    ) -> RawStatus;

    /// Synchronizes the open credential `handle` with the vault. Result
    /// bits (see [`crate::consts`]) are written to `out_flags`.
    fn idf_sync(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
        out_flags: &mut u32,
    ) -> RawStatus;

    /// Resets the vault password of `username`, contacting `server`.
    fn idv_reset_password(
        &self,
        server: &[u8],
        username: &[u8],
        password: &[u8],
        download_count: u16,
    ) -> RawStatus;

    /// Opens a database by path. On success writes the handle to
    /// `out_handle`.
    fn db_open(&self, path: &[u8], out_handle: &mut RawHandle) -> RawStatus;

    /// Closes a database handle.
    fn db_close(&self, handle: RawHandle) -> RawStatus;

    /// Frees an engine-allocated memory block.
    fn mem_free(&self, handle: RawHandle) -> RawStatus;

    /// Resolves a status code to the engine's own error text, if any.
    fn error_text(&self, code: RawStatus) -> Option<String>;
}
