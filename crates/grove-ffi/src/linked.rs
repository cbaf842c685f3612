//! Engine implementation linked against the native client libraries.
//!
//! The `extern "C"` declarations below bind the Grove client entry points.
//! They are only compiled when the `native-link` feature is enabled and the
//! client libraries are available at link time; without the feature every
//! method logs a warning and reports [`ERR_NOT_SUPPORTED`], so the crate
//! always builds.

use crate::engine::{NativeEngine, RawHandle};
#[cfg(not(feature = "native-link"))]
use crate::status::ERR_NOT_SUPPORTED;
use crate::status::{static_error_text, RawStatus};

#[cfg(feature = "native-link")]
extern "C" {
    fn GroveSECKFMOpen(
        ret_handle: *mut RawHandle,
        id_path: *const u8,
        password: *const u8,
        flags: u32,
        reserved: u32,
    ) -> RawStatus;
    fn GroveSECKFMClose(handle: RawHandle, flags: u32, reserved: u32) -> RawStatus;
    fn GroveSECKFMChangePassword(
        id_path: *const u8,
        old_password: *const u8,
        new_password: *const u8,
    ) -> RawStatus;
    fn GroveSECKFMGetUserName(ret_username: *mut u8) -> RawStatus;
    fn GroveSECKFMSwitchToIDFile(
        id_path: *const u8,
        password: *const u8,
        ret_username: *mut u8,
        username_len: u16,
        flags: u32,
    ) -> RawStatus;
    fn GroveSECKFMIdInfo(
        handle: RawHandle,
        ret_info: *mut u8,
        info_len: u16,
        ret_len: *mut u16,
    ) -> RawStatus;
    fn GroveSECidfGet(
        username: *const u8,
        password: *const u8,
        id_path: *const u8,
        ret_handle: *mut RawHandle,
        ret_server: *mut u8,
        reserved: u32,
    ) -> RawStatus;
    fn GroveSECidfPut(
        username: *const u8,
        password: *const u8,
        id_path: *const u8,
        handle: RawHandle,
        ret_server: *mut u8,
        reserved: u32,
    ) -> RawStatus;
    fn GroveSECidfSync(
        username: *const u8,
        password: *const u8,
        id_path: *const u8,
        handle: RawHandle,
        ret_server: *mut u8,
        reserved: u32,
        ret_flags: *mut u32,
    ) -> RawStatus;
    fn GroveSECidvResetUserPassword(
        server: *const u8,
        username: *const u8,
        password: *const u8,
        download_count: u16,
        reserved: u32,
    ) -> RawStatus;
    fn GroveNSFDbOpen(path: *const u8, ret_handle: *mut RawHandle) -> RawStatus;
    fn GroveNSFDbClose(handle: RawHandle) -> RawStatus;
    fn GroveOSMemFree(handle: RawHandle) -> RawStatus;
    fn GroveOSLoadString(code: RawStatus, ret_text: *mut u8, text_len: u16) -> u16;
}

/// Engine backed by the native client libraries.
///
/// Construct one per process; the native layer maintains its own global
/// state underneath.
#[derive(Debug, Default)]
pub struct LinkedEngine;

impl LinkedEngine {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "native-link"))]
fn stub(entry_point: &str) -> RawStatus {
    log::warn!("LinkedEngine::{entry_point} called without native-link feature");
    ERR_NOT_SUPPORTED
}

#[cfg(feature = "native-link")]
impl NativeEngine for LinkedEngine {
    fn kfm_open(
        &self,
        id_path: &[u8],
        password: &[u8],
        flags: u32,
        out_handle: &mut RawHandle,
    ) -> RawStatus {
        // Safety: both parameters are null-terminated by the safe layer and
        // out_handle is a valid location for the duration of the call.
        unsafe { GroveSECKFMOpen(out_handle, id_path.as_ptr(), password.as_ptr(), flags, 0) }
    }

    fn kfm_close(&self, handle: RawHandle, flags: u32) -> RawStatus {
        unsafe { GroveSECKFMClose(handle, flags, 0) }
    }

    fn kfm_change_password(&self, id_path: &[u8], old: &[u8], new: &[u8]) -> RawStatus {
        unsafe { GroveSECKFMChangePassword(id_path.as_ptr(), old.as_ptr(), new.as_ptr()) }
    }

    fn kfm_get_username(&self, out_username: &mut [u8]) -> RawStatus {
        unsafe { GroveSECKFMGetUserName(out_username.as_mut_ptr()) }
    }

    fn kfm_switch_to_id(
        &self,
        id_path: &[u8],
        password: &[u8],
        out_username: &mut [u8],
        flags: u32,
    ) -> RawStatus {
        unsafe {
            GroveSECKFMSwitchToIDFile(
                id_path.as_ptr(),
                password.as_ptr(),
                out_username.as_mut_ptr(),
                out_username.len() as u16,
                flags,
            )
        }
    }

    fn kfm_id_info(&self, handle: RawHandle, out_info: &mut [u8], out_len: &mut u16) -> RawStatus {
        unsafe { GroveSECKFMIdInfo(handle, out_info.as_mut_ptr(), out_info.len() as u16, out_len) }
    }

    fn idf_get(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        out_handle: Option<&mut RawHandle>,
        out_server: &mut [u8],
    ) -> RawStatus {
        let id_path_ptr = id_path.map_or(std::ptr::null(), <[u8]>::as_ptr);
        let handle_ptr = out_handle.map_or(std::ptr::null_mut(), |h| h as *mut RawHandle);
        unsafe {
            GroveSECidfGet(
                username.as_ptr(),
                password.as_ptr(),
                id_path_ptr,
                handle_ptr,
                out_server.as_mut_ptr(),
                0,
            )
        }
    }

    fn idf_put(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
    ) -> RawStatus {
        let id_path_ptr = id_path.map_or(std::ptr::null(), <[u8]>::as_ptr);
        unsafe {
            GroveSECidfPut(
                username.as_ptr(),
                password.as_ptr(),
                id_path_ptr,
                handle,
                out_server.as_mut_ptr(),
                0,
            )
        }
    }

    fn idf_sync(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
        out_flags: &mut u32,
    ) -> RawStatus {
        let id_path_ptr = id_path.map_or(std::ptr::null(), <[u8]>::as_ptr);
        unsafe {
            GroveSECidfSync(
                username.as_ptr(),
                password.as_ptr(),
                id_path_ptr,
                handle,
                out_server.as_mut_ptr(),
                0,
                out_flags,
            )
        }
    }

    fn idv_reset_password(
        &self,
        server: &[u8],
        username: &[u8],
        password: &[u8],
        download_count: u16,
    ) -> RawStatus {
        unsafe {
            GroveSECidvResetUserPassword(
                server.as_ptr(),
                username.as_ptr(),
                password.as_ptr(),
                download_count,
                0,
            )
        }
    }

    fn db_open(&self, path: &[u8], out_handle: &mut RawHandle) -> RawStatus {
        unsafe { GroveNSFDbOpen(path.as_ptr(), out_handle) }
    }

    fn db_close(&self, handle: RawHandle) -> RawStatus {
        unsafe { GroveNSFDbClose(handle) }
    }

    fn mem_free(&self, handle: RawHandle) -> RawStatus {
        unsafe { GroveOSMemFree(handle) }
    }

    fn error_text(&self, code: RawStatus) -> Option<String> {
        let mut buf = [0u8; 256];
        let written = unsafe { GroveOSLoadString(code, buf.as_mut_ptr(), buf.len() as u16) };
        if written == 0 {
            return static_error_text(code).map(str::to_owned);
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Some(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
}

#[cfg(not(feature = "native-link"))]
impl NativeEngine for LinkedEngine {
    fn kfm_open(
        &self,
        _id_path: &[u8],
        _password: &[u8],
        _flags: u32,
        _out_handle: &mut RawHandle,
    ) -> RawStatus {
        stub("kfm_open")
    }

    fn kfm_close(&self, _handle: RawHandle, _flags: u32) -> RawStatus {
        stub("kfm_close")
    }

    fn kfm_change_password(&self, _id_path: &[u8], _old: &[u8], _new: &[u8]) -> RawStatus {
        stub("kfm_change_password")
    }

    fn kfm_get_username(&self, _out_username: &mut [u8]) -> RawStatus {
        stub("kfm_get_username")
    }

    fn kfm_switch_to_id(
        &self,
        _id_path: &[u8],
        _password: &[u8],
        _out_username: &mut [u8],
        _flags: u32,
    ) -> RawStatus {
        stub("kfm_switch_to_id")
    }

    fn kfm_id_info(&self, _handle: RawHandle, _out_info: &mut [u8], _out_len: &mut u16) -> RawStatus {
        stub("kfm_id_info")
    }

    fn idf_get(
        &self,
        _username: &[u8],
        _password: &[u8],
        _id_path: Option<&[u8]>,
        _out_handle: Option<&mut RawHandle>,
        _out_server: &mut [u8],
    ) -> RawStatus {
        stub("idf_get")
    }

    fn idf_put(
        &self,
        _username: &[u8],
        _password: &[u8],
        _id_path: Option<&[u8]>,
        _handle: RawHandle,
        _out_server: &mut [u8],
    ) -> RawStatus {
        stub("idf_put")
    }

    fn idf_sync(
        &self,
        _username: &[u8],
        _password: &[u8],
        _id_path: Option<&[u8]>,
        _handle: RawHandle,
        _out_server: &mut [u8],
        _out_flags: &mut u32,
    ) -> RawStatus {
        stub("idf_sync")
    }

    fn idv_reset_password(
        &self,
        _server: &[u8],
        _username: &[u8],
        _password: &[u8],
        _download_count: u16,
    ) -> RawStatus {
        stub("idv_reset_password")
    }

    fn db_open(&self, _path: &[u8], _out_handle: &mut RawHandle) -> RawStatus {
        stub("db_open")
    }

    fn db_close(&self, _handle: RawHandle) -> RawStatus {
        stub("db_close")
    }

    fn mem_free(&self, _handle: RawHandle) -> RawStatus {
        stub("mem_free")
    }

    fn error_text(&self, code: RawStatus) -> Option<String> {
        static_error_text(code).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ERR_WRONG_PASSWORD;

    #[test]
    #[cfg(not(feature = "native-link"))]
    fn test_stub_engine_reports_not_supported() {
        let engine = LinkedEngine::new();
        let mut handle = 0;
        assert_eq!(
            engine.kfm_open(b"user.id\0", b"pw\0", 0, &mut handle),
            ERR_NOT_SUPPORTED
        );
        assert_eq!(handle, 0);
    }

    #[test]
    #[cfg(not(feature = "native-link"))]
    fn test_stub_engine_falls_back_to_static_error_text() {
        let engine = LinkedEngine::new();
        assert_eq!(
            engine.error_text(ERR_WRONG_PASSWORD).as_deref(),
            Some("wrong password")
        );
        assert_eq!(engine.error_text(12345), None);
    }
}
