//! In-memory engine used by tests of the safe binding layer.
//!
//! `MockEngine` implements [`NativeEngine`] over plain maps: id files keyed
//! by path, a vault keyed by user name, and a ledger of open handles so
//! tests can assert that a scenario leaked nothing. Lookups match on the
//! raw encoded bytes the binding passes down, so test fixtures using ASCII
//! names behave identically under the real codec.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::consts::{ID_FILE_INFO_LEN, VAULT_ID_FOUND, VAULT_SYNC_DONE};
use crate::engine::{NativeEngine, RawHandle};
use crate::status::{
    static_error_text, RawStatus, ERR_INVALID_HANDLE, ERR_NOT_FOUND, ERR_NO_SUCH_VAULT,
    ERR_WRONG_PASSWORD, NO_ERROR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockHandleKind {
    IdFile,
    Database,
    Memory,
}

#[derive(Debug, Clone)]
struct IdFileRecord {
    password: Vec<u8>,
    username: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: RawHandle,
    open_handles: HashMap<RawHandle, MockHandleKind>,
    id_files: HashMap<Vec<u8>, IdFileRecord>,
    vault: HashMap<Vec<u8>, Vec<u8>>,
    vault_server: Vec<u8>,
    current_username: Vec<u8>,
    id_info_len: usize,
    close_status: RawStatus,
}

/// In-memory [`NativeEngine`] for tests.
#[derive(Debug)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

/// Copies `value` into `out` and null-terminates it. Values longer than the
/// buffer are truncated, matching native out-buffer behavior.
fn write_out(out: &mut [u8], value: &[u8]) {
    let n = value.len().min(out.len().saturating_sub(1));
    out[..n].copy_from_slice(&value[..n]);
    out[n] = 0;
}

/// Trims a null-terminated parameter to its content bytes.
fn cstr(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 0x1000,
                vault_server: b"CN=Vault01/O=Grove".to_vec(),
                current_username: b"CN=Server/O=Grove".to_vec(),
                id_info_len: ID_FILE_INFO_LEN,
                ..MockState::default()
            }),
        }
    }

    /// Registers an id file on the mock file system.
    pub fn add_id_file(&self, path: &str, password: &str, username: &str) {
        let mut state = self.state.lock().unwrap();
        state.id_files.insert(
            path.as_bytes().to_vec(),
            IdFileRecord {
                password: password.as_bytes().to_vec(),
                username: username.as_bytes().to_vec(),
            },
        );
    }

    /// Registers a user in the mock vault.
    pub fn add_vault_user(&self, username: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .vault
            .insert(username.as_bytes().to_vec(), password.as_bytes().to_vec());
    }

    /// Overrides the vault server name written to out-buffers. Raw bytes so
    /// tests can exercise non-ASCII encodings.
    pub fn set_vault_server_bytes(&self, name: &[u8]) {
        self.state.lock().unwrap().vault_server = name.to_vec();
    }

    /// Limits how many bytes `kfm_id_info` writes, to simulate an engine
    /// build returning a shorter record than the declared layout.
    pub fn set_id_info_len(&self, len: usize) {
        self.state.lock().unwrap().id_info_len = len;
    }

    /// Makes every subsequent close call report `status`. The handle is
    /// still retired, matching the native behavior of freeing the slot even
    /// when the flush fails.
    pub fn set_close_status(&self, status: RawStatus) {
        self.state.lock().unwrap().close_status = status;
    }

    /// Allocates an engine memory block and returns its handle. Lets
    /// registry tests exercise the `mem_free` close path.
    pub fn alloc_memory(&self) -> RawHandle {
        let mut state = self.state.lock().unwrap();
        Self::alloc(&mut state, MockHandleKind::Memory)
    }

    /// Number of handles currently open in the engine. Zero after a
    /// leak-free scenario.
    pub fn open_handle_count(&self) -> usize {
        self.state.lock().unwrap().open_handles.len()
    }

    /// True if a vault record exists for `username`.
    pub fn vault_contains(&self, username: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .vault
            .contains_key(username.as_bytes())
    }

    /// True if an id file exists at `path` on the mock file system.
    pub fn has_id_file(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .id_files
            .contains_key(path.as_bytes())
    }

    fn alloc(state: &mut MockState, kind: MockHandleKind) -> RawHandle {
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open_handles.insert(handle, kind);
        handle
    }

    fn close(state: &mut MockState, handle: RawHandle, kind: MockHandleKind) -> RawStatus {
        match state.open_handles.get(&handle) {
            Some(&k) if k == kind => {
                state.open_handles.remove(&handle);
                state.close_status
            }
            _ => ERR_INVALID_HANDLE,
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for MockEngine {
    fn kfm_open(
        &self,
        id_path: &[u8],
        password: &[u8],
        flags: u32,
        out_handle: &mut RawHandle,
    ) -> RawStatus {
        let _ = flags;
        let mut state = self.state.lock().unwrap();
        let record = match state.id_files.get(cstr(id_path)) {
            Some(r) => r.clone(),
            None => return ERR_NOT_FOUND,
        };
        if record.password != cstr(password) {
            return ERR_WRONG_PASSWORD;
        }
        *out_handle = Self::alloc(&mut state, MockHandleKind::IdFile);
        NO_ERROR
    }

    fn kfm_close(&self, handle: RawHandle, _flags: u32) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        Self::close(&mut state, handle, MockHandleKind::IdFile)
    }

    fn kfm_change_password(&self, id_path: &[u8], old: &[u8], new: &[u8]) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        let path = cstr(id_path).to_vec();
        let record = match state.id_files.get_mut(&path) {
            Some(r) => r,
            None => return ERR_NOT_FOUND,
        };
        if record.password != cstr(old) {
            return ERR_WRONG_PASSWORD;
        }
        record.password = cstr(new).to_vec();
        NO_ERROR
    }

    fn kfm_get_username(&self, out_username: &mut [u8]) -> RawStatus {
        let state = self.state.lock().unwrap();
        write_out(out_username, &state.current_username);
        NO_ERROR
    }

    fn kfm_switch_to_id(
        &self,
        id_path: &[u8],
        password: &[u8],
        out_username: &mut [u8],
        _flags: u32,
    ) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        let record = match state.id_files.get(cstr(id_path)) {
            Some(r) => r.clone(),
            None => return ERR_NOT_FOUND,
        };
        if record.password != cstr(password) {
            return ERR_WRONG_PASSWORD;
        }
        state.current_username = record.username.clone();
        write_out(out_username, &record.username);
        NO_ERROR
    }

    fn kfm_id_info(&self, handle: RawHandle, out_info: &mut [u8], out_len: &mut u16) -> RawStatus {
        let state = self.state.lock().unwrap();
        if state.open_handles.get(&handle) != Some(&MockHandleKind::IdFile) {
            return ERR_INVALID_HANDLE;
        }
        // Deterministic ID_FILE_INFO record: signature "IF", declared
        // length, version 1, 2048-bit key, recognizable fingerprint.
        let mut record = [0u8; ID_FILE_INFO_LEN];
        record[0..2].copy_from_slice(&0x4649u16.to_le_bytes());
        record[2..4].copy_from_slice(&(ID_FILE_INFO_LEN as u16).to_le_bytes());
        record[4..6].copy_from_slice(&1u16.to_le_bytes());
        record[6..8].copy_from_slice(&0u16.to_le_bytes());
        record[8..10].copy_from_slice(&2u16.to_le_bytes());
        record[10..12].copy_from_slice(&2048u16.to_le_bytes());
        record[12..20].copy_from_slice(&0x0065_4A2B_1C3D_4E5Fu64.to_le_bytes());
        record[20..28].copy_from_slice(&0x0066_4A2B_1C3D_4E5Fu64.to_le_bytes());
        record[28..32].copy_from_slice(&7u32.to_le_bytes());
        for (i, b) in record[32..48].iter_mut().enumerate() {
            *b = 0xA0 + i as u8;
        }
        let n = state.id_info_len.min(out_info.len()).min(record.len());
        out_info[..n].copy_from_slice(&record[..n]);
        *out_len = n as u16;
        NO_ERROR
    }

    fn idf_get(
        &self,
        username: &[u8],
        password: &[u8],
        id_path: Option<&[u8]>,
        out_handle: Option<&mut RawHandle>,
        out_server: &mut [u8],
    ) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        let user = cstr(username).to_vec();
        let vault_password = match state.vault.get(&user) {
            Some(p) => p.clone(),
            None => return ERR_NO_SUCH_VAULT,
        };
        if vault_password != cstr(password) {
            return ERR_WRONG_PASSWORD;
        }
        if let Some(path) = id_path {
            state.id_files.insert(
                cstr(path).to_vec(),
                IdFileRecord {
                    password: vault_password,
                    username: user,
                },
            );
        }
        if let Some(handle) = out_handle {
            *handle = Self::alloc(&mut state, MockHandleKind::IdFile);
        }
        let server = state.vault_server.clone();
        write_out(out_server, &server);
        NO_ERROR
    }

    fn idf_put(
        &self,
        username: &[u8],
        password: &[u8],
        _id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
    ) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        if state.open_handles.get(&handle) != Some(&MockHandleKind::IdFile) {
            return ERR_INVALID_HANDLE;
        }
        state
            .vault
            .insert(cstr(username).to_vec(), cstr(password).to_vec());
        let server = state.vault_server.clone();
        write_out(out_server, &server);
        NO_ERROR
    }

    fn idf_sync(
        &self,
        username: &[u8],
        password: &[u8],
        _id_path: Option<&[u8]>,
        handle: RawHandle,
        out_server: &mut [u8],
        out_flags: &mut u32,
    ) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        if state.open_handles.get(&handle) != Some(&MockHandleKind::IdFile) {
            return ERR_INVALID_HANDLE;
        }
        let user = cstr(username).to_vec();
        let found = state.vault.contains_key(&user);
        state.vault.insert(user, cstr(password).to_vec());
        *out_flags = VAULT_SYNC_DONE | if found { VAULT_ID_FOUND } else { 0 };
        let server = state.vault_server.clone();
        write_out(out_server, &server);
        NO_ERROR
    }

    fn idv_reset_password(
        &self,
        _server: &[u8],
        username: &[u8],
        password: &[u8],
        _download_count: u16,
    ) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        let user = cstr(username).to_vec();
        match state.vault.get_mut(&user) {
            Some(entry) => {
                *entry = cstr(password).to_vec();
                NO_ERROR
            }
            None => ERR_NO_SUCH_VAULT,
        }
    }

    fn db_open(&self, path: &[u8], out_handle: &mut RawHandle) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        if cstr(path).is_empty() {
            return ERR_NOT_FOUND;
        }
        *out_handle = Self::alloc(&mut state, MockHandleKind::Database);
        NO_ERROR
    }

    fn db_close(&self, handle: RawHandle) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        Self::close(&mut state, handle, MockHandleKind::Database)
    }

    fn mem_free(&self, handle: RawHandle) -> RawStatus {
        let mut state = self.state.lock().unwrap();
        Self::close(&mut state, handle, MockHandleKind::Memory)
    }

    fn error_text(&self, code: RawStatus) -> Option<String> {
        static_error_text(code).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kfm_open_close_cycle() {
        let engine = MockEngine::new();
        engine.add_id_file("user.id", "secret", "CN=Test User/O=Grove");

        let mut handle = 0;
        assert_eq!(engine.kfm_open(b"user.id\0", b"secret\0", 0, &mut handle), NO_ERROR);
        assert_ne!(handle, 0);
        assert_eq!(engine.open_handle_count(), 1);

        assert_eq!(engine.kfm_close(handle, 0), NO_ERROR);
        assert_eq!(engine.open_handle_count(), 0);

        // Second close on the same value is an engine-level error.
        assert_eq!(engine.kfm_close(handle, 0), ERR_INVALID_HANDLE);
    }

    #[test]
    fn test_kfm_open_wrong_password() {
        let engine = MockEngine::new();
        engine.add_id_file("user.id", "secret", "CN=Test User/O=Grove");

        let mut handle = 0;
        assert_eq!(
            engine.kfm_open(b"user.id\0", b"nope\0", 0, &mut handle),
            ERR_WRONG_PASSWORD
        );
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn test_idf_get_downloads_file() {
        let engine = MockEngine::new();
        engine.add_vault_user("CN=Test User/O=Grove", "secret");

        let mut server = [0u8; 64];
        let status = engine.idf_get(
            b"CN=Test User/O=Grove\0",
            b"secret\0",
            Some(b"downloaded.id\0"),
            None,
            &mut server,
        );
        assert_eq!(status, NO_ERROR);
        assert!(engine.has_id_file("downloaded.id"));
        assert!(server.starts_with(b"CN=Vault01/O=Grove\0"));
    }

    #[test]
    fn test_idf_get_unknown_user() {
        let engine = MockEngine::new();
        let mut server = [0u8; 64];
        assert_eq!(
            engine.idf_get(b"CN=Nobody/O=Grove\0", b"x\0", None, None, &mut server),
            ERR_NO_SUCH_VAULT
        );
    }

    #[test]
    fn test_id_info_respects_buffer_bound() {
        let engine = MockEngine::new();
        engine.add_id_file("user.id", "secret", "CN=Test User/O=Grove");
        let mut handle = 0;
        engine.kfm_open(b"user.id\0", b"secret\0", 0, &mut handle);

        let mut short = [0xFFu8; 60];
        let mut written = 0;
        assert_eq!(engine.kfm_id_info(handle, &mut short, &mut written), NO_ERROR);
        // Only the first 60 bytes of the record were written.
        assert_eq!(written, 60);
        assert_eq!(&short[0..2], &0x4649u16.to_le_bytes());

        engine.kfm_close(handle, 0);
    }
}
