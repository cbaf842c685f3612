//! Id-vault operations.
//!
//! The vault is a server-side store of user credentials. These operations
//! move id files between the vault and the client: download to disk or to
//! an in-memory handle, upload, synchronize, and administrative password
//! reset. Every out-buffer carries the vault server's name; callers pass
//! the home server to start the lookup and get back the vault server that
//! actually answered.

use grove_ffi::consts::{
    KFM_CLOSE_WRITE_ID_FILE, KFM_OPEN_ALL, MAX_PATH, VAULT_ID_FOUND, VAULT_SYNC_DONE,
};
use grove_ffi::RawHandle;

use super::{finish, TokenGuard};
use crate::context::ContextScope;
use crate::error::{GroveError, GroveResult, GroveStatus};
use crate::handle::{HandleClass, IdFileHandle};
use crate::lmbcs;
use crate::registry::HandleToken;
use crate::session::GroveSession;

/// An id downloaded from the vault into memory.
///
/// The handle is registered to the scope it was acquired under; release it
/// through [`VaultApi::release_user_id`] or let the scope's sweep reclaim
/// it.
#[derive(Debug)]
pub struct UserId {
    handle: IdFileHandle,
    token: HandleToken,
    vault_server: String,
}

impl UserId {
    pub fn handle(&self) -> &IdFileHandle {
        &self.handle
    }

    pub fn token(&self) -> HandleToken {
        self.token
    }

    /// Name of the vault server the id was downloaded from.
    pub fn vault_server(&self) -> &str {
        &self.vault_server
    }
}

/// Outcome of a vault synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    vault_server: String,
    flags: u32,
}

impl SyncResult {
    pub fn vault_server(&self) -> &str {
        &self.vault_server
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// True if the id file contents were synchronized.
    pub fn is_sync_done(&self) -> bool {
        self.flags & VAULT_SYNC_DONE != 0
    }

    /// True if the user's id was found in the vault.
    pub fn is_found_in_vault(&self) -> bool {
        self.flags & VAULT_ID_FOUND != 0
    }
}

/// Operations against the id vault.
///
/// Obtained from [`GroveSession::vault_api`].
pub struct VaultApi<'a> {
    session: &'a GroveSession,
}

impl<'a> VaultApi<'a> {
    pub(crate) fn new(session: &'a GroveSession) -> Self {
        Self { session }
    }

    /// Downloads `username`'s id from the vault reachable via `server` and
    /// writes it to `id_path` on disk. Returns the answering vault server's
    /// name. No handle stays live.
    pub fn extract_user_id_from_vault(
        &self,
        server: &str,
        username: &str,
        password: &str,
        id_path: &str,
    ) -> GroveResult<String> {
        let user = lmbcs::encode(username, true);
        let pass = lmbcs::encode(password, true);
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let mut server_buf = server_seed(server)?;

        let engine = self.session.engine();
        GroveStatus::from_raw(engine.idf_get(&user, &pass, Some(&path), None, &mut server_buf))
            .check(engine.as_ref())?;
        Ok(self.session.cache().get_cstr(&server_buf))
    }

    /// Downloads `username`'s id from the vault into memory. The returned
    /// handle is registered under `scope` and stays live until released.
    pub fn get_user_id_from_vault(
        &self,
        scope: &ContextScope,
        server: &str,
        username: &str,
        password: &str,
    ) -> GroveResult<UserId> {
        let user = lmbcs::encode(username, true);
        let pass = lmbcs::encode(password, true);
        let mut server_buf = server_seed(server)?;

        let engine = self.session.engine();
        let mut raw: RawHandle = 0;
        GroveStatus::from_raw(engine.idf_get(&user, &pass, None, Some(&mut raw), &mut server_buf))
            .check(engine.as_ref())?;
        let handle = IdFileHandle::from_raw(raw)
            .ok_or_else(|| GroveError::invalid_parameter("engine returned a null id handle"))?;
        let token = self
            .session
            .registry()
            .register(scope.id(), raw, HandleClass::IdFile)?;
        Ok(UserId {
            handle,
            token,
            vault_server: self.session.cache().get_cstr(&server_buf),
        })
    }

    /// Releases an in-memory id obtained from
    /// [`get_user_id_from_vault`](Self::get_user_id_from_vault).
    pub fn release_user_id(&self, user_id: UserId) -> GroveResult<()> {
        self.session.registry().release(user_id.token)
    }

    /// Uploads the id file at `id_path` into `username`'s vault.
    ///
    /// The engine requires an open address book on the home server for the
    /// vault lookup, so the operation opens `server`'s directory database,
    /// opens the id file, uploads, and releases both handles. The refreshed
    /// id is written back to disk when the credential handle closes.
    /// Returns the answering vault server's name.
    pub fn put_user_id_into_vault(
        &self,
        scope: &ContextScope,
        server: &str,
        username: &str,
        password: &str,
        id_path: &str,
    ) -> GroveResult<String> {
        let user = lmbcs::encode(username, true);
        let pass = lmbcs::encode(password, true);
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let mut server_buf = server_seed(server)?;

        let engine = self.session.engine();
        let registry = self.session.registry();

        let db_guard = {
            let db_path = directory_db_path(server)?;
            let mut raw: RawHandle = 0;
            GroveStatus::from_raw(engine.db_open(&db_path, &mut raw)).check(engine.as_ref())?;
            TokenGuard::new(
                registry,
                registry.register(scope.id(), raw, HandleClass::Database)?,
            )
        };

        let body = (|| {
            let mut raw: RawHandle = 0;
            GroveStatus::from_raw(engine.kfm_open(&path, &pass, KFM_OPEN_ALL, &mut raw))
                .check(engine.as_ref())?;
            let kfm_guard = TokenGuard::new(
                registry,
                registry.register_with_flags(
                    scope.id(),
                    raw,
                    HandleClass::IdFile,
                    KFM_CLOSE_WRITE_ID_FILE,
                )?,
            );

            let put = GroveStatus::from_raw(engine.idf_put(
                &user,
                &pass,
                Some(&path),
                raw,
                &mut server_buf,
            ))
            .check(engine.as_ref());
            finish(put, kfm_guard.release())?;
            Ok(self.session.cache().get_cstr(&server_buf))
        })();
        finish(body, db_guard.release())
    }

    /// Synchronizes the id file at `id_path` with `username`'s vault copy.
    ///
    /// Same handle discipline as
    /// [`put_user_id_into_vault`](Self::put_user_id_into_vault); the
    /// refreshed id is written back to disk when the credential handle
    /// closes.
    pub fn sync_user_id_with_vault(
        &self,
        scope: &ContextScope,
        server: &str,
        username: &str,
        password: &str,
        id_path: &str,
    ) -> GroveResult<SyncResult> {
        let user = lmbcs::encode(username, true);
        let pass = lmbcs::encode(password, true);
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let mut server_buf = server_seed(server)?;

        let engine = self.session.engine();
        let registry = self.session.registry();

        let db_guard = {
            let db_path = directory_db_path(server)?;
            let mut raw: RawHandle = 0;
            GroveStatus::from_raw(engine.db_open(&db_path, &mut raw)).check(engine.as_ref())?;
            TokenGuard::new(
                registry,
                registry.register(scope.id(), raw, HandleClass::Database)?,
            )
        };

        let body = (|| {
            let mut raw: RawHandle = 0;
            GroveStatus::from_raw(engine.kfm_open(&path, &pass, KFM_OPEN_ALL, &mut raw))
                .check(engine.as_ref())?;
            let kfm_guard = TokenGuard::new(
                registry,
                registry.register_with_flags(
                    scope.id(),
                    raw,
                    HandleClass::IdFile,
                    KFM_CLOSE_WRITE_ID_FILE,
                )?,
            );

            let mut flags: u32 = 0;
            let sync = GroveStatus::from_raw(engine.idf_sync(
                &user,
                &pass,
                Some(&path),
                raw,
                &mut server_buf,
                &mut flags,
            ))
            .check(engine.as_ref());
            finish(sync, kfm_guard.release())?;
            Ok(SyncResult {
                vault_server: self.session.cache().get_cstr(&server_buf),
                flags,
            })
        })();
        finish(body, db_guard.release())
    }

    /// Resets `username`'s vault password. Administrative: requires the
    /// active id to hold vault admin rights on `server`. The new password
    /// becomes valid for `download_count` id downloads.
    pub fn reset_user_password_in_vault(
        &self,
        server: &str,
        username: &str,
        new_password: &str,
        download_count: u16,
    ) -> GroveResult<()> {
        let srv = lmbcs::encode_bounded(server, MAX_PATH, "server name")?;
        let user = lmbcs::encode(username, true);
        let pass = lmbcs::encode(new_password, true);
        let engine = self.session.engine();
        GroveStatus::from_raw(engine.idv_reset_password(&srv, &user, &pass, download_count))
            .check(engine.as_ref())
    }
}

/// Fixed out-buffer seeded with the home server's name. The engine reads
/// the seed to start the vault lookup and overwrites it with the vault
/// server that answered.
fn server_seed(server: &str) -> GroveResult<[u8; MAX_PATH]> {
    let encoded = lmbcs::encode_bounded(server, MAX_PATH, "server name")?;
    let mut buf = [0u8; MAX_PATH];
    buf[..encoded.len()].copy_from_slice(&encoded);
    Ok(buf)
}

/// Path of the directory database on `server`, or the local replica when no
/// server is given.
fn directory_db_path(server: &str) -> GroveResult<Vec<u8>> {
    let path = if server.is_empty() {
        "names.nsf".to_owned()
    } else {
        format!("{server}!!names.nsf")
    };
    lmbcs::encode_bounded(&path, MAX_PATH, "directory database path")
}
