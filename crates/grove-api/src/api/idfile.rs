//! Credential (id file) operations.

use grove_ffi::consts::{
    ID_FILE_INFO_LEN, KFM_OPEN_ALL, KFM_SWITCHID_DONT_SET_ENV_VAR, MAX_PATH, MAX_USER_NAME,
};
use grove_ffi::RawHandle;

use super::{finish, TokenGuard};
use crate::context::ContextScope;
use crate::error::{GroveError, GroveResult, GroveStatus};
use crate::handle::{HandleClass, IdFileHandle};
use crate::layouts::ID_FILE_INFO;
use crate::lmbcs;
use crate::record::{self, Record};
use crate::session::GroveSession;

/// Operations on credential files (id files).
///
/// Obtained from [`GroveSession::id_file_api`]. Methods that open a
/// credential handle register it with the session's registry and release it
/// before returning; the caller-supplied scope is the safety net for the
/// panic path.
pub struct IdFileApi<'a> {
    session: &'a GroveSession,
}

impl<'a> IdFileApi<'a> {
    pub(crate) fn new(session: &'a GroveSession) -> Self {
        Self { session }
    }

    /// Opens the id file at `id_path`, runs `f` with the open handle, and
    /// releases the handle in every case: after `f` returns, after `f`
    /// errors, and during unwind if `f` panics.
    pub fn with_open_id_file<T>(
        &self,
        scope: &ContextScope,
        id_path: &str,
        password: &str,
        f: impl FnOnce(&IdFileHandle) -> GroveResult<T>,
    ) -> GroveResult<T> {
        let (handle, guard) = self.open(scope, id_path, password, KFM_OPEN_ALL)?;
        let body = f(&handle);
        finish(body, guard.release())
    }

    /// Verifies that `password` opens the id file at `id_path`. The file is
    /// opened and closed; nothing stays live.
    ///
    /// Returns `Ok(())` for a correct password; a wrong password surfaces
    /// as [`GroveError::NativeCallFailed`] with the engine's wrong-password
    /// status code.
    pub fn check_id_password(
        &self,
        scope: &ContextScope,
        id_path: &str,
        password: &str,
    ) -> GroveResult<()> {
        let (_handle, guard) = self.open(scope, id_path, password, 0)?;
        guard.release()
    }

    /// Changes the password of the id file at `id_path` on disk.
    pub fn change_id_password(
        &self,
        id_path: &str,
        old_password: &str,
        new_password: &str,
    ) -> GroveResult<()> {
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let old = lmbcs::encode(old_password, true);
        let new = lmbcs::encode(new_password, true);
        let engine = self.session.engine();
        GroveStatus::from_raw(engine.kfm_change_password(&path, &old, &new))
            .check(engine.as_ref())
    }

    /// Returns the user name of the process's active id.
    pub fn current_username(&self) -> GroveResult<String> {
        let mut buf = [0u8; MAX_USER_NAME];
        let engine = self.session.engine();
        GroveStatus::from_raw(engine.kfm_get_username(&mut buf)).check(engine.as_ref())?;
        Ok(self.session.cache().get_cstr(&buf))
    }

    /// Switches the process to the id file at `id_path` and returns the
    /// user name it now operates as. With `dont_set_env_var` the switch is
    /// not persisted to the client configuration.
    pub fn switch_to_id(
        &self,
        id_path: &str,
        password: &str,
        dont_set_env_var: bool,
    ) -> GroveResult<String> {
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let password = lmbcs::encode(password, true);
        let flags = if dont_set_env_var {
            KFM_SWITCHID_DONT_SET_ENV_VAR
        } else {
            0
        };
        let mut buf = [0u8; MAX_USER_NAME];
        let engine = self.session.engine();
        GroveStatus::from_raw(engine.kfm_switch_to_id(&path, &password, &mut buf, flags))
            .check(engine.as_ref())?;
        Ok(self.session.cache().get_cstr(&buf))
    }

    /// Reads the ID_FILE_INFO record for an open credential handle.
    ///
    /// The engine reports how many bytes it wrote; a record shorter than
    /// the declared layout is rejected as
    /// [`GroveError::MalformedRecord`].
    pub fn id_file_info(&self, handle: &IdFileHandle) -> GroveResult<Record> {
        let mut buf = [0u8; ID_FILE_INFO_LEN];
        let mut written: u16 = 0;
        let engine = self.session.engine();
        GroveStatus::from_raw(engine.kfm_id_info(handle.as_raw(), &mut buf, &mut written))
            .check(engine.as_ref())?;
        record::decode(&ID_FILE_INFO, &buf[..usize::from(written).min(buf.len())])
    }

    fn open(
        &self,
        scope: &ContextScope,
        id_path: &str,
        password: &str,
        flags: u32,
    ) -> GroveResult<(IdFileHandle, TokenGuard<'a>)> {
        let path = lmbcs::encode_bounded(id_path, MAX_PATH, "id file path")?;
        let password = lmbcs::encode(password, true);
        let engine = self.session.engine();
        let mut raw: RawHandle = 0;
        GroveStatus::from_raw(engine.kfm_open(&path, &password, flags, &mut raw))
            .check(engine.as_ref())?;
        let handle = IdFileHandle::from_raw(raw)
            .ok_or_else(|| GroveError::invalid_parameter("engine returned a null id handle"))?;
        let registry = self.session.registry();
        let token = registry.register(scope.id(), raw, HandleClass::IdFile)?;
        Ok((handle, TokenGuard::new(registry, token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use grove_ffi::status::{ERR_NOT_FOUND, ERR_WRONG_PASSWORD};
    use grove_ffi::MockEngine;
    use std::sync::Arc;

    fn session() -> (Arc<MockEngine>, GroveSession) {
        let engine = Arc::new(MockEngine::new());
        engine.add_id_file("user.id", "secret", "CN=Test User/O=Grove");
        let session = GroveSession::new(Arc::clone(&engine) as _, CacheConfig::default());
        (engine, session)
    }

    #[test]
    fn test_with_open_id_file_releases_handle() {
        let (engine, session) = session();
        let scope = session.context();

        let raw = session
            .id_file_api()
            .with_open_id_file(&scope, "user.id", "secret", |handle| Ok(handle.as_raw()))
            .unwrap();
        assert_ne!(raw, 0);
        assert_eq!(engine.open_handle_count(), 0);
        assert_eq!(scope.live_handles(), 0);
    }

    #[test]
    fn test_with_open_id_file_releases_on_body_error() {
        let (engine, session) = session();
        let scope = session.context();

        let err = session
            .id_file_api()
            .with_open_id_file(&scope, "user.id", "secret", |_| {
                Err::<(), _>(GroveError::invalid_parameter("boom"))
            })
            .unwrap_err();
        assert!(matches!(err, GroveError::InvalidParameter { .. }));
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn test_check_id_password() {
        let (engine, session) = session();
        let scope = session.context();
        let api = session.id_file_api();

        api.check_id_password(&scope, "user.id", "secret").unwrap();

        let err = api.check_id_password(&scope, "user.id", "nope").unwrap_err();
        assert_eq!(err.status(), Some(ERR_WRONG_PASSWORD));

        let err = api.check_id_password(&scope, "missing.id", "x").unwrap_err();
        assert_eq!(err.status(), Some(ERR_NOT_FOUND));
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn test_change_id_password() {
        let (_engine, session) = session();
        let scope = session.context();
        let api = session.id_file_api();

        api.change_id_password("user.id", "secret", "changed").unwrap();
        api.check_id_password(&scope, "user.id", "changed").unwrap();
        let err = api.check_id_password(&scope, "user.id", "secret").unwrap_err();
        assert_eq!(err.status(), Some(ERR_WRONG_PASSWORD));
    }

    #[test]
    fn test_switch_to_id_updates_current_username() {
        let (_engine, session) = session();
        let api = session.id_file_api();

        assert_eq!(api.current_username().unwrap(), "CN=Server/O=Grove");
        let name = api.switch_to_id("user.id", "secret", true).unwrap();
        assert_eq!(name, "CN=Test User/O=Grove");
        assert_eq!(api.current_username().unwrap(), "CN=Test User/O=Grove");
    }

    #[test]
    fn test_id_file_info_decodes_full_record() {
        let (_engine, session) = session();
        let scope = session.context();
        let api = session.id_file_api();

        let record = api
            .with_open_id_file(&scope, "user.id", "secret", |handle| {
                api.id_file_info(handle)
            })
            .unwrap();
        assert_eq!(record.u16("signature"), Some(0x4649));
        assert_eq!(record.u16("key_bits"), Some(2048));
        assert_eq!(record.u32("serial"), Some(7));
        assert_eq!(record.bytes("fingerprint").map(|b| b[0]), Some(0xA0));
    }

    #[test]
    fn test_id_file_info_rejects_short_record() {
        let (engine, session) = session();
        engine.set_id_info_len(60);
        let scope = session.context();
        let api = session.id_file_api();

        let err = api
            .with_open_id_file(&scope, "user.id", "secret", |handle| {
                api.id_file_info(handle)
            })
            .unwrap_err();
        match err {
            GroveError::MalformedRecord {
                layout,
                expected,
                actual,
            } => {
                assert_eq!(layout, "ID_FILE_INFO");
                assert_eq!(expected, 64);
                assert_eq!(actual, 60);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The short record did not leak the handle.
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn test_path_length_enforced_before_native_call() {
        let (_engine, session) = session();
        let scope = session.context();
        let long_path = "p".repeat(MAX_PATH);
        let err = session
            .id_file_api()
            .check_id_password(&scope, &long_path, "x")
            .unwrap_err();
        assert!(matches!(err, GroveError::LimitExceeded { .. }));
    }
}
