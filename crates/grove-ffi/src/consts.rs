//! Native limits and flag words.
//!
//! These values mirror constants from the Grove C headers. They are part of
//! the wire contract with the engine and must not be changed independently
//! of it.

/// Maximum length in bytes of an encoded path or server name, including the
/// null terminator. Enforced client-side before any native call so the
/// engine never silently truncates.
pub const MAX_PATH: usize = 256;

/// Maximum length in bytes of an encoded user name, including the null
/// terminator.
pub const MAX_USER_NAME: usize = 256;

/// `kfm_open` flags: open the credential file for all operations
/// (signing, encryption, vault upload).
pub const KFM_OPEN_ALL: u32 = 0x0000_0001;

/// `kfm_close` flags: write the in-memory credential back to its file on
/// close. Used after vault put/sync so the refreshed id lands on disk.
pub const KFM_CLOSE_WRITE_ID_FILE: u32 = 0x0000_0001;

/// `kfm_switch_to_id` flags: do not update the client ini to point at the
/// newly active id file.
pub const KFM_SWITCHID_DONT_SET_ENV_VAR: u32 = 0x0000_0001;

/// Vault sync result bit: the id file contents were synchronized.
pub const VAULT_SYNC_DONE: u32 = 0x0000_0001;

/// Vault sync result bit: the user's id was found in the vault.
pub const VAULT_ID_FOUND: u32 = 0x0000_0002;

/// Declared size in bytes of the ID_FILE_INFO record returned by
/// `kfm_id_info`.
pub const ID_FILE_INFO_LEN: usize = 64;
