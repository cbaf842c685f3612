//! Declared native record layouts.
//!
//! One table per native structure, in the structure's declared field order.
//! These tables are the contract with the engine: field order and widths
//! must match the native headers exactly. Each table's total size is
//! checked at compile time.

use crate::record::{FieldDef, FieldKind, RecordLayout};

/// Common header every variable-length native record starts with.
pub static RECORD_HEADER: RecordLayout = RecordLayout {
    name: "RECORD_HEADER",
    fields: &[
        FieldDef {
            name: "signature",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "length",
            kind: FieldKind::U16,
        },
    ],
};

/// Credential file information record returned by `kfm_id_info`.
pub static ID_FILE_INFO: RecordLayout = RecordLayout {
    name: "ID_FILE_INFO",
    fields: &[
        FieldDef {
            name: "signature",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "length",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "version",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "flags",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "key_type",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "key_bits",
            kind: FieldKind::U16,
        },
        FieldDef {
            name: "created",
            kind: FieldKind::U64,
        },
        FieldDef {
            name: "expires",
            kind: FieldKind::U64,
        },
        FieldDef {
            name: "serial",
            kind: FieldKind::U32,
        },
        FieldDef {
            name: "fingerprint",
            kind: FieldKind::Bytes(16),
        },
        FieldDef {
            name: "spare",
            kind: FieldKind::Spare(16),
        },
    ],
};

// Size checks against the native headers.
const _: () = assert!(RECORD_HEADER.byte_len() == 4);
const _: () = assert!(ID_FILE_INFO.byte_len() == grove_ffi::consts::ID_FILE_INFO_LEN);
