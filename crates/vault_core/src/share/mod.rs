//! Share/import/export codec.
//!
//! # Responsibility
//! - Encode single notes/lists as share strings (QR payloads, clipboard).
//! - Decode every accepted import format into one `ImportPayload`.
//! - Build full JSON and plain text exports of the vault.
//!
//! # Accepted import formats
//! - Legacy tagged framing: `NOTE:` or `LIST:` followed by a JSON object.
//! - Versioned envelope: `{"v":1,"kind":"note"|"list","data":{...}}`.
//! - Full export: a JSON object with a top-level `notes` or `lists` array.
//!
//! # Invariants
//! - Decoding never panics; every failure is a `DecodeError`.
//! - Legacy framing stays the default share output.

use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod export;
pub mod tagged;

pub use export::{render_text_export, ExportOptions, VaultExport, EXPORT_VERSION};
pub use tagged::{
    encode_share, ShareFormat, ShareKind, SharePayload, SharedList, SharedListItem, SharedNote,
    SHARE_ENVELOPE_VERSION,
};

/// Import content that could not be understood. Always recoverable.
#[derive(Debug)]
pub enum DecodeError {
    /// Input matches none of the accepted formats.
    UnknownFormat,
    /// Input looked like a known format but its JSON is malformed.
    InvalidJson(serde_json::Error),
    /// Envelope version newer than this build understands.
    UnsupportedVersion { found: u64, supported: u32 },
    /// JSON is well-formed but does not have the expected shape.
    Shape(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFormat => write!(f, "unrecognized import format"),
            Self::InvalidJson(err) => write!(f, "import is not valid JSON: {err}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "share format version {found} is not supported (latest {supported})"
            ),
            Self::Shape(details) => write!(f, "unexpected import shape: {details}"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            _ => None,
        }
    }
}

/// Decoded import content.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    Note(SharedNote),
    List(SharedList),
    Export(Box<VaultExport>),
}

/// Detects the format of `text` and decodes it.
pub fn decode_import(text: &str) -> Result<ImportPayload, DecodeError> {
    let trimmed = text.trim();

    if let Some(payload) = tagged::decode_legacy(trimmed)? {
        return Ok(payload.into());
    }

    if !trimmed.starts_with('{') {
        return Err(DecodeError::UnknownFormat);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(DecodeError::InvalidJson)?;
    let Value::Object(object) = &value else {
        return Err(DecodeError::UnknownFormat);
    };

    if object.contains_key("v") && object.contains_key("kind") {
        return tagged::decode_envelope(value).map(Into::into);
    }

    let has_records = ["notes", "lists"]
        .iter()
        .any(|field| object.get(*field).is_some_and(Value::is_array));
    if has_records {
        let export: VaultExport = serde_json::from_value(value)
            .map_err(|err| DecodeError::Shape(format!("export: {err}")))?;
        return Ok(ImportPayload::Export(Box::new(export)));
    }

    Err(DecodeError::UnknownFormat)
}

impl From<SharePayload> for ImportPayload {
    fn from(value: SharePayload) -> Self {
        match value {
            SharePayload::Note(note) => Self::Note(note),
            SharePayload::List(list) => Self::List(list),
        }
    }
}
