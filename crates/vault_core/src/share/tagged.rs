//! Single-record share strings: legacy tagged framing and the versioned
//! envelope.

use super::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NOTE_TAG: &str = "NOTE:";
const LIST_TAG: &str = "LIST:";

/// Latest envelope version written and accepted.
pub const SHARE_ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedNote {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedListItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedList {
    pub title: String,
    #[serde(default)]
    pub items: Vec<SharedListItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    Note,
    List,
}

/// One shareable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharePayload {
    Note(SharedNote),
    List(SharedList),
}

impl SharePayload {
    pub fn kind(&self) -> ShareKind {
        match self {
            Self::Note(_) => ShareKind::Note,
            Self::List(_) => ShareKind::List,
        }
    }
}

/// Output framing for `encode_share`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShareFormat {
    /// `NOTE:{...}` / `LIST:{...}`; readable by older app builds.
    #[default]
    Legacy,
    /// `{"v":1,"kind":..,"data":{..}}`.
    Envelope,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShareEnvelope {
    v: u64,
    kind: ShareKind,
    data: Value,
}

/// Encodes one record for sharing.
pub fn encode_share(payload: &SharePayload, format: ShareFormat) -> serde_json::Result<String> {
    match format {
        ShareFormat::Legacy => {
            let (tag, body) = match payload {
                SharePayload::Note(note) => (NOTE_TAG, serde_json::to_string(note)?),
                SharePayload::List(list) => (LIST_TAG, serde_json::to_string(list)?),
            };
            Ok(format!("{tag}{body}"))
        }
        ShareFormat::Envelope => {
            let data = match payload {
                SharePayload::Note(note) => serde_json::to_value(note)?,
                SharePayload::List(list) => serde_json::to_value(list)?,
            };
            serde_json::to_string(&ShareEnvelope {
                v: u64::from(SHARE_ENVELOPE_VERSION),
                kind: payload.kind(),
                data,
            })
        }
    }
}

/// Decodes legacy tagged framing; `Ok(None)` when `text` carries no tag.
pub(super) fn decode_legacy(text: &str) -> Result<Option<SharePayload>, DecodeError> {
    if let Some(body) = text.strip_prefix(NOTE_TAG) {
        return parse_body(ShareKind::Note, body).map(Some);
    }
    if let Some(body) = text.strip_prefix(LIST_TAG) {
        return parse_body(ShareKind::List, body).map(Some);
    }
    Ok(None)
}

/// Decodes a parsed envelope object.
pub(super) fn decode_envelope(value: Value) -> Result<SharePayload, DecodeError> {
    let envelope: ShareEnvelope = serde_json::from_value(value)
        .map_err(|err| DecodeError::Shape(format!("envelope: {err}")))?;

    if envelope.v == 0 || envelope.v > u64::from(SHARE_ENVELOPE_VERSION) {
        return Err(DecodeError::UnsupportedVersion {
            found: envelope.v,
            supported: SHARE_ENVELOPE_VERSION,
        });
    }

    from_data(envelope.kind, envelope.data)
}

fn parse_body(kind: ShareKind, body: &str) -> Result<SharePayload, DecodeError> {
    let value: Value = serde_json::from_str(body.trim()).map_err(DecodeError::InvalidJson)?;
    from_data(kind, value)
}

fn from_data(kind: ShareKind, data: Value) -> Result<SharePayload, DecodeError> {
    match kind {
        ShareKind::Note => serde_json::from_value(data)
            .map(SharePayload::Note)
            .map_err(|err| DecodeError::Shape(format!("note: {err}"))),
        ShareKind::List => serde_json::from_value(data)
            .map(SharePayload::List)
            .map_err(|err| DecodeError::Shape(format!("list: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        decode_envelope, decode_legacy, encode_share, ShareFormat, SharePayload, SharedList,
        SharedListItem, SharedNote,
    };
    use crate::share::DecodeError;

    fn groceries() -> SharePayload {
        SharePayload::List(SharedList {
            title: "Groceries".to_string(),
            items: vec![SharedListItem {
                text: "Milk".to_string(),
                checked: true,
            }],
        })
    }

    #[test]
    fn legacy_encoding_is_tag_plus_json() {
        let payload = SharePayload::Note(SharedNote {
            title: "Hi".to_string(),
            content: "Body".to_string(),
        });
        let encoded = encode_share(&payload, ShareFormat::Legacy).unwrap();
        assert_eq!(encoded, r#"NOTE:{"title":"Hi","content":"Body"}"#);
    }

    #[test]
    fn envelope_encoding_carries_version_and_kind() {
        let encoded = encode_share(&groceries(), ShareFormat::Envelope).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["kind"], "list");
        assert_eq!(value["data"]["items"][0]["text"], "Milk");

        assert_eq!(decode_envelope(value).unwrap(), groceries());
    }

    #[test]
    fn envelope_from_the_future_is_rejected() {
        let value = serde_json::json!({"v": 2, "kind": "note", "data": {"title": "x"}});
        assert!(matches!(
            decode_envelope(value),
            Err(DecodeError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn untagged_text_is_not_legacy() {
        assert!(decode_legacy("{\"title\":\"x\"}").unwrap().is_none());
        let list = decode_legacy(r#"LIST:{"title":"Groceries","items":[{"text":"Milk","checked":true}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(list, groceries());
    }
}
