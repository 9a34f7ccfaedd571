use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::standard::uuid::Uuid;

pub const MIME_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct AttachmentData {
    pub json: Value,
}

/// `Attachment` is an embedded payload of a protocol message, used to carry the
/// anoncreds objects (offers, requests, credentials and proofs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "mime-type")]
    pub mime_type: String,

    pub data: AttachmentData,
}

impl Attachment {
    pub fn json(value: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mime_type: MIME_TYPE_JSON.to_string(),
            data: AttachmentData { json: value },
        }
    }

    pub fn value(&self) -> &Value {
        &self.data.json
    }
}

/// Returns the json payload of the first attachment
pub fn first_value(attachments: &[Attachment]) -> Option<&Value> {
    attachments.first().map(Attachment::value)
}
