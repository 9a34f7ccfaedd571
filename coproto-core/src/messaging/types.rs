use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

pub const DIDCOMM_DOC_URI: &str = "https://didcomm.org/";

pub const MESSAGE_ID: &str = "@id";
pub const MESSAGE_TYPE: &str = "@type";

pub const THREAD_DECORATOR: &str = "~thread";
pub const PLEASE_ACK_DECORATOR: &str = "~please_ack";

/// `MessageError` provides all error types relate with message parsing and decoding
#[derive(Debug, PartialEq, Error, Clone)]
pub enum MessageError {
    #[error("invalid message type: {0}")]
    InvalidType(String),

    #[error("missing message field: {0}")]
    MissingField(String),

    #[error("invalid message structure: {0}")]
    InvalidStructure(String),

    #[error("json error: {0}")]
    JSONError(String),
}

/// `MessageType` is a parsed `@type` URI
///
/// Both formats below are supported:
///
/// ```text
/// https://didcomm.org/connections/1.0/request
/// did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/connections/1.0/request
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct MessageType {
    doc_uri: String,
    protocol: String,
    version: String,
    name: String,
}

impl MessageType {
    pub fn parse(value: &str) -> Result<Self, MessageError> {
        let mut parts = value.rsplitn(4, '/');
        let name = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let protocol = parts.next().unwrap_or_default();
        let doc_uri = parts.next().unwrap_or_default();

        if [name, version, protocol, doc_uri].iter().any(|part| part.is_empty()) {
            return Err(MessageError::InvalidType(value.to_string()));
        }

        Ok(Self {
            doc_uri: format!("{}/", doc_uri),
            protocol: protocol.to_string(),
            version: version.to_string(),
            name: name.to_string(),
        })
    }

    pub fn doc_uri(&self) -> &str {
        &self.doc_uri
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            self.doc_uri, self.protocol, self.version, self.name
        )
    }
}

/// `Family` describes one protocol family, used to build the message types
/// belongs to the family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    pub doc_uri: &'static str,
    pub protocol: &'static str,
    pub version: &'static str,
}

impl Family {
    pub const fn new(protocol: &'static str, version: &'static str) -> Self {
        Self {
            doc_uri: DIDCOMM_DOC_URI,
            protocol,
            version,
        }
    }

    pub fn message_type(&self, name: &str) -> String {
        format!("{}{}/{}/{}", self.doc_uri, self.protocol, self.version, name)
    }

    pub fn contains(&self, typ: &MessageType) -> bool {
        typ.protocol() == self.protocol
    }
}
