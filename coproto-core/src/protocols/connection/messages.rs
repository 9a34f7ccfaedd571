use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;

use crate::messaging::types::{Family, MessageError};
use crate::messaging::{Message, ProblemReport, PROBLEM_REPORT};
use crate::protocols::registry::{Inbound, MessageRegistry};

use super::diddoc::DidDoc;

pub const FAMILY: Family = Family::new("connections", "1.0");

pub const INVITATION: &str = "invitation";
pub const REQUEST: &str = "request";
pub const RESPONSE: &str = "response";

/// `Invitation` is published out of band by the inviter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Invitation {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(rename = "recipientKeys")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,
}

impl Invitation {
    pub fn new(label: &str, connection_key: &str, endpoint: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            recipient_keys: vec![connection_key.to_string()],
            service_endpoint: endpoint.to_string(),
            routing_keys: Vec::new(),
        }
    }

    pub fn connection_key(&self) -> Option<&str> {
        self.recipient_keys.first().map(String::as_str)
    }

    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(INVITATION), self)
    }
}

/// `ConnectionInfo` is the DID and DID document of one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionInfo {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "DIDDoc")]
    pub did_doc: DidDoc,
}

impl ConnectionInfo {
    pub fn new(did: &str, verkey: &str, endpoint: &str) -> Self {
        Self {
            did: did.to_string(),
            did_doc: DidDoc::new(did, verkey, endpoint, Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionRequest {
    #[serde(default)]
    pub label: Option<String>,

    pub connection: ConnectionInfo,
}

impl ConnectionRequest {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(REQUEST), self)
    }
}

/// `ConnectionResponse` carries the [`ConnectionInfo`] of the inviter, signed with the
/// connection key of the invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConnectionResponse {
    #[serde(rename = "connection~sig")]
    pub connection_sig: Value,
}

impl ConnectionResponse {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(RESPONSE), self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionMessage {
    Invitation(Invitation),
    Request(ConnectionRequest),
    Response(ConnectionResponse),
    ProblemReport(ProblemReport),
}

pub fn register(registry: &mut MessageRegistry) {
    registry.register(&FAMILY, INVITATION, |message| {
        Ok(Inbound::Connection(ConnectionMessage::Invitation(
            message.decode()?,
        )))
    });

    registry.register(&FAMILY, REQUEST, |message| {
        Ok(Inbound::Connection(ConnectionMessage::Request(
            message.decode()?,
        )))
    });

    registry.register(&FAMILY, RESPONSE, |message| {
        Ok(Inbound::Connection(ConnectionMessage::Response(
            message.decode()?,
        )))
    });

    registry.register(&FAMILY, PROBLEM_REPORT, |message| {
        Ok(Inbound::Connection(ConnectionMessage::ProblemReport(
            ProblemReport::from_message(message)?,
        )))
    });
}
