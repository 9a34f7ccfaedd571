use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::types::{Family, MessageError};
use crate::messaging::{Message, ProblemReport, PROBLEM_REPORT};
use crate::protocols::attachment::Attachment;
use crate::protocols::notification::{Ack, ACK};
use crate::protocols::registry::{Inbound, MessageRegistry};

pub const FAMILY: Family = Family::new("issue-credential", "1.1");

pub const OFFER_CREDENTIAL: &str = "offer-credential";
pub const REQUEST_CREDENTIAL: &str = "request-credential";
pub const ISSUE_CREDENTIAL: &str = "issue-credential";
pub const CREDENTIAL_PREVIEW: &str = "credential-preview";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PreviewAttribute {
    pub name: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub value: String,
}

impl PreviewAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: None,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub preview_type: String,

    pub attributes: Vec<PreviewAttribute>,
}

impl CredentialPreview {
    pub fn new(attributes: Vec<PreviewAttribute>) -> Self {
        Self {
            preview_type: FAMILY.message_type(CREDENTIAL_PREVIEW),
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct OfferCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<CredentialPreview>,

    #[serde(rename = "offers~attach")]
    pub offers_attach: Vec<Attachment>,
}

impl OfferCredential {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(OFFER_CREDENTIAL), self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RequestCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "requests~attach")]
    pub requests_attach: Vec<Attachment>,
}

impl RequestCredential {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(REQUEST_CREDENTIAL), self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct IssueCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "credentials~attach")]
    pub credentials_attach: Vec<Attachment>,
}

impl IssueCredential {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(ISSUE_CREDENTIAL), self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialMessage {
    Offer(OfferCredential),
    Request(RequestCredential),
    Issue(IssueCredential),
    Ack(Ack),
    ProblemReport(ProblemReport),
}

pub fn register(registry: &mut MessageRegistry) {
    registry.register(&FAMILY, OFFER_CREDENTIAL, |message| {
        Ok(Inbound::Credential(CredentialMessage::Offer(message.decode()?)))
    });

    registry.register(&FAMILY, REQUEST_CREDENTIAL, |message| {
        Ok(Inbound::Credential(CredentialMessage::Request(message.decode()?)))
    });

    registry.register(&FAMILY, ISSUE_CREDENTIAL, |message| {
        Ok(Inbound::Credential(CredentialMessage::Issue(message.decode()?)))
    });

    registry.register(&FAMILY, ACK, |message| {
        Ok(Inbound::Credential(CredentialMessage::Ack(message.decode()?)))
    });

    registry.register(&FAMILY, PROBLEM_REPORT, |message| {
        Ok(Inbound::Credential(CredentialMessage::ProblemReport(
            ProblemReport::from_message(message)?,
        )))
    });
}
