use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::types::{Family, MessageError};
use crate::messaging::{Message, ProblemReport, PROBLEM_REPORT};
use crate::protocols::attachment::Attachment;
use crate::protocols::notification::{Ack, ACK};
use crate::protocols::registry::{Inbound, MessageRegistry};

pub const FAMILY: Family = Family::new("present-proof", "1.1");

pub const REQUEST_PRESENTATION: &str = "request-presentation";
pub const PRESENTATION: &str = "presentation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RequestPresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "request_presentations~attach")]
    pub request_presentations_attach: Vec<Attachment>,
}

impl RequestPresentation {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(REQUEST_PRESENTATION), self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Presentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "presentations~attach")]
    pub presentations_attach: Vec<Attachment>,
}

impl Presentation {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(PRESENTATION), self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProofMessage {
    Request(RequestPresentation),
    Presentation(Presentation),
    Ack(Ack),
    ProblemReport(ProblemReport),
}

pub fn register(registry: &mut MessageRegistry) {
    registry.register(&FAMILY, REQUEST_PRESENTATION, |message| {
        Ok(Inbound::Proof(ProofMessage::Request(message.decode()?)))
    });

    registry.register(&FAMILY, PRESENTATION, |message| {
        Ok(Inbound::Proof(ProofMessage::Presentation(message.decode()?)))
    });

    registry.register(&FAMILY, ACK, |message| {
        Ok(Inbound::Proof(ProofMessage::Ack(message.decode()?)))
    });

    registry.register(&FAMILY, PROBLEM_REPORT, |message| {
        Ok(Inbound::Proof(ProofMessage::ProblemReport(
            ProblemReport::from_message(message)?,
        )))
    });
}
