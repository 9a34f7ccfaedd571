use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::decorators::ThreadDecorator;
use crate::messaging::types::{Family, MessageError};
use crate::messaging::Message;

use super::registry::{Inbound, MessageRegistry};

pub const FAMILY: Family = Family::new("trust_ping", "1.0");
pub const PING: &str = "ping";
pub const PING_RESPONSE: &str = "ping_response";

fn response_requested_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Ping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default = "response_requested_default")]
    pub response_requested: bool,
}

impl Ping {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::build(FAMILY.message_type(PING), self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PingResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl PingResponse {
    pub fn to_message(&self, thid: Option<String>) -> Result<Message, MessageError> {
        let mut message = Message::build(FAMILY.message_type(PING_RESPONSE), self)?;
        if let Some(thid) = thid {
            message.set_thread(&ThreadDecorator::with_thid(thid));
        }

        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PingMessage {
    Ping(Ping),
    Response(PingResponse),
}

pub fn register(registry: &mut MessageRegistry) {
    registry.register(&FAMILY, PING, |message| {
        Ok(Inbound::Ping(PingMessage::Ping(message.decode()?)))
    });

    registry.register(&FAMILY, PING_RESPONSE, |message| {
        Ok(Inbound::Ping(PingMessage::Response(message.decode()?)))
    });
}
