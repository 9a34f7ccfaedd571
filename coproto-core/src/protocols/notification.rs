use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::decorators::ThreadDecorator;
use crate::messaging::types::{Family, MessageError};
use crate::messaging::Message;

use super::registry::{Inbound, MessageRegistry};

pub const FAMILY: Family = Family::new("notification", "1.0");
pub const ACK: &str = "ack";

pub const STATUS_OK: &str = "OK";
pub const STATUS_PENDING: &str = "PENDING";

/// `Ack` acknowledges a message of the same thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Ack {
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    STATUS_OK.to_string()
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Builds the ack message of the given family threaded to `thid`
    pub fn to_message(&self, family: &Family, thid: Option<String>) -> Result<Message, MessageError> {
        let mut message = Message::build(family.message_type(ACK), self)?;
        if let Some(thid) = thid {
            message.set_thread(&ThreadDecorator::with_thid(thid));
        }

        Ok(message)
    }
}

pub fn register(registry: &mut MessageRegistry) {
    registry.register(&FAMILY, ACK, |message| {
        Ok(Inbound::Ack(message.decode()?))
    });
}
