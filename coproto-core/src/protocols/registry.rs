use std::collections::HashMap;

use rst_common::with_logging::log::debug;

use crate::messaging::types::{Family, MessageError};
use crate::messaging::Message;

use super::connection::ConnectionMessage;
use super::credential::CredentialMessage;
use super::notification::Ack;
use super::ping::PingMessage;
use super::proof::ProofMessage;

/// `Inbound` is the decoded form of an incoming message
///
/// Every registered `(protocol, name)` pair decodes into one of the typed variants,
/// anything else is kept as [`Inbound::Generic`]
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connection(ConnectionMessage),
    Credential(CredentialMessage),
    Proof(ProofMessage),
    Ack(Ack),
    Ping(PingMessage),
    Generic(Message),
}

pub type Decoder = fn(&Message) -> Result<Inbound, MessageError>;

/// `MessageRegistry` maps a `(protocol, name)` pair to the decoder of its payload
///
/// The registry is an explicit object, populated by the `register` function of each
/// protocol module and passed to whoever needs to decode incoming messages
#[derive(Clone, Default)]
pub struct MessageRegistry {
    decoders: HashMap<(String, String), Decoder>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry populated with every supported protocol family
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::notification::register(&mut registry);
        super::ping::register(&mut registry);
        super::connection::register(&mut registry);
        super::credential::register(&mut registry);
        super::proof::register(&mut registry);
        registry
    }

    pub fn register(&mut self, family: &Family, name: &str, decoder: Decoder) {
        self.decoders
            .insert((family.protocol.to_string(), name.to_string()), decoder);
    }

    pub fn is_registered(&self, protocol: &str, name: &str) -> bool {
        self.decoders
            .contains_key(&(protocol.to_string(), name.to_string()))
    }

    /// Decodes a message into its typed variant
    ///
    /// Unregistered or unparsable types degrade to [`Inbound::Generic`]. A registered type
    /// whose payload doesn't match its shape is an error
    pub fn decode(&self, message: &Message) -> Result<Inbound, MessageError> {
        let Ok(typ) = message.message_type() else {
            debug!("unparsable message type: {}", message.type_str());
            return Ok(Inbound::Generic(message.clone()));
        };

        let key = (typ.protocol().to_string(), typ.name().to_string());
        match self.decoders.get(&key) {
            Some(decoder) => decoder(message),
            None => Ok(Inbound::Generic(message.clone())),
        }
    }
}
