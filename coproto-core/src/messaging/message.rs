use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Map, Value};
use rst_common::standard::uuid::Uuid;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::decorators::{PleaseAck, ThreadDecorator};
use super::types::{
    MessageError, MessageType, MESSAGE_ID, MESSAGE_TYPE, PLEASE_ACK_DECORATOR, THREAD_DECORATOR,
};

/// `Message` is a raw `DIDComm` message, a JSON object which always has `@type`
///
/// Typed payloads are decoded from it through [`Message::decode`], the raw form is kept
/// as the unit exchanged through transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty message of the given type with a generated `@id`
    pub fn new(typ: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(MESSAGE_ID.to_string(), Value::from(Uuid::new_v4().to_string()));
        fields.insert(MESSAGE_TYPE.to_string(), Value::from(typ.into()));
        Self(fields)
    }

    /// Builds a message from a payload struct, the payload fields are merged into the
    /// message object
    pub fn build(typ: impl Into<String>, payload: &impl Serialize) -> Result<Self, MessageError> {
        let mut message = Self::new(typ);
        let value =
            serde_json::to_value(payload).map_err(|err| MessageError::JSONError(err.to_string()))?;

        match value {
            Value::Object(fields) => {
                for (key, field) in fields {
                    message.0.insert(key, field);
                }
                Ok(message)
            }
            Value::Null => Ok(message),
            _ => Err(MessageError::InvalidStructure(
                "payload must be a json object".to_string(),
            )),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        match value {
            Value::Object(fields) => {
                if !fields.get(MESSAGE_TYPE).is_some_and(Value::is_string) {
                    return Err(MessageError::MissingField(MESSAGE_TYPE.to_string()));
                }

                Ok(Self(fields))
            }
            _ => Err(MessageError::InvalidStructure(
                "message must be a json object".to_string(),
            )),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(MESSAGE_ID).and_then(Value::as_str)
    }

    pub fn type_str(&self) -> &str {
        self.0
            .get(MESSAGE_TYPE)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn message_type(&self) -> Result<MessageType, MessageError> {
        MessageType::parse(self.type_str())
    }

    /// `protocol` returns the protocol name of the message type, `None` if the type
    /// can't be parsed
    pub fn protocol(&self) -> Option<String> {
        self.message_type()
            .ok()
            .map(|typ| typ.protocol().to_string())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn thread(&self) -> Option<ThreadDecorator> {
        self.0
            .get(THREAD_DECORATOR)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_thread(&mut self, thread: &ThreadDecorator) {
        if let Ok(value) = serde_json::to_value(thread) {
            self.0.insert(THREAD_DECORATOR.to_string(), value);
        }
    }

    /// `thread_id` returns the `~thread.thid` if exists, otherwise the message `@id`
    /// which by convention starts a new thread
    pub fn thread_id(&self) -> Option<String> {
        self.thread()
            .and_then(|thread| thread.thid)
            .or_else(|| self.id().map(String::from))
    }

    pub fn please_ack(&self) -> Option<PleaseAck> {
        self.0
            .get(PLEASE_ACK_DECORATOR)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_please_ack(&mut self, ack: &PleaseAck) {
        if let Ok(value) = serde_json::to_value(ack) {
            self.0.insert(PLEASE_ACK_DECORATOR.to_string(), value);
        }
    }

    /// `ack_message_id` is the id an acknowledgement will be threaded to, only exists
    /// when the message carries a `~please_ack` decorator
    pub fn ack_message_id(&self) -> Option<String> {
        self.please_ack()
            .and_then(|ack| ack.message_id.or_else(|| self.id().map(String::from)))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|err| MessageError::InvalidStructure(err.to_string()))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl ToJSON for Message {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryFrom<Value> for Message {
    type Error = MessageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Message::from_value(value)
    }
}
