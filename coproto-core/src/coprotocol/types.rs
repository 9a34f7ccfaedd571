use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::messaging::Message;
use crate::pairwise::Pairwise;

use super::cancel::CancelToken;

/// `TransportError` provides all error types a coprotocol transport may return
///
/// Timeouts are not errors, a timed out turn is reported as `(false, None)`
#[derive(Debug, PartialEq, Error, Clone)]
pub enum TransportError {
    #[error("pending operation misuse: {0}")]
    NotSetup(String),

    #[error("aborted by user")]
    Aborted,

    #[error("invalid reply: {0}")]
    InvalidReply(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("message error: {0}")]
    Message(String),
}

/// `ConversationIdentity` is the addressing triple a transport binds to, it is
/// immutable for the life of one transport run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ConversationIdentity {
    pub their_verkey: String,
    pub their_endpoint: String,
    pub their_routing_keys: Vec<String>,
    pub my_verkey: String,
}

impl ConversationIdentity {
    pub fn new(my_verkey: &str, their_verkey: &str, their_endpoint: &str) -> Self {
        Self {
            their_verkey: their_verkey.to_string(),
            their_endpoint: their_endpoint.to_string(),
            their_routing_keys: Vec::new(),
            my_verkey: my_verkey.to_string(),
        }
    }

    pub fn with_routing_keys(mut self, routing_keys: Vec<String>) -> Self {
        self.their_routing_keys = routing_keys;
        self
    }
}

impl From<&Pairwise> for ConversationIdentity {
    fn from(pairwise: &Pairwise) -> Self {
        Self {
            their_verkey: pairwise.their.verkey.clone(),
            their_endpoint: pairwise.their.endpoint.clone(),
            their_routing_keys: pairwise.their.routing_keys.clone(),
            my_verkey: pairwise.me.verkey.clone(),
        }
    }
}

/// `Event` is an incoming message delivered to this side of a conversation together
/// with the keys it was packed with
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub message: Message,
    pub sender_verkey: Option<String>,
    pub recipient_verkey: Option<String>,
}

impl Event {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            sender_verkey: None,
            recipient_verkey: None,
        }
    }
}

/// The result of one turn: `ok` flag and the reply if any
pub type Switched = (bool, Option<Message>);

/// The result of a passive receive: message, sender key and recipient key
pub type Received = (Option<Message>, Option<String>, Option<String>);

/// The result of a fan-out, one `(ok, description)` per recipient
pub type Delivered = Vec<(bool, String)>;

/// `CoProtocol` is the conversation contract used by every protocol state machine
///
/// Lifecycle: `setup` binds the addressing, `start` registers the whitelist and the TTL,
/// the turn methods (`switch`, `send`, `send_many`, `get_one`) may be called until `stop`.
/// Calling any I/O method before `setup` is a misuse and fails with
/// [`TransportError::NotSetup`]
#[async_trait]
pub trait CoProtocol: Send {
    fn setup(&mut self, identity: ConversationIdentity);
    fn identity(&self) -> Option<&ConversationIdentity>;

    /// `bind_cancel` replaces the token checked at every blocking boundary
    fn bind_cancel(&mut self, token: CancelToken);

    async fn start(
        &mut self,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), TransportError>;

    async fn stop(&mut self) -> Result<(), TransportError>;

    /// `switch` sends the message and waits for exactly one correlated reply
    async fn switch(&mut self, message: Message) -> Result<Switched, TransportError>;

    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    async fn send_many(
        &mut self,
        message: Message,
        recipients: Vec<Pairwise>,
    ) -> Result<Delivered, TransportError>;

    /// `get_one` waits for the next incoming message without sending anything
    async fn get_one(&mut self) -> Result<Received, TransportError>;

    /// The thread every outgoing message is bound to, when the transport imposes one
    fn thread_id(&self) -> Option<String> {
        None
    }
}
