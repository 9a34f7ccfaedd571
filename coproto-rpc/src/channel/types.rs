use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};
use rst_common::with_tokio::tokio::sync::mpsc;

/// Key whose presence marks a sealed envelope
pub const PROTECTED_FIELD: &str = "protected";

#[derive(Debug, PartialEq, Error, Clone)]
pub enum ChannelError {
    #[error("channel closed: {0}")]
    Closed(String),

    #[error("channel timeout")]
    Timeout,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("codec error: {0}")]
    Codec(String),
}

/// `Frame` is the unit exchanged through a physical connection, `address` is the logical
/// sub-channel the body belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub address: String,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(address: &str, body: Vec<u8>) -> Self {
        Self {
            address: address.to_string(),
            body,
        }
    }
}

/// `Link` is an opened physical connection, seen as a pair of frame queues
///
/// Dropping the link closes the connection
#[derive(Debug)]
pub struct Link {
    pub outgoing: mpsc::Sender<Frame>,
    pub incoming: mpsc::Receiver<Frame>,
}

/// `Connector` knows how to open a physical connection to the remote agent
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Link, ChannelError>;
}

/// `Packer` is the envelope encryption collaborator
///
/// The packer is bound to one point to point relationship, whether the envelope is
/// authenticated or anonymous is its own decision
#[async_trait]
pub trait Packer: Send + Sync {
    async fn pack(&self, message: Value) -> Result<Value, ChannelError>;
    async fn unpack(&self, envelope: Value) -> Result<Value, ChannelError>;

    fn is_packed(&self, value: &Value) -> bool {
        value.get(PROTECTED_FIELD).is_some()
    }
}
