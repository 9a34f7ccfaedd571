use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use prople_coproto_core::coprotocol::TransportError;

use crate::channel::ChannelError;

pub const CLASS_WALLET_ITEM_NOT_FOUND: &str = "WalletItemNotFound";
pub const CLASS_WALLET_ITEM_ALREADY_EXISTS: &str = "WalletItemAlreadyExists";
pub const CLASS_INVALID_STRUCTURE: &str = "CommonInvalidStructure";
pub const CLASS_DID_ALREADY_EXISTS: &str = "DidAlreadyExistsError";

pub const CODE_INVALID_STRUCTURE: i64 = 113;
pub const CODE_WALLET_ITEM_NOT_FOUND: i64 = 212;
pub const CODE_WALLET_ITEM_ALREADY_EXISTS: i64 = 213;
pub const CODE_DID_ALREADY_EXISTS: i64 = 600;

/// `RemoteException` is the exception payload reported by the remote agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RemoteException {
    pub class_name: String,

    #[serde(default)]
    pub printable: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

/// `RemoteError` is a remote exception mapped to the known taxonomy
#[derive(Debug, PartialEq, Error, Clone)]
pub enum RemoteError {
    #[error("wallet item not found: {0}")]
    WalletItemNotFound(String),

    #[error("wallet item already exists: {0}")]
    WalletItemAlreadyExists(String),

    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    #[error("did already exists: {0}")]
    DidAlreadyExists(String),

    #[error("remote context exception {class_name}: {message}")]
    Context { class_name: String, message: String },
}

impl From<RemoteException> for RemoteError {
    fn from(exception: RemoteException) -> Self {
        let message = exception.printable;
        match (exception.class_name.as_str(), exception.code) {
            (CLASS_WALLET_ITEM_NOT_FOUND, _) | (_, Some(CODE_WALLET_ITEM_NOT_FOUND)) => {
                RemoteError::WalletItemNotFound(message)
            }
            (CLASS_WALLET_ITEM_ALREADY_EXISTS, _) | (_, Some(CODE_WALLET_ITEM_ALREADY_EXISTS)) => {
                RemoteError::WalletItemAlreadyExists(message)
            }
            (CLASS_INVALID_STRUCTURE, _) | (_, Some(CODE_INVALID_STRUCTURE)) => {
                RemoteError::InvalidStructure(message)
            }
            (CLASS_DID_ALREADY_EXISTS, _) | (_, Some(CODE_DID_ALREADY_EXISTS)) => {
                RemoteError::DidAlreadyExists(message)
            }
            (class_name, _) => RemoteError::Context {
                class_name: class_name.to_string(),
                message,
            },
        }
    }
}

/// `RpcError` provides all error types of the RPC layer
#[derive(Debug, PartialEq, Error, Clone)]
pub enum RpcError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    #[error("timeout waiting for: {0}")]
    Timeout(String),

    #[error("operation still pending")]
    OperationPending,

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("setup error: {0}")]
    Setup(String),
}

impl RpcError {
    /// Whether the error means the physical connection is gone
    pub fn is_connection(&self) -> bool {
        matches!(self, RpcError::Connection(_) | RpcError::NotConnected)
    }
}

impl From<ChannelError> for RpcError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed(reason) => RpcError::Connection(reason),
            ChannelError::Timeout => RpcError::Timeout("channel".to_string()),
            other => RpcError::InvalidPayload(other.to_string()),
        }
    }
}

impl From<RpcError> for TransportError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(remote) => TransportError::Remote(remote.to_string()),
            RpcError::InvalidPayload(reason) => TransportError::Message(reason),
            other => TransportError::Connection(other.to_string()),
        }
    }
}
