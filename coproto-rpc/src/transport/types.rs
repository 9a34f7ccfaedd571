use std::time::Duration;

use rst_common::standard::async_trait::async_trait;

use prople_coproto_core::coprotocol::ConversationIdentity;
use prople_coproto_core::messaging::Message;

use crate::config::Config;
use crate::rpc::{RouterApi, RpcError};

/// `TransportOptions` are the reply checks and the default wait of a transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportOptions {
    /// Rejects replies whose keys differ from the bound identity
    pub check_verkeys: bool,

    /// Rejects replies whose protocol is outside the started whitelist
    pub check_protocols: bool,

    /// Wait of one turn when the conversation has no TTL
    pub default_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TransportOptions {
    fn from(conf: &Config) -> Self {
        Self {
            check_verkeys: conf.transport().check_verkeys(),
            check_protocols: conf.transport().check_protocols(),
            default_timeout: conf.connection().reply_timeout(),
        }
    }
}

/// `Binding` is how a transport addresses the remote router
#[async_trait]
pub trait Binding: Send {
    /// Registers the interest forwarding the conversation messages to this client
    async fn register(
        &mut self,
        router: &dyn RouterApi,
        identity: &ConversationIdentity,
        protocols: &[String],
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn unregister(
        &mut self,
        router: &dyn RouterApi,
        identity: &ConversationIdentity,
        protocols: &[String],
    ) -> Result<(), RpcError>;

    /// Decorates an outgoing message
    fn stamp(&mut self, _message: &mut Message) {}

    /// Whether `reply` belongs to the conversation, replies of another thread are skipped
    fn accepts(&self, _reply: &Message) -> bool {
        true
    }

    /// Records an accepted reply
    fn observe(&mut self, _identity: &ConversationIdentity, _reply: &Message) {}

    /// The thread imposed on every outgoing message, if any
    fn thread_id(&self) -> Option<String> {
        None
    }
}
