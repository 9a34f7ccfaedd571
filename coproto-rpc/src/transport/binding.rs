use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;

use prople_coproto_core::coprotocol::{ConversationIdentity, ThreadContext, ThreadId};
use prople_coproto_core::messaging::Message;
use prople_coproto_core::pairwise::Pairwise;

use crate::rpc::{RouterApi, RpcError};

use super::types::Binding;

/// `P2PBinding` registers the conversation by the verkey pair of both parties
///
/// The thread of the conversation is learned from the first outgoing message. From then
/// on, replies threaded elsewhere are not accepted. Replies without `~thread` are kept
#[derive(Debug, Clone, Default)]
pub struct P2PBinding {
    pairwise: Option<Pairwise>,
    thid: Option<String>,
}

impl P2PBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairwise(pairwise: Pairwise) -> Self {
        Self {
            pairwise: Some(pairwise),
            thid: None,
        }
    }

    pub fn pairwise(&self) -> Option<&Pairwise> {
        self.pairwise.as_ref()
    }

    /// The conversation thread, once a message was sent
    pub fn thid(&self) -> Option<&str> {
        self.thid.as_deref()
    }
}

#[async_trait]
impl Binding for P2PBinding {
    async fn register(
        &mut self,
        router: &dyn RouterApi,
        identity: &ConversationIdentity,
        protocols: &[String],
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.thid = None;
        router
            .start_protocol_for_p2p(
                &identity.my_verkey,
                &identity.their_verkey,
                protocols.to_vec(),
                ttl,
            )
            .await
    }

    async fn unregister(
        &mut self,
        router: &dyn RouterApi,
        identity: &ConversationIdentity,
        protocols: &[String],
    ) -> Result<(), RpcError> {
        router
            .stop_protocol_for_p2p(
                &identity.my_verkey,
                &identity.their_verkey,
                protocols.to_vec(),
                None,
            )
            .await
    }

    fn stamp(&mut self, message: &mut Message) {
        if self.thid.is_none() {
            self.thid = message
                .thread_id()
                .or_else(|| message.id().map(String::from));
        }
    }

    fn accepts(&self, reply: &Message) -> bool {
        let replied = reply.thread().and_then(|thread| thread.thid);
        match (self.thid.as_deref(), replied) {
            (Some(thid), Some(replied)) => thid == replied,
            _ => true,
        }
    }
}

/// `ThreadBinding` registers the conversation by its thread id and orders every
/// outgoing message through a [`ThreadContext`]
///
/// Only replies carrying the same `~thread.thid` are accepted. The counterpart is keyed
/// by its verkey in `received_orders`
#[derive(Debug, Clone)]
pub struct ThreadBinding {
    context: ThreadContext,
}

impl ThreadBinding {
    pub fn new(thid: ThreadId, pthid: Option<String>) -> Self {
        Self {
            context: ThreadContext::new(thid, pthid),
        }
    }

    pub fn context(&self) -> &ThreadContext {
        &self.context
    }
}

#[async_trait]
impl Binding for ThreadBinding {
    async fn register(
        &mut self,
        router: &dyn RouterApi,
        _identity: &ConversationIdentity,
        _protocols: &[String],
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        router
            .start_protocol_with_threading(self.context.thid().as_str(), ttl)
            .await
    }

    async fn unregister(
        &mut self,
        router: &dyn RouterApi,
        _identity: &ConversationIdentity,
        _protocols: &[String],
    ) -> Result<(), RpcError> {
        router
            .stop_protocol_with_threading(self.context.thid().as_str(), None)
            .await
    }

    fn stamp(&mut self, message: &mut Message) {
        message.set_thread(&self.context.next_decorator());
    }

    fn accepts(&self, reply: &Message) -> bool {
        reply
            .thread()
            .and_then(|thread| thread.thid)
            .is_some_and(|thid| thid == self.context.thid().as_str())
    }

    fn observe(&mut self, identity: &ConversationIdentity, reply: &Message) {
        let Some(thread) = reply.thread() else {
            return;
        };

        let counterpart = identity.their_verkey.as_str();
        if let Some(watermark) = self.context.observe(counterpart, &thread) {
            debug!(
                "thread {} watermark of {}: {}",
                self.context.thid().as_str(),
                counterpart,
                watermark
            );
        }
    }

    fn thread_id(&self) -> Option<String> {
        Some(self.context.thid().as_str().to_string())
    }
}
