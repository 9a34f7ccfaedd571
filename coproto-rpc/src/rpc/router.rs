use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, json, Value};
use rst_common::with_logging::log::warn;
use rst_common::with_tokio::tokio::time::Instant;

use prople_coproto_core::coprotocol::{ConversationIdentity, Delivered, Event};
use prople_coproto_core::messaging::Message;
use prople_coproto_core::pairwise::Pairwise;

use crate::channel::{ChannelError, Connector};

use super::dispatcher::AgentRpc;
use super::future::CallValue;
use super::method::{build_rpc_method, RouterMethod};
use super::params::Params;
use super::types::RpcError;

/// `@type` of the envelope delivering a sub-protocol message
pub const EVENT_TYPE: &str = "https://didcomm.org/prople_rpc/1.0/event";

/// `RoutingBatch` addresses one recipient of a delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct RoutingBatch {
    pub their_verkeys: Vec<String>,
    pub endpoint: String,
    pub my_verkey: Option<String>,
    pub routing_keys: Vec<String>,
}

impl RoutingBatch {
    pub fn new(their_verkey: &str, endpoint: &str, my_verkey: Option<&str>) -> Self {
        Self {
            their_verkeys: vec![their_verkey.to_string()],
            endpoint: endpoint.to_string(),
            my_verkey: my_verkey.map(str::to_string),
            routing_keys: Vec::new(),
        }
    }

    pub fn with_routing_keys(mut self, routing_keys: Vec<String>) -> Self {
        self.routing_keys = routing_keys;
        self
    }
}

impl From<&ConversationIdentity> for RoutingBatch {
    fn from(identity: &ConversationIdentity) -> Self {
        RoutingBatch::new(
            &identity.their_verkey,
            &identity.their_endpoint,
            Some(&identity.my_verkey),
        )
        .with_routing_keys(identity.their_routing_keys.clone())
    }
}

impl From<&Pairwise> for RoutingBatch {
    fn from(pairwise: &Pairwise) -> Self {
        RoutingBatch::from(&ConversationIdentity::from(pairwise))
    }
}

/// `RouterApi` is the message delivery surface of the remote router
///
/// The `start_*` calls register an interest: the router forwards the matching incoming
/// messages to the sub-protocol tunnel until the interest is stopped or its TTL ends
#[async_trait]
pub trait RouterApi: Send + Sync {
    /// Delivers `message`, when `expect_reply` is set waits for the next event up to `timeout`
    async fn send_message(
        &self,
        message: &Message,
        batch: &RoutingBatch,
        expect_reply: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<Event>, RpcError>;

    async fn send_message_batched(
        &self,
        message: &Message,
        batches: Vec<RoutingBatch>,
    ) -> Result<Delivered, RpcError>;

    /// Waits for the next event of the sub-protocol tunnel, `Ok(None)` on timeout
    async fn read_event(&self, timeout: Option<Duration>) -> Result<Option<Event>, RpcError>;

    async fn start_protocol_with_threading(
        &self,
        thid: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn stop_protocol_with_threading(
        &self,
        thid: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn start_protocol_with_threads(
        &self,
        threads: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn stop_protocol_with_threads(
        &self,
        threads: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn start_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;

    async fn stop_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError>;
}

/// TTLs go on the wire in whole seconds, rounded up so a short TTL never becomes zero
fn ttl_param(ttl: Option<Duration>) -> Value {
    ttl.map(|ttl| {
        let rounded = u64::from(ttl.subsec_nanos() > 0);
        json!(ttl.as_secs().saturating_add(rounded))
    })
    .unwrap_or(Value::Null)
}

fn to_param(value: &impl Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::InvalidPayload(err.to_string()))
}

/// Decodes an event envelope, `None` when the envelope is not an event
pub fn decode_event(envelope: &Message) -> Result<Option<Event>, RpcError> {
    if envelope.type_str() != EVENT_TYPE {
        return Ok(None);
    }

    let message = envelope
        .get("message")
        .cloned()
        .ok_or_else(|| RpcError::InvalidPayload("event carries no message".to_string()))
        .and_then(|value| {
            Message::from_value(value).map_err(|err| RpcError::InvalidPayload(err.to_string()))
        })?;

    let key = |name: &str| envelope.get(name).and_then(Value::as_str).map(str::to_string);
    Ok(Some(Event {
        message,
        sender_verkey: key("sender_verkey"),
        recipient_verkey: key("recipient_verkey"),
    }))
}

impl<TConnector> AgentRpc<TConnector>
where
    TConnector: Connector,
{
    async fn router_call(&self, method: RouterMethod, params: Params) -> Result<Option<CallValue>, RpcError> {
        self.call(&build_rpc_method(method), params, true, true).await
    }

    async fn router_call_within(
        &self,
        method: RouterMethod,
        params: Params,
        timeout: Duration,
    ) -> Result<Option<CallValue>, RpcError> {
        self.call_with_timeout(&build_rpc_method(method), params, true, true, timeout)
            .await
    }

    async fn register(&self, method: RouterMethod, params: Params) -> Result<(), RpcError> {
        self.router_call(method, params).await.map(|_| ())
    }
}

#[async_trait]
impl<TConnector> RouterApi for AgentRpc<TConnector>
where
    TConnector: Connector,
{
    async fn send_message(
        &self,
        message: &Message,
        batch: &RoutingBatch,
        expect_reply: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<Event>, RpcError> {
        let params = Params::new()
            .plain("message", message.to_value())
            .plain("their_vk", to_param(&batch.their_verkeys)?)
            .plain("endpoint", json!(batch.endpoint))
            .plain("my_vk", json!(batch.my_verkey))
            .plain("routing_keys", to_param(&batch.routing_keys)?)
            .plain("expect_answer", json!(expect_reply));

        if !expect_reply {
            self.router_call(RouterMethod::SendMessage, params).await?;
            return Ok(None);
        }

        // the delivery and the wait for the reply share one budget
        let budget = timeout.unwrap_or(self.timeouts().reply);
        let started = Instant::now();
        self.router_call_within(
            RouterMethod::SendMessage,
            params,
            budget.min(self.timeouts().call),
        )
        .await?;

        self.read_event(Some(budget.saturating_sub(started.elapsed())))
            .await
    }

    async fn send_message_batched(
        &self,
        message: &Message,
        batches: Vec<RoutingBatch>,
    ) -> Result<Delivered, RpcError> {
        let params = Params::new()
            .plain("message", message.to_value())
            .plain("batches", to_param(&batches)?);

        let value = self
            .router_call(RouterMethod::SendMessageBatched, params)
            .await?
            .ok_or_else(|| RpcError::InvalidPayload("batched delivery returns nothing".to_string()))?
            .into_plain()?;

        serde_json::from_value(value).map_err(|err| RpcError::InvalidPayload(err.to_string()))
    }

    async fn read_event(&self, timeout: Option<Duration>) -> Result<Option<Event>, RpcError> {
        let events = self.events().await?;
        let timeout = timeout.unwrap_or(self.timeouts().reply);
        let stop_at = Instant::now().checked_add(timeout);

        loop {
            let budget = stop_at
                .map(|stop_at| stop_at.saturating_duration_since(Instant::now()))
                .unwrap_or(timeout);
            if budget.is_zero() {
                return Ok(None);
            }

            let envelope = match events.receive(budget).await {
                Ok(envelope) => envelope,
                Err(ChannelError::Timeout) => return Ok(None),
                Err(err) => return Err(RpcError::from(err)),
            };

            match decode_event(&envelope)? {
                Some(event) => return Ok(Some(event)),
                None => warn!("dropping non event envelope: {}", envelope.type_str()),
            }
        }
    }

    async fn start_protocol_with_threading(
        &self,
        thid: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("thid", json!(thid))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StartProtocolWithThreading, params).await
    }

    async fn stop_protocol_with_threading(
        &self,
        thid: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("thid", json!(thid))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StopProtocolWithThreading, params).await
    }

    async fn start_protocol_with_threads(
        &self,
        threads: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("threads", json!(threads))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StartProtocolWithThreads, params).await
    }

    async fn stop_protocol_with_threads(
        &self,
        threads: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("threads", json!(threads))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StopProtocolWithThreads, params).await
    }

    async fn start_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("sender_verkey", json!(sender_verkey))
            .plain("recipient_verkey", json!(recipient_verkey))
            .plain("protocols", json!(protocols))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StartProtocolForP2P, params).await
    }

    async fn stop_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        let params = Params::new()
            .plain("sender_verkey", json!(sender_verkey))
            .plain("recipient_verkey", json!(recipient_verkey))
            .plain("protocols", json!(protocols))
            .plain("ttl", ttl_param(ttl));
        self.register(RouterMethod::StopProtocolForP2P, params).await
    }
}
