use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, json, Value};
use rst_common::standard::uuid::Uuid;
use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio::time::Instant;

use prople_coproto_core::messaging::Message;

use crate::channel::{AddressedTunnel, ChannelError};

use super::types::{RemoteError, RemoteException, RpcError};

/// `@type` of the envelope resolving a pending call
pub const FUTURE_REPLY: &str = "https://didcomm.org/prople_rpc/1.0/future";

pub const FIELD_EXCEPTION: &str = "exception";
pub const FIELD_VALUE: &str = "value";
pub const FIELD_IS_TUPLE: &str = "is_tuple";
pub const FIELD_IS_BYTES: &str = "is_bytes";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct CallId(String);

impl CallId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `CallValue` is the resolved value of a call
#[derive(Debug, Clone, PartialEq)]
pub enum CallValue {
    Plain(Value),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
}

impl CallValue {
    /// The value as JSON, raw bytes are not representable
    pub fn into_plain(self) -> Result<Value, RpcError> {
        match self {
            CallValue::Plain(value) => Ok(value),
            CallValue::Tuple(values) => Ok(Value::Array(values)),
            CallValue::Bytes(_) => Err(RpcError::InvalidPayload(
                "expected a json value, got bytes".to_string(),
            )),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<Value>, RpcError> {
        match self {
            CallValue::Tuple(values) => Ok(values),
            CallValue::Plain(Value::Array(values)) => Ok(values),
            other => Err(RpcError::InvalidPayload(format!(
                "expected a tuple, got {:?}",
                other
            ))),
        }
    }

    /// Encodes the value as the fields of a reply envelope
    pub fn to_reply_fields(&self) -> Value {
        match self {
            CallValue::Plain(value) => json!({
                FIELD_VALUE: value,
                FIELD_IS_TUPLE: false,
                FIELD_IS_BYTES: false,
            }),
            CallValue::Bytes(bytes) => json!({
                FIELD_VALUE: STANDARD.encode(bytes),
                FIELD_IS_TUPLE: false,
                FIELD_IS_BYTES: true,
            }),
            CallValue::Tuple(values) => json!({
                FIELD_VALUE: values,
                FIELD_IS_TUPLE: true,
                FIELD_IS_BYTES: false,
            }),
        }
    }
}

/// `PendingCall` correlates one outgoing call with its reply
///
/// The reply is an envelope of type [`FUTURE_REPLY`] whose `~thread.thid` equals the call
/// id. Envelopes read from the tunnel that do not match are logged and dropped
pub struct PendingCall {
    id: CallId,
    tunnel: Arc<AddressedTunnel>,
    die_at: Option<Instant>,
    expiration_stamp: Option<DateTime<Utc>>,
    resolved: bool,
    value: Option<CallValue>,
    exception: Option<RemoteException>,
}

impl PendingCall {
    pub fn new(tunnel: Arc<AddressedTunnel>, expiration: Option<Duration>) -> Self {
        let expiration_stamp = expiration
            .and_then(|ttl| rst_common::standard::chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        Self {
            id: CallId::generate(),
            tunnel,
            die_at: expiration.and_then(|ttl| Instant::now().checked_add(ttl)),
            expiration_stamp,
            resolved: false,
            value: None,
            exception: None,
        }
    }

    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The `@promise` descriptor embedded in the request envelope
    pub fn promise(&self) -> Value {
        json!({
            "id": self.id.as_str(),
            "channel_address": self.tunnel.address(),
            "expiration_stamp": self.expiration_stamp.map(|stamp| stamp.to_rfc3339()),
        })
    }

    /// Waits for the reply up to `timeout` or the call deadline, whichever comes first
    ///
    /// Returns `Ok(false)` when no reply arrived in time
    pub async fn wait(&mut self, timeout: Duration) -> Result<bool, RpcError> {
        if self.resolved {
            return Ok(true);
        }

        let stop_at = match (Instant::now().checked_add(timeout), self.die_at) {
            (Some(stop_at), Some(die_at)) => Some(stop_at.min(die_at)),
            (stop_at, die_at) => stop_at.or(die_at),
        };

        loop {
            let budget = stop_at
                .map(|stop_at| stop_at.saturating_duration_since(Instant::now()))
                .unwrap_or(timeout);
            if budget.is_zero() {
                return Ok(false);
            }

            let message = match self.tunnel.receive(budget).await {
                Ok(message) => message,
                Err(ChannelError::Timeout) => return Ok(false),
                Err(ChannelError::Codec(reason)) => {
                    warn!("dropping undecodable envelope: {}", reason);
                    continue;
                }
                Err(err) => return Err(RpcError::from(err)),
            };

            if !self.matches(&message) {
                warn!(
                    "dropping envelope {} not correlated with call {}",
                    message.type_str(),
                    self.id.as_str()
                );
                continue;
            }

            self.resolve(&message)?;
            debug!("call {} resolved", self.id.as_str());
            return Ok(true);
        }
    }

    /// The resolved value, fails while the call is pending or when the remote raised
    pub fn get_value(&self) -> Result<CallValue, RpcError> {
        if !self.resolved {
            return Err(RpcError::OperationPending);
        }

        self.throw_exception()?;
        self.value
            .clone()
            .ok_or_else(|| RpcError::InvalidPayload("reply carries no value".to_string()))
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn get_exception(&self) -> Option<RemoteError> {
        self.exception.clone().map(RemoteError::from)
    }

    pub fn throw_exception(&self) -> Result<(), RpcError> {
        match self.get_exception() {
            Some(err) => Err(RpcError::Remote(err)),
            None => Ok(()),
        }
    }

    fn matches(&self, message: &Message) -> bool {
        message.type_str() == FUTURE_REPLY
            && message.thread_id().as_deref() == Some(self.id.as_str())
    }

    fn resolve(&mut self, message: &Message) -> Result<(), RpcError> {
        match message.get(FIELD_EXCEPTION) {
            Some(exception) if !exception.is_null() => {
                let exception: RemoteException = serde_json::from_value(exception.clone())
                    .map_err(|err| RpcError::InvalidPayload(err.to_string()))?;
                self.exception = Some(exception);
            }
            _ => self.value = Some(decode_value(message)?),
        }

        self.resolved = true;
        Ok(())
    }
}

fn decode_value(message: &Message) -> Result<CallValue, RpcError> {
    let flag = |name: &str| {
        message
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let value = message.get(FIELD_VALUE).cloned().unwrap_or(Value::Null);

    if flag(FIELD_IS_BYTES) {
        let encoded = value.as_str().ok_or_else(|| {
            RpcError::InvalidPayload("bytes value is not a string".to_string())
        })?;

        return STANDARD
            .decode(encoded)
            .map(CallValue::Bytes)
            .map_err(|err| RpcError::InvalidPayload(err.to_string()));
    }

    if flag(FIELD_IS_TUPLE) {
        return match value {
            Value::Array(values) => Ok(CallValue::Tuple(values)),
            _ => Err(RpcError::InvalidPayload("tuple value is not an array".to_string())),
        };
    }

    Ok(CallValue::Plain(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::with_tokio::tokio;

    use crate::channel::{memory_connector, Connector, Frame, Link, Multiplexer};
    use crate::testkit::{exception_reply, value_reply};

    const ADDRESS: &str = "rpc-address";

    async fn pending(expiration: Option<Duration>) -> (PendingCall, Link) {
        let (connector, listener) = memory_connector();
        let mux = Arc::new(Multiplexer::start(connector.open().await.unwrap()));
        let server = listener.accept().await.unwrap();
        let tunnel = Arc::new(AddressedTunnel::open(ADDRESS, mux, None).await);
        (PendingCall::new(tunnel, expiration), server)
    }

    async fn push(server: &Link, message: &Message) {
        server
            .outgoing
            .send(Frame::new(ADDRESS, serde_json::to_vec(&message.to_value()).unwrap()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_before_resolution() {
        let (call, _server) = pending(None).await;
        assert_eq!(call.get_value(), Err(RpcError::OperationPending));
        assert!(!call.has_exception());

        let promise = call.promise();
        assert_eq!(promise["id"], call.id().as_str());
        assert_eq!(promise["channel_address"], ADDRESS);
        assert!(promise["expiration_stamp"].is_null())
    }

    #[tokio::test]
    async fn test_resolves_with_matching_reply_only() {
        let (mut call, server) = pending(Some(Duration::from_secs(5))).await;
        assert!(call.promise()["expiration_stamp"].is_string());

        push(&server, &value_reply("another-call", &CallValue::Plain(json!("lost")))).await;
        push(&server, &Message::new("https://didcomm.org/prople_rpc/1.0/event")).await;
        push(
            &server,
            &value_reply(call.id().as_str(), &CallValue::Plain(json!({"did": "did:1"}))),
        )
        .await;

        assert_eq!(call.wait(Duration::from_secs(1)).await, Ok(true));
        assert_eq!(call.get_value(), Ok(CallValue::Plain(json!({"did": "did:1"}))));

        let again = call.wait(Duration::from_millis(10)).await;
        assert_eq!(again, Ok(true))
    }

    #[tokio::test]
    async fn test_resolves_bytes_and_tuples() {
        let (mut call, server) = pending(None).await;
        push(
            &server,
            &value_reply(call.id().as_str(), &CallValue::Bytes(vec![1, 2, 3])),
        )
        .await;
        assert!(call.wait(Duration::from_secs(1)).await.unwrap());
        assert_eq!(call.get_value(), Ok(CallValue::Bytes(vec![1, 2, 3])));

        let (mut call, server) = pending(None).await;
        let tuple = CallValue::Tuple(vec![json!("did:1"), json!("verkey")]);
        push(&server, &value_reply(call.id().as_str(), &tuple)).await;
        assert!(call.wait(Duration::from_secs(1)).await.unwrap());
        assert_eq!(
            call.get_value().unwrap().into_tuple(),
            Ok(vec![json!("did:1"), json!("verkey")])
        )
    }

    #[tokio::test]
    async fn test_remote_exception() {
        let (mut call, server) = pending(None).await;
        push(
            &server,
            &exception_reply(call.id().as_str(), "WalletItemNotFound", Some(212)),
        )
        .await;

        assert!(call.wait(Duration::from_secs(1)).await.unwrap());
        assert!(call.has_exception());
        assert!(matches!(
            call.get_exception(),
            Some(RemoteError::WalletItemNotFound(_))
        ));
        assert!(matches!(
            call.get_value(),
            Err(RpcError::Remote(RemoteError::WalletItemNotFound(_)))
        ));
        assert!(call.throw_exception().is_err())
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (mut call, _server) = pending(None).await;
        assert_eq!(call.wait(Duration::from_millis(30)).await, Ok(false));
        assert_eq!(call.get_value(), Err(RpcError::OperationPending))
    }

    #[tokio::test]
    async fn test_deadline_bounds_wait() {
        let (mut call, _server) = pending(Some(Duration::from_millis(30))).await;

        let started = Instant::now();
        assert_eq!(call.wait(Duration::from_secs(5)).await, Ok(false));
        assert!(started.elapsed() < Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_huge_expiration_never_overflows() {
        let (mut call, _server) = pending(Some(Duration::MAX)).await;
        assert!(call.promise()["expiration_stamp"].is_null());

        let (mut far, _far_server) = pending(Some(Duration::from_secs(1 << 50))).await;
        assert!(far.promise()["expiration_stamp"].is_null());

        assert_eq!(call.wait(Duration::from_millis(20)).await, Ok(false));
        assert_eq!(far.wait(Duration::from_millis(20)).await, Ok(false))
    }

    #[tokio::test]
    async fn test_closed_tunnel_is_connection_error() {
        let (mut call, server) = pending(None).await;
        drop(server);

        let waited = call.wait(Duration::from_secs(1)).await;
        assert!(matches!(waited, Err(RpcError::Connection(_))))
    }
}
