use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_logging::log::{debug, info, warn};
use rst_common::with_tokio::tokio::{
    self,
    sync::{Mutex, RwLock},
};

use prople_coproto_core::messaging::Message;

use crate::channel::{AddressedTunnel, ChannelError, Connector, Multiplexer, Packer};
use crate::config::Connection;

use super::future::{CallValue, PendingCall};
use super::method::{requires_encryption, RpcMethod};
use super::params::Params;
use super::types::RpcError;

/// Address the remote agent sends its context message to
pub const CONTROL_ADDRESS: &str = "control";
pub const CONTEXT_TYPE: &str = "https://didcomm.org/prople_rpc/1.0/context";

pub const PROXY_DECORATOR: &str = "~proxy";
pub const PROXY_REVERSE: &str = "reverse";
pub const PROXY_SUB_PROTOCOL: &str = "sub-protocol";

pub const FIELD_PROMISE: &str = "@promise";
pub const FIELD_PARAMS: &str = "params";

/// `RpcTimeouts` bounds every wait of the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    pub call: Duration,
    pub handshake: Duration,
    pub reply: Duration,
}

impl From<&Connection> for RpcTimeouts {
    fn from(conf: &Connection) -> Self {
        Self {
            call: conf.timeout(),
            handshake: conf.handshake_timeout(),
            reply: conf.reply_timeout(),
        }
    }
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self::from(&Connection::default())
    }
}

struct Session {
    mux: Arc<Multiplexer>,
    rpc: Arc<AddressedTunnel>,
    events: Arc<AddressedTunnel>,
}

/// `AgentRpc` is the RPC dispatcher bound to one remote agent
///
/// It owns the physical connection and its two tunnels. Calls are serialized, one
/// request is in flight on the RPC tunnel at a time
pub struct AgentRpc<TConnector>
where
    TConnector: Connector,
{
    connector: TConnector,
    packer: Option<Arc<dyn Packer>>,
    timeouts: RpcTimeouts,
    session: RwLock<Option<Session>>,
    calls: Mutex<()>,
}

impl<TConnector> AgentRpc<TConnector>
where
    TConnector: Connector,
{
    pub fn new(connector: TConnector, packer: Option<Arc<dyn Packer>>, timeouts: RpcTimeouts) -> Self {
        Self {
            connector,
            packer,
            timeouts,
            session: RwLock::new(None),
            calls: Mutex::new(()),
        }
    }

    pub fn timeouts(&self) -> RpcTimeouts {
        self.timeouts
    }

    pub fn connector(&self) -> &TConnector {
        &self.connector
    }

    /// Opens the connection and replays the handshake, replacing any previous session
    pub async fn open(&self) -> Result<(), RpcError> {
        let session = self.handshake().await?;
        let previous = self.session.write().await.replace(session);
        if let Some(previous) = previous {
            previous.mux.close().await;
        }

        Ok(())
    }

    pub async fn close(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            session.mux.close().await;
            info!("agent connection closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.mux.is_open())
            .unwrap_or(false)
    }

    /// The tunnel where the sub-protocol events are delivered
    pub async fn events(&self) -> Result<Arc<AddressedTunnel>, RpcError> {
        self.session
            .read()
            .await
            .as_ref()
            .filter(|session| session.mux.is_open())
            .map(|session| session.events.clone())
            .ok_or(RpcError::NotConnected)
    }

    /// Calls `method` on the remote agent
    ///
    /// When the connection is dropped and `reconnect_on_error` is set, the connection is
    /// reopened and the call retried exactly once. If the retry fails on the connection
    /// again, the first connection error is returned
    pub async fn call(
        &self,
        method: &RpcMethod,
        params: Params,
        wait_response: bool,
        reconnect_on_error: bool,
    ) -> Result<Option<CallValue>, RpcError> {
        self.call_with_timeout(
            method,
            params,
            wait_response,
            reconnect_on_error,
            self.timeouts.call,
        )
        .await
    }

    /// Same as [`AgentRpc::call`], waiting for the reply up to `timeout` instead of the
    /// configured call timeout
    pub async fn call_with_timeout(
        &self,
        method: &RpcMethod,
        params: Params,
        wait_response: bool,
        reconnect_on_error: bool,
        timeout: Duration,
    ) -> Result<Option<CallValue>, RpcError> {
        let _serialized = self.calls.lock().await;

        match self.call_once(method, &params, wait_response, timeout).await {
            Err(err) if err.is_connection() && reconnect_on_error => {
                warn!("call {} lost the connection, reconnecting: {}", method, err);
                if let Err(reconnect_err) = self.open().await {
                    warn!("reconnect failed: {}", reconnect_err);
                    return Err(err);
                }

                match self.call_once(method, &params, wait_response, timeout).await {
                    Err(retry_err) if retry_err.is_connection() => {
                        warn!("retry of {} failed: {}", method, retry_err);
                        Err(err)
                    }
                    retried => retried,
                }
            }
            called => called,
        }
    }

    async fn call_once(
        &self,
        method: &RpcMethod,
        params: &Params,
        wait_response: bool,
        timeout: Duration,
    ) -> Result<Option<CallValue>, RpcError> {
        let rpc = self.rpc_tunnel().await?;
        let encrypt = requires_encryption(method);

        let mut request = Message::new(method.as_str());
        request.set(FIELD_PARAMS, params.encode()?);

        if !wait_response {
            rpc.post(&request, encrypt).await?;
            debug!("call {} posted without waiting", method);
            return Ok(None);
        }

        let mut pending = PendingCall::new(rpc.clone(), Some(timeout));
        request.set(FIELD_PROMISE, pending.promise());
        rpc.post(&request, encrypt).await?;

        if !pending.wait(timeout).await? {
            return Err(RpcError::Timeout(method.to_string()));
        }

        pending.get_value().map(Some)
    }

    async fn rpc_tunnel(&self) -> Result<Arc<AddressedTunnel>, RpcError> {
        self.session
            .read()
            .await
            .as_ref()
            .filter(|session| session.mux.is_open())
            .map(|session| session.rpc.clone())
            .ok_or(RpcError::NotConnected)
    }

    async fn handshake(&self) -> Result<Session, RpcError> {
        let mut link = self.connector.open().await?;

        let frame = match tokio::time::timeout(self.timeouts.handshake, link.incoming.recv()).await
        {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(RpcError::Connection(
                    "connection closed during handshake".to_string(),
                ))
            }
            Err(_) => return Err(RpcError::Timeout("context message".to_string())),
        };

        if frame.address != CONTROL_ADDRESS {
            return Err(RpcError::Setup(format!(
                "expected the context message, got a frame for {}",
                frame.address
            )));
        }

        let context: Value = serde_json::from_slice(&frame.body)
            .map_err(|err| RpcError::from(ChannelError::Codec(err.to_string())))?;
        let rpc_address = proxy_address(&context, PROXY_REVERSE)?;
        let events_address = proxy_address(&context, PROXY_SUB_PROTOCOL)?;

        let mux = Arc::new(Multiplexer::start(link));
        let rpc = AddressedTunnel::open(&rpc_address, mux.clone(), self.packer.clone()).await;
        let events = AddressedTunnel::open(&events_address, mux.clone(), self.packer.clone()).await;

        info!(
            "agent connection opened, rpc: {}, events: {}",
            rpc_address, events_address
        );

        Ok(Session {
            mux,
            rpc: Arc::new(rpc),
            events: Arc::new(events),
        })
    }
}

fn proxy_address(context: &Value, id: &str) -> Result<String, RpcError> {
    context
        .get(PROXY_DECORATOR)
        .and_then(Value::as_array)
        .and_then(|proxies| {
            proxies
                .iter()
                .find(|proxy| proxy.get("id").and_then(Value::as_str) == Some(id))
        })
        .and_then(|proxy| proxy.get("address"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RpcError::Setup(format!("context message has no {} address", id)))
}
