//! `rpc` is the request/reply layer over the addressed tunnels
//!
//! [`AgentRpc`] builds each request envelope with a [`PendingCall`] descriptor and the
//! type tagged parameters, posts it on the RPC tunnel and waits for the correlated
//! future reply. Dropped connections are recovered with a single reconnect and retry.
//! [`RouterApi`] is the message delivery surface used by the coprotocol transports
pub mod method;
pub mod params;
pub mod types;

pub use method::{build_rpc_method, RpcMethod};
pub use params::{Param, Params};
pub use types::{RemoteError, RemoteException, RpcError};

mod dispatcher;
pub use dispatcher::{
    AgentRpc, RpcTimeouts, CONTEXT_TYPE, CONTROL_ADDRESS, FIELD_PROMISE, PROXY_DECORATOR,
    PROXY_REVERSE, PROXY_SUB_PROTOCOL,
};

mod future;
pub use future::{CallId, CallValue, PendingCall, FUTURE_REPLY};

mod router;
pub use router::{decode_event, RouterApi, RoutingBatch, EVENT_TYPE};
