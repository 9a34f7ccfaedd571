//! `prople-coproto-rpc` runs `DIDComm` coprotocols through a remote agent
//!
//! The client side owns one multiplexed connection to the agent:
//!
//! - `channel`, the physical link, its multiplexer and the addressed tunnels
//! - `rpc`, pending calls and the dispatcher with its single reconnect and retry
//! - `transport`, the [`prople_coproto_core::coprotocol::CoProtocol`] implementations
//!   over the agent router
//! - `wallet`, the wallet collaborators implemented as remote calls
//! - `config`, the TOML configuration
//!
//! [`Agent`] ties them together
use std::sync::Arc;
use std::time::Duration;

use prople_coproto_core::coprotocol::ThreadId;
use prople_coproto_core::pairwise::Pairwise;

pub mod channel;
pub mod common;
pub mod config;
pub mod rpc;
pub mod transport;
pub mod wallet;

#[cfg(test)]
mod testkit;

use channel::{Connector, Packer};
use config::Config;
use rpc::{AgentRpc, RpcError, RpcTimeouts};
use transport::{CoProtocolTransport, P2PBinding, ThreadBinding, TransportOptions};
use wallet::RemoteWallet;

/// `Agent` is the client of one remote agent
pub struct Agent<TConnector>
where
    TConnector: Connector,
{
    rpc: Arc<AgentRpc<TConnector>>,
    config: Config,
}

impl<TConnector> Agent<TConnector>
where
    TConnector: Connector + 'static,
{
    pub fn new(connector: TConnector, packer: Option<Arc<dyn Packer>>, config: Config) -> Self {
        let timeouts = RpcTimeouts::from(config.connection());
        Self {
            rpc: Arc::new(AgentRpc::new(connector, packer, timeouts)),
            config,
        }
    }

    /// Builds the agent and opens its connection
    pub async fn connect(
        connector: TConnector,
        packer: Option<Arc<dyn Packer>>,
        config: Config,
    ) -> Result<Self, RpcError> {
        let agent = Self::new(connector, packer, config);
        agent.open().await?;
        Ok(agent)
    }

    pub async fn open(&self) -> Result<(), RpcError> {
        self.rpc.open().await
    }

    pub async fn close(&self) {
        self.rpc.close().await
    }

    pub async fn is_open(&self) -> bool {
        self.rpc.is_open().await
    }

    pub fn rpc(&self) -> Arc<AgentRpc<TConnector>> {
        self.rpc.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wallet(&self) -> RemoteWallet<TConnector> {
        RemoteWallet::new(self.rpc.clone())
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions::from(&self.config)
    }

    /// TTL given to the protocol runs created by the embedding application
    pub fn default_ttl(&self) -> Duration {
        self.config.transport().default_ttl()
    }

    pub fn transport_by_endpoint(&self) -> CoProtocolTransport<AgentRpc<TConnector>, P2PBinding> {
        CoProtocolTransport::by_endpoint(self.rpc.clone(), self.transport_options())
    }

    pub fn transport_by_pairwise(
        &self,
        pairwise: Pairwise,
    ) -> CoProtocolTransport<AgentRpc<TConnector>, P2PBinding> {
        CoProtocolTransport::by_pairwise(self.rpc.clone(), pairwise, self.transport_options())
    }

    pub fn transport_by_thread(
        &self,
        thid: ThreadId,
        pthid: Option<String>,
    ) -> CoProtocolTransport<AgentRpc<TConnector>, ThreadBinding> {
        CoProtocolTransport::by_thread(self.rpc.clone(), thid, pthid, self.transport_options())
    }
}
