use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_tokio::tokio::{
    self,
    sync::{mpsc, Mutex},
};

use prople_coproto_core::messaging::Message;

use super::multiplexer::Multiplexer;
use super::types::{ChannelError, Packer};

/// `AddressedTunnel` is one logical sub-channel of the multiplexed connection
pub struct AddressedTunnel {
    address: String,
    mux: Arc<Multiplexer>,
    inbox: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    packer: Option<Arc<dyn Packer>>,
}

impl AddressedTunnel {
    pub async fn open(
        address: &str,
        mux: Arc<Multiplexer>,
        packer: Option<Arc<dyn Packer>>,
    ) -> Self {
        let inbox = mux.subscribe(address).await;
        Self {
            address: address.to_string(),
            mux,
            inbox: Mutex::new(inbox),
            packer,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.mux.is_open()
    }

    /// Writes the message to the tunnel address, sealed through the packer when
    /// `encrypt` is set
    pub async fn post(&self, message: &Message, encrypt: bool) -> Result<(), ChannelError> {
        let value = match (encrypt, &self.packer) {
            (false, _) => message.to_value(),
            (true, Some(packer)) => packer.pack(message.to_value()).await?,
            (true, None) => {
                return Err(ChannelError::Crypto(
                    "encryption requested without a packer".to_string(),
                ))
            }
        };

        let body = serde_json::to_vec(&value).map_err(|err| ChannelError::Codec(err.to_string()))?;
        self.mux.write(&self.address, body).await
    }

    /// Waits for the next message routed to this tunnel, sealed envelopes are unpacked
    pub async fn receive(&self, timeout: Duration) -> Result<Message, ChannelError> {
        let mut inbox = self.inbox.lock().await;
        let body = match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                return Err(ChannelError::Closed(format!(
                    "tunnel {} is closed",
                    self.address
                )))
            }
            Err(_) => return Err(ChannelError::Timeout),
        };

        let mut value: Value =
            serde_json::from_slice(&body).map_err(|err| ChannelError::Codec(err.to_string()))?;

        if let Some(packer) = &self.packer {
            if packer.is_packed(&value) {
                value = packer.unpack(value).await?;
            }
        }

        Message::from_value(value).map_err(|err| ChannelError::Codec(err.to_string()))
    }
}
