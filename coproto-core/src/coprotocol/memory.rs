use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::{self, sync::mpsc};

use crate::messaging::Message;
use crate::pairwise::Pairwise;

use super::cancel::CancelToken;
use super::deadline::Deadline;
use super::types::{
    CoProtocol, ConversationIdentity, Delivered, Event, Received, Switched, TransportError,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `MemoryCoProtocol` is an in-process coprotocol endpoint
///
/// Two endpoints created by [`MemoryCoProtocol::pair`] exchange messages directly,
/// following the same deadline and cancellation rules as the remote transports. It is
/// used to run both roles of a protocol inside one process
pub struct MemoryCoProtocol {
    identity: Option<ConversationIdentity>,
    outbox: mpsc::UnboundedSender<Event>,
    inbox: mpsc::UnboundedReceiver<Event>,
    deadline: Deadline,
    protocols: Vec<String>,
    cancel: CancelToken,
    default_timeout: Duration,
}

impl MemoryCoProtocol {
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        (Self::new(tx_b, rx_a), Self::new(tx_a, rx_b))
    }

    fn new(outbox: mpsc::UnboundedSender<Event>, inbox: mpsc::UnboundedReceiver<Event>) -> Self {
        Self {
            identity: None,
            outbox,
            inbox,
            deadline: Deadline::default(),
            protocols: Vec::new(),
            cancel: CancelToken::new(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    fn bound(&self) -> Result<&ConversationIdentity, TransportError> {
        self.identity
            .as_ref()
            .ok_or_else(|| TransportError::NotSetup("memory coprotocol is not setup".to_string()))
    }

    fn deliver(&self, message: Message) -> Result<(), TransportError> {
        let identity = self.bound()?;
        let event = Event {
            message,
            sender_verkey: Some(identity.my_verkey.clone()),
            recipient_verkey: Some(identity.their_verkey.clone()),
        };

        self.outbox
            .send(event)
            .map_err(|_| TransportError::Connection("memory peer is gone".to_string()))
    }

    async fn wait(&mut self, timeout: Duration) -> Result<Option<Event>, TransportError> {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            received = tokio::time::timeout(timeout, self.inbox.recv()) => match received {
                Ok(Some(event)) => Ok(Some(event)),
                Ok(None) => Err(TransportError::Connection("memory peer is gone".to_string())),
                Err(_) => Ok(None),
            }
        }
    }
}

#[async_trait]
impl CoProtocol for MemoryCoProtocol {
    fn setup(&mut self, identity: ConversationIdentity) {
        self.identity = Some(identity);
    }

    fn identity(&self) -> Option<&ConversationIdentity> {
        self.identity.as_ref()
    }

    fn bind_cancel(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    async fn start(
        &mut self,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), TransportError> {
        self.bound()?;
        self.protocols = protocols;
        self.deadline.start(ttl);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.deadline.clear();
        Ok(())
    }

    async fn switch(&mut self, message: Message) -> Result<Switched, TransportError> {
        self.bound()?;
        if self.cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        let Some(timeout) = self.deadline.budget(self.default_timeout) else {
            debug!("memory switch skipped, conversation expired");
            return Ok((false, None));
        };

        self.deliver(message)?;
        match self.wait(timeout).await? {
            Some(event) => Ok((true, Some(event.message))),
            None => Ok((false, None)),
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        self.deliver(message)
    }

    async fn send_many(
        &mut self,
        message: Message,
        recipients: Vec<Pairwise>,
    ) -> Result<Delivered, TransportError> {
        self.bound()?;

        let mut delivered = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let ok = self.deliver(message.clone()).is_ok();
            delivered.push((ok, recipient.their.endpoint));
        }

        Ok(delivered)
    }

    async fn get_one(&mut self) -> Result<Received, TransportError> {
        self.bound()?;
        if self.cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        let Some(timeout) = self.deadline.budget(self.default_timeout) else {
            return Ok((None, None, None));
        };

        match self.wait(timeout).await? {
            Some(event) => Ok((
                Some(event.message),
                event.sender_verkey,
                event.recipient_verkey,
            )),
            None => Ok((None, None, None)),
        }
    }
}
