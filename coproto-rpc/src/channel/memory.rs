use std::sync::atomic::{AtomicUsize, Ordering};

use rst_common::standard::async_trait::async_trait;
use rst_common::with_tokio::tokio::sync::{mpsc, Mutex};

use super::types::{ChannelError, Connector, Frame, Link};

const LINK_CAPACITY: usize = 64;

/// Creates a connected in-process connector and its listener
///
/// Every [`Connector::open`] hands the server half of a fresh link to the listener
pub fn memory_connector() -> (MemoryConnector, MemoryListener) {
    let (accept, incoming) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            accept,
            opened: AtomicUsize::new(0),
        },
        MemoryListener {
            incoming: Mutex::new(incoming),
        },
    )
}

pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<Link>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    /// How many links were opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self) -> Result<Link, ChannelError> {
        let (client_tx, server_rx) = mpsc::channel::<Frame>(LINK_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel::<Frame>(LINK_CAPACITY);

        let server = Link {
            outgoing: server_tx,
            incoming: server_rx,
        };

        self.accept
            .send(server)
            .map_err(|_| ChannelError::Closed("memory listener is gone".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Link {
            outgoing: client_tx,
            incoming: client_rx,
        })
    }
}

pub struct MemoryListener {
    incoming: Mutex<mpsc::UnboundedReceiver<Link>>,
}

impl MemoryListener {
    pub async fn accept(&self) -> Option<Link> {
        self.incoming.lock().await.recv().await
    }
}
