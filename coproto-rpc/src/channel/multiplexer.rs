use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio::{
    self,
    sync::{mpsc, RwLock},
    task::JoinHandle,
};

use super::types::{ChannelError, Frame, Link};

type Routes = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>>;

/// `Multiplexer` shares one physical link between many addressed subscribers
///
/// A background task reads the link and routes each frame to the subscriber of its
/// address. Frames of unknown addresses are dropped. Once the link is closed every
/// subscriber is closed too
pub struct Multiplexer {
    outgoing: mpsc::Sender<Frame>,
    routes: Routes,
    open: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl Multiplexer {
    pub fn start(link: Link) -> Self {
        let routes: Routes = Arc::new(RwLock::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));

        let pump = tokio::spawn(Self::pump(link.incoming, routes.clone(), open.clone()));

        Self {
            outgoing: link.outgoing,
            routes,
            open,
            pump,
        }
    }

    async fn pump(mut incoming: mpsc::Receiver<Frame>, routes: Routes, open: Arc<AtomicBool>) {
        while let Some(frame) = incoming.recv().await {
            let routes = routes.read().await;
            match routes.get(&frame.address) {
                Some(subscriber) => {
                    if subscriber.send(frame.body).is_err() {
                        debug!("subscriber of {} is gone", frame.address);
                    }
                }
                None => warn!("dropping frame of unknown address: {}", frame.address),
            }
        }

        debug!("link closed, closing every subscriber");
        open.store(false, Ordering::SeqCst);
        routes.write().await.clear();
    }

    /// Routes the frames of `address` to the returned receiver, replacing any previous
    /// subscriber of the same address
    pub async fn subscribe(&self, address: &str) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.is_open() {
            self.routes.write().await.insert(address.to_string(), sender);
        }

        receiver
    }

    pub async fn unsubscribe(&self, address: &str) {
        self.routes.write().await.remove(address);
    }

    pub async fn write(&self, address: &str, body: Vec<u8>) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed("multiplexer is closed".to_string()));
        }

        self.outgoing
            .send(Frame::new(address, body))
            .await
            .map_err(|_| {
                self.open.store(false, Ordering::SeqCst);
                ChannelError::Closed("link is closed".to_string())
            })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }

    /// Stops routing and closes every subscriber
    pub async fn close(&self) {
        self.pump.abort();
        self.open.store(false, Ordering::SeqCst);
        self.routes.write().await.clear();
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
