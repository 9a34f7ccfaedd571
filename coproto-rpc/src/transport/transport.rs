use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio::{self, time::Instant};

use prople_coproto_core::coprotocol::{
    AckRegistry, CancelToken, CoProtocol, ConversationIdentity, Deadline, Delivered, Event,
    Received, Switched, ThreadId, TransportError,
};
use prople_coproto_core::messaging::Message;
use prople_coproto_core::pairwise::Pairwise;

use crate::rpc::{RouterApi, RoutingBatch, RpcError};

use super::binding::{P2PBinding, ThreadBinding};
use super::types::{Binding, TransportOptions};

/// Runs a router call unless the token fires first
pub async fn guarded<T, F>(cancel: &CancelToken, call: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Aborted),
        result = call => result.map_err(TransportError::from),
    }
}

/// A router wait which ran out of time is a missing reply, not a failure
async fn expiring<F>(call: F) -> Result<Option<Event>, RpcError>
where
    F: Future<Output = Result<Option<Event>, RpcError>>,
{
    match call.await {
        Err(RpcError::Timeout(waited)) => {
            debug!("router wait timed out: {}", waited);
            Ok(None)
        }
        other => other,
    }
}

/// `CoProtocolTransport` is the [`CoProtocol`] implementation over a remote router
///
/// The deadline, the acknowledgement registry and the binding state are owned by this
/// instance, one conversation runs on one transport
pub struct CoProtocolTransport<R, B>
where
    R: RouterApi,
    B: Binding,
{
    router: Arc<R>,
    binding: B,
    options: TransportOptions,
    identity: Option<ConversationIdentity>,
    protocols: Vec<String>,
    deadline: Deadline,
    acks: AckRegistry,
    cancel: CancelToken,
}

impl<R> CoProtocolTransport<R, P2PBinding>
where
    R: RouterApi + 'static,
{
    /// A transport bound to a fixed verkey and endpoint, the identity is given at `setup`
    pub fn by_endpoint(router: Arc<R>, options: TransportOptions) -> Self {
        Self::new(router, P2PBinding::new(), options)
    }

    /// A transport bound to an established relationship, already setup from it
    pub fn by_pairwise(router: Arc<R>, pairwise: Pairwise, options: TransportOptions) -> Self {
        let identity = ConversationIdentity::from(&pairwise);
        let mut transport = Self::new(router, P2PBinding::with_pairwise(pairwise), options);
        transport.setup(identity);
        transport
    }
}

impl<R> CoProtocolTransport<R, ThreadBinding>
where
    R: RouterApi + 'static,
{
    /// A transport keyed by an explicit thread id
    pub fn by_thread(
        router: Arc<R>,
        thid: ThreadId,
        pthid: Option<String>,
        options: TransportOptions,
    ) -> Self {
        Self::new(router, ThreadBinding::new(thid, pthid), options)
    }
}

impl<R, B> CoProtocolTransport<R, B>
where
    R: RouterApi,
    B: Binding,
{
    pub fn new(router: Arc<R>, binding: B, options: TransportOptions) -> Self {
        Self {
            router,
            binding,
            options,
            identity: None,
            protocols: Vec::new(),
            deadline: Deadline::default(),
            acks: AckRegistry::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn options(&self) -> TransportOptions {
        self.options
    }

    pub fn acks(&self) -> &AckRegistry {
        &self.acks
    }

    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    fn bound(&self) -> Result<ConversationIdentity, TransportError> {
        self.identity
            .clone()
            .ok_or_else(|| TransportError::NotSetup("transport is not setup".to_string()))
    }

    fn ensure_active(&self) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Aborted);
        }

        Ok(())
    }

    /// Registers the acknowledgement interest of `message` if it asks for one
    async fn register_ack(&mut self, message: &Message) -> Result<Option<String>, TransportError> {
        let Some(id) = message.ack_message_id() else {
            return Ok(None);
        };

        guarded(
            &self.cancel,
            self.router
                .start_protocol_with_threading(&id, self.deadline.ttl()),
        )
        .await?;

        self.acks.insert(id.clone());
        Ok(Some(id))
    }

    /// Deregisters one acknowledgement interest, a failure leaves it to `stop`
    async fn release_ack(&mut self, id: &str) {
        match self.router.stop_protocol_with_threading(id, None).await {
            Ok(()) => {
                self.acks.remove(id);
            }
            Err(err) => warn!("ack interest {} kept until stop: {}", id, err),
        }
    }

    /// Skips the replies belonging to another thread, reading the next event until one
    /// belongs to this conversation or `stop_at` is reached
    async fn correlated(
        &mut self,
        identity: &ConversationIdentity,
        first: Option<Event>,
        stop_at: Option<Instant>,
    ) -> Result<Option<Event>, TransportError> {
        let mut received = first;
        loop {
            let Some(event) = received.take() else {
                return Ok(None);
            };

            if self.binding.accepts(&event.message) {
                return self.accept(identity, event).map(Some);
            }

            warn!(
                "dropping {} of another thread: {:?}",
                event.message.type_str(),
                event.message.thread_id()
            );

            let budget = stop_at
                .map(|stop_at| stop_at.saturating_duration_since(Instant::now()))
                .unwrap_or(self.options.default_timeout);
            if budget.is_zero() {
                return Ok(None);
            }

            received =
                guarded(&self.cancel, expiring(self.router.read_event(Some(budget)))).await?;
        }
    }

    fn accept(
        &mut self,
        identity: &ConversationIdentity,
        event: Event,
    ) -> Result<Event, TransportError> {
        if self.options.check_verkeys {
            let sender_matches =
                event.sender_verkey.as_deref() == Some(identity.their_verkey.as_str());
            let recipient_matches =
                event.recipient_verkey.as_deref() == Some(identity.my_verkey.as_str());
            if !(sender_matches && recipient_matches) {
                return Err(TransportError::InvalidReply(format!(
                    "unexpected keys, sender: {:?}, recipient: {:?}",
                    event.sender_verkey, event.recipient_verkey
                )));
            }
        }

        if self.options.check_protocols && !self.protocols.is_empty() {
            let protocol = event.message.protocol().unwrap_or_default();
            if !self.protocols.contains(&protocol) {
                return Err(TransportError::InvalidReply(format!(
                    "protocol {} is not expected",
                    event.message.type_str()
                )));
            }
        }

        self.binding.observe(identity, &event.message);
        Ok(event)
    }
}

#[async_trait]
impl<R, B> CoProtocol for CoProtocolTransport<R, B>
where
    R: RouterApi + 'static,
    B: Binding,
{
    fn setup(&mut self, identity: ConversationIdentity) {
        self.identity = Some(identity);
    }

    fn identity(&self) -> Option<&ConversationIdentity> {
        self.identity.as_ref()
    }

    fn bind_cancel(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    fn thread_id(&self) -> Option<String> {
        self.binding.thread_id()
    }

    async fn start(
        &mut self,
        protocols: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<(), TransportError> {
        let identity = self.bound()?;
        self.ensure_active()?;

        self.protocols = protocols;
        self.deadline.start(ttl);

        let router: &dyn RouterApi = self.router.as_ref();
        let registered = self
            .binding
            .register(router, &identity, &self.protocols, ttl);
        guarded(&self.cancel, registered).await?;

        debug!("transport started, protocols: {:?}", self.protocols);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.deadline.clear();

        let Some(identity) = self.identity.clone() else {
            return Ok(());
        };

        let mut stopped = Ok(());
        let pending = self.acks.drain();
        if !pending.is_empty() {
            debug!("flushing {} ack interests", pending.len());
            if let Err(err) = self.router.stop_protocol_with_threads(pending, None).await {
                warn!("unable to flush ack interests: {}", err);
                stopped = Err(TransportError::from(err));
            }
        }

        let router: &dyn RouterApi = self.router.as_ref();
        if let Err(err) = self.binding.unregister(router, &identity, &self.protocols).await {
            warn!("unable to unregister the conversation: {}", err);
            stopped = stopped.and(Err(TransportError::from(err)));
        }

        stopped
    }

    async fn switch(&mut self, mut message: Message) -> Result<Switched, TransportError> {
        let identity = self.bound()?;
        self.ensure_active()?;

        let Some(timeout) = self.deadline.budget(self.options.default_timeout) else {
            debug!("switch skipped, conversation expired");
            return Ok((false, None));
        };

        let stop_at = Instant::now().checked_add(timeout);
        self.binding.stamp(&mut message);
        let ack = self.register_ack(&message).await?;

        let batch = RoutingBatch::from(&identity);
        let delivered = guarded(
            &self.cancel,
            expiring(
                self.router
                    .send_message(&message, &batch, true, Some(timeout)),
            ),
        )
        .await;

        if let Some(id) = ack {
            if !matches!(delivered, Err(TransportError::Aborted)) {
                self.release_ack(&id).await;
            }
        }

        match self.correlated(&identity, delivered?, stop_at).await? {
            Some(event) => Ok((true, Some(event.message))),
            None => Ok((false, None)),
        }
    }

    async fn send(&mut self, mut message: Message) -> Result<(), TransportError> {
        let identity = self.bound()?;
        self.ensure_active()?;

        self.binding.stamp(&mut message);
        self.register_ack(&message).await?;

        let batch = RoutingBatch::from(&identity);
        guarded(
            &self.cancel,
            self.router.send_message(&message, &batch, false, None),
        )
        .await
        .map(|_| ())
    }

    async fn send_many(
        &mut self,
        mut message: Message,
        recipients: Vec<Pairwise>,
    ) -> Result<Delivered, TransportError> {
        self.bound()?;
        self.ensure_active()?;

        self.binding.stamp(&mut message);
        let batches = recipients.iter().map(RoutingBatch::from).collect();
        guarded(
            &self.cancel,
            self.router.send_message_batched(&message, batches),
        )
        .await
    }

    async fn get_one(&mut self) -> Result<Received, TransportError> {
        let identity = self.bound()?;
        self.ensure_active()?;

        let Some(timeout) = self.deadline.budget(self.options.default_timeout) else {
            return Ok((None, None, None));
        };

        let stop_at = Instant::now().checked_add(timeout);
        let received =
            guarded(&self.cancel, expiring(self.router.read_event(Some(timeout)))).await?;

        match self.correlated(&identity, received, stop_at).await? {
            Some(event) => Ok((
                Some(event.message),
                event.sender_verkey,
                event.recipient_verkey,
            )),
            None => Ok((None, None, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use rst_common::with_tokio::tokio;

    use prople_coproto_core::machine::{Classified, Conversation, Role, Step};
    use prople_coproto_core::messaging::decorators::{PleaseAck, ThreadDecorator};
    use prople_coproto_core::pairwise::{Me, TheirEndpoint};
    use prople_coproto_core::protocols::ping::FAMILY;

    use crate::testkit::ScriptedRouter;

    const PING: &str = "https://didcomm.org/trust_ping/1.0/ping";
    const PING_RESPONSE: &str = "https://didcomm.org/trust_ping/1.0/ping_response";

    mock!(
        FakeRouter{}

        #[async_trait]
        impl RouterApi for FakeRouter {
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
    );

    fn identity() -> ConversationIdentity {
        ConversationIdentity::new("my-vk", "their-vk", "http://their")
    }

    fn reply(typ: &str) -> Event {
        Event {
            message: Message::new(typ),
            sender_verkey: Some("their-vk".to_string()),
            recipient_verkey: Some("my-vk".to_string()),
        }
    }

    fn threaded(typ: &str, thid: &str) -> Event {
        let mut event = reply(typ);
        event.message.set_thread(&ThreadDecorator::with_thid(thid));
        event
    }

    fn protocols() -> Vec<String> {
        vec!["trust_ping".to_string(), "notification".to_string()]
    }

    fn with_p2p_registration(router: &mut MockFakeRouter) {
        router
            .expect_start_protocol_for_p2p()
            .withf(|sender, recipient, _, _| sender == "my-vk" && recipient == "their-vk")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        router
            .expect_stop_protocol_for_p2p()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
    }

    async fn started(
        router: MockFakeRouter,
        options: TransportOptions,
        ttl: Option<Duration>,
    ) -> CoProtocolTransport<MockFakeRouter, P2PBinding> {
        let mut transport = CoProtocolTransport::by_endpoint(Arc::new(router), options);
        transport.setup(identity());
        transport.start(protocols(), ttl).await.unwrap();
        transport
    }

    #[tokio::test]
    async fn test_io_before_setup_is_misuse() {
        let router = MockFakeRouter::new();
        let mut transport =
            CoProtocolTransport::by_endpoint(Arc::new(router), TransportOptions::default());

        let switched = transport.switch(Message::new(PING)).await;
        assert!(matches!(switched, Err(TransportError::NotSetup(_))));

        let started = transport.start(protocols(), None).await;
        assert!(matches!(started, Err(TransportError::NotSetup(_))));

        let received = transport.get_one().await;
        assert!(matches!(received, Err(TransportError::NotSetup(_))))
    }

    #[tokio::test]
    async fn test_no_io_after_ttl() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router.expect_send_message().times(0);
        router.expect_read_event().times(0);
        router.expect_stop_protocol_with_threads().times(0);

        let mut transport = started(
            router,
            TransportOptions::default(),
            Some(Duration::from_millis(20)),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let switched = transport.switch(Message::new(PING)).await;
        assert_eq!(switched, Ok((false, None)));

        let received = transport.get_one().await;
        assert_eq!(received, Ok((None, None, None)));

        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_ack_interest_registered_once_and_released() {
        let mut message = Message::new(PING);
        message.set_please_ack(&PleaseAck::on_receipt());
        let id = message.id().unwrap().to_string();
        let (registered, released) = (id.clone(), id.clone());

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_start_protocol_with_threading()
            .withf(move |thid, _| thid == registered.as_str())
            .times(1)
            .returning(|_, _| Ok(()));
        router
            .expect_send_message()
            .withf(|_, batch, expect_reply, _| {
                *expect_reply && batch.their_verkeys == vec!["their-vk".to_string()]
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Some(reply("https://didcomm.org/notification/1.0/ack"))));
        router
            .expect_stop_protocol_with_threading()
            .withf(move |thid, _| thid == released.as_str())
            .times(1)
            .returning(|_, _| Ok(()));
        router.expect_stop_protocol_with_threads().times(0);

        let mut transport = started(router, TransportOptions::default(), None).await;
        let (ok, reply) = transport.switch(message).await.unwrap();
        assert!(ok);
        assert_eq!(
            reply.map(|message| message.type_str().to_string()),
            Some("https://didcomm.org/notification/1.0/ack".to_string())
        );
        assert!(transport.acks().is_empty());

        transport.stop().await.unwrap();
        assert!(transport.acks().is_empty())
    }

    #[tokio::test]
    async fn test_ack_interest_released_on_timeout() {
        let mut message = Message::new(PING);
        message.set_please_ack(&PleaseAck::on_receipt());

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_start_protocol_with_threading()
            .times(1)
            .returning(|_, _| Ok(()));
        router
            .expect_send_message()
            .times(1)
            .returning(|_, _, _, _| Ok(None));
        router
            .expect_stop_protocol_with_threading()
            .times(1)
            .returning(|_, _| Ok(()));
        router.expect_stop_protocol_with_threads().times(0);

        let mut transport = started(router, TransportOptions::default(), None).await;
        assert_eq!(transport.switch(message).await, Ok((false, None)));
        assert!(transport.acks().is_empty());
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_connection_error_is_propagated() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .returning(|_, _, _, _| Err(RpcError::Connection("gone".to_string())));

        let mut transport = started(router, TransportOptions::default(), None).await;
        let switched = transport.switch(Message::new(PING)).await;
        assert!(matches!(switched, Err(TransportError::Connection(_))));
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_verkey_check() {
        let options = TransportOptions {
            check_verkeys: true,
            ..TransportOptions::default()
        };

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        let mut replies = vec![
            reply(PING_RESPONSE),
            Event {
                sender_verkey: Some("intruder-vk".to_string()),
                ..reply(PING_RESPONSE)
            },
        ];
        router
            .expect_send_message()
            .times(2)
            .returning(move |_, _, _, _| Ok(replies.pop()));

        let mut transport = started(router, options, None).await;

        let intruded = transport.switch(Message::new(PING)).await;
        assert!(matches!(intruded, Err(TransportError::InvalidReply(_))));

        let (ok, _) = transport.switch(Message::new(PING)).await.unwrap();
        assert!(ok);
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_verkeys_unchecked_by_default() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router.expect_send_message().returning(|_, _, _, _| {
            Ok(Some(Event::new(Message::new(PING_RESPONSE))))
        });

        let mut transport = started(router, TransportOptions::default(), None).await;
        let (ok, _) = transport.switch(Message::new(PING)).await.unwrap();
        assert!(ok);
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_protocol_check() {
        let offer = "https://didcomm.org/issue-credential/1.1/offer-credential";

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .returning(move |_, _, _, _| Ok(Some(reply(offer))));

        let mut transport = started(router, TransportOptions::default(), None).await;
        let switched = transport.switch(Message::new(PING)).await;
        assert!(matches!(switched, Err(TransportError::InvalidReply(_))));
        transport.stop().await.unwrap();

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .returning(move |_, _, _, _| Ok(Some(reply(offer))));

        let options = TransportOptions {
            check_protocols: false,
            ..TransportOptions::default()
        };
        let mut transport = started(router, options, None).await;
        let (ok, reply) = transport.switch(Message::new(PING)).await.unwrap();
        assert!(ok);
        assert_eq!(reply.unwrap().type_str(), offer);
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_send_many_builds_one_batch_per_recipient() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message_batched()
            .withf(|_, batches| {
                batches.len() == 2
                    && batches[0].their_verkeys == vec!["a-vk".to_string()]
                    && batches[1].routing_keys == vec!["mediator-vk".to_string()]
            })
            .times(1)
            .returning(|_, batches| {
                Ok(batches
                    .into_iter()
                    .map(|batch| (true, batch.endpoint))
                    .collect())
            });

        let mut b = TheirEndpoint::new("b-vk", "http://b");
        b.routing_keys = vec!["mediator-vk".to_string()];
        let recipients = vec![
            Pairwise::new(Me::new("did:me", "my-vk"), TheirEndpoint::new("a-vk", "http://a")),
            Pairwise::new(Me::new("did:me", "my-vk"), b),
        ];

        let mut transport = started(router, TransportOptions::default(), None).await;
        let delivered = transport
            .send_many(Message::new(PING), recipients)
            .await
            .unwrap();
        assert_eq!(
            delivered,
            vec![(true, "http://a".to_string()), (true, "http://b".to_string())]
        );
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_by_pairwise_is_setup() {
        let pairwise = Pairwise::new(
            Me::new("did:me", "my-vk"),
            TheirEndpoint::new("their-vk", "http://their"),
        );

        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);

        let mut transport =
            CoProtocolTransport::by_pairwise(Arc::new(router), pairwise.clone(), TransportOptions::default());
        assert_eq!(transport.identity(), Some(&identity()));
        assert_eq!(transport.binding().pairwise(), Some(&pairwise));

        transport.start(protocols(), None).await.unwrap();
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_thread_ordering_and_watermark() {
        let router = Arc::new(ScriptedRouter::new());
        for order in [3, 1, 2] {
            let mut message = Message::new(PING_RESPONSE);
            message.set_thread(&ThreadDecorator {
                thid: Some("thread-1".to_string()),
                sender_order: Some(order),
                ..Default::default()
            });
            router.push(Event::new(message));
        }

        let mut transport = CoProtocolTransport::by_thread(
            router.clone(),
            ThreadId::from("thread-1"),
            Some("parent-1".to_string()),
            TransportOptions::default(),
        );
        transport.setup(identity());
        transport.start(protocols(), None).await.unwrap();

        for _ in 0..3 {
            let (ok, _) = transport.switch(Message::new(PING)).await.unwrap();
            assert!(ok);
        }

        let threads: Vec<ThreadDecorator> = router
            .sent()
            .iter()
            .map(|message| message.thread().unwrap())
            .collect();

        let orders: Vec<Option<u64>> = threads.iter().map(|thread| thread.sender_order).collect();
        assert_eq!(orders, vec![Some(0), Some(1), Some(2)]);
        assert!(threads
            .iter()
            .all(|thread| thread.thid.as_deref() == Some("thread-1")
                && thread.pthid.as_deref() == Some("parent-1")));

        let watermark = |thread: &ThreadDecorator| {
            thread
                .received_orders
                .as_ref()
                .and_then(|orders| orders.get("their-vk").copied())
        };
        assert_eq!(watermark(&threads[0]), None);
        assert_eq!(watermark(&threads[1]), Some(3));
        assert_eq!(watermark(&threads[2]), Some(3));
        assert_eq!(
            transport.binding().context().received_orders().get("their-vk"),
            Some(&3)
        );

        transport.stop().await.unwrap();
        assert_eq!(
            router.calls(),
            vec![
                "start_protocol_with_threading:thread-1".to_string(),
                "send_message".to_string(),
                "send_message".to_string(),
                "send_message".to_string(),
                "stop_protocol_with_threading:thread-1".to_string(),
            ]
        )
    }

    #[tokio::test]
    async fn test_get_one_returns_keys() {
        let router = Arc::new(ScriptedRouter::new());
        router.push(reply(PING));

        let mut transport = CoProtocolTransport::by_endpoint(router.clone(), TransportOptions::default());
        transport.setup(identity());
        transport.start(protocols(), Some(Duration::from_secs(5))).await.unwrap();

        let (message, sender, recipient) = transport.get_one().await.unwrap();
        assert_eq!(message.unwrap().type_str(), PING);
        assert_eq!(sender.as_deref(), Some("their-vk"));
        assert_eq!(recipient.as_deref(), Some("my-vk"));
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_abort_interrupts_switch_and_stop_flushes_acks() {
        let router = Arc::new(ScriptedRouter::new());
        let options = TransportOptions {
            default_timeout: Duration::from_secs(10),
            ..TransportOptions::default()
        };

        let mut transport = CoProtocolTransport::by_endpoint(router.clone(), options);
        let token = CancelToken::new();
        transport.bind_cancel(token.clone());
        transport.setup(identity());
        transport.start(protocols(), None).await.unwrap();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut message = Message::new(PING);
        message.set_please_ack(&PleaseAck::on_receipt());
        let switched = tokio::time::timeout(Duration::from_secs(2), transport.switch(message))
            .await
            .unwrap();
        assert_eq!(switched, Err(TransportError::Aborted));
        assert_eq!(transport.acks().len(), 1);

        let again = transport.send(Message::new(PING)).await;
        assert_eq!(again, Err(TransportError::Aborted));

        transport.stop().await.unwrap();
        assert!(transport.acks().is_empty());
        assert!(router
            .calls()
            .contains(&"stop_protocol_with_threads:1".to_string()));
        canceller.await.unwrap()
    }

    #[tokio::test]
    async fn test_router_timeout_is_a_missing_reply() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .times(1)
            .returning(|_, _, _, _| Err(RpcError::Timeout("send_message".to_string())));
        router
            .expect_read_event()
            .times(1)
            .returning(|_| Err(RpcError::Timeout("read_event".to_string())));

        let mut transport = started(router, TransportOptions::default(), None).await;
        assert_eq!(transport.switch(Message::new(PING)).await, Ok((false, None)));
        assert_eq!(transport.get_one().await, Ok((None, None, None)));
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_huge_ttl_is_unbounded() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .times(1)
            .returning(|_, _, _, _| Ok(Some(reply(PING_RESPONSE))));

        let mut transport = started(router, TransportOptions::default(), Some(Duration::MAX)).await;
        let (ok, _) = transport.switch(Message::new(PING)).await.unwrap();
        assert!(ok);
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_replies_of_another_thread_are_skipped() {
        let router = Arc::new(ScriptedRouter::new());
        router.push(threaded(PING_RESPONSE, "some-other-thread"));
        router.push(threaded(PING_RESPONSE, "thread-1"));

        let mut transport = CoProtocolTransport::by_thread(
            router.clone(),
            ThreadId::from("thread-1"),
            None,
            TransportOptions::default(),
        );
        transport.setup(identity());
        transport
            .start(protocols(), Some(Duration::from_millis(300)))
            .await
            .unwrap();

        let (ok, reply) = transport.switch(Message::new(PING)).await.unwrap();
        assert!(ok);
        assert_eq!(
            reply.and_then(|message| message.thread()).and_then(|thread| thread.thid),
            Some("thread-1".to_string())
        );

        router.push(threaded(PING_RESPONSE, "some-other-thread"));
        assert_eq!(transport.switch(Message::new(PING)).await, Ok((false, None)));
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_pairwise_replies_follow_the_first_thread() {
        let mut router = MockFakeRouter::new();
        with_p2p_registration(&mut router);
        router
            .expect_send_message()
            .times(1)
            .returning(|_, _, _, _| Ok(Some(threaded(PING_RESPONSE, "some-other-thread"))));
        router
            .expect_read_event()
            .times(1)
            .returning(|_| Ok(Some(threaded(PING_RESPONSE, "thread-1"))));

        let mut transport = started(router, TransportOptions::default(), None).await;
        assert_eq!(transport.binding().thid(), None);

        let mut message = Message::new(PING);
        message.set_thread(&ThreadDecorator::with_thid("thread-1"));
        let (ok, reply) = transport.switch(message).await.unwrap();
        assert!(ok);
        assert_eq!(reply.and_then(|message| message.thread_id()), Some("thread-1".to_string()));
        assert_eq!(transport.binding().thid(), Some("thread-1"));
        transport.stop().await.unwrap()
    }

    #[tokio::test]
    async fn test_conversation_reports_the_transport_thread() {
        let router = Arc::new(ScriptedRouter::new());
        let transport = CoProtocolTransport::by_thread(
            router.clone(),
            ThreadId::from("thread-1"),
            None,
            TransportOptions::default(),
        );

        let mut conversation =
            Conversation::new(transport, Role::Follower, FAMILY, "ping_not_accepted")
                .with_ttl(Some(Duration::from_millis(50)));
        conversation.begin(identity()).await.unwrap();
        assert_eq!(conversation.thread_id(), Some("thread-1"));

        let step = conversation
            .switch(Message::new(PING), |_| Classified::<()>::Unexpected)
            .await
            .unwrap();
        let Step::Failed(report) = step else {
            panic!("an unanswered turn must fail");
        };
        assert_eq!(report.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(conversation.thread_id(), Some("thread-1"));
        assert_eq!(router.sent()[0].thread_id().as_deref(), Some("thread-1"))
    }
}
