use std::sync::Arc;
use std::time::Duration;

use rst_common::with_logging::log::{debug, info, warn};

use crate::coprotocol::{CancelToken, CoProtocol, ConversationIdentity, TransportError};
use crate::messaging::decorators::ThreadDecorator;
use crate::messaging::types::Family;
use crate::messaging::{Message, ProblemReport};
use crate::protocols::{Inbound, MessageRegistry};

use super::types::{Classified, Outcome, Role, StateMachineError, Step};

const TIMEOUT_EXPLAIN: &str = "timeout occurred while waiting for the counterpart reply";

/// `Conversation` is the state of one protocol run: role, TTL, problem report, abort
/// handle and the transport it owns
///
/// The first outgoing message of a conversation defines its thread, unless the thread
/// was adopted from the message which started it. Every later message is threaded to it
pub struct Conversation<T: CoProtocol> {
    role: Role,
    family: Family,
    default_code: &'static str,
    protocols: Vec<String>,
    ttl: Option<Duration>,
    registry: Arc<MessageRegistry>,
    cancel: CancelToken,
    problem_report: Option<ProblemReport>,
    thread_id: Option<String>,
    transport: T,
}

impl<T: CoProtocol> Conversation<T> {
    pub fn new(mut transport: T, role: Role, family: Family, default_code: &'static str) -> Self {
        let cancel = CancelToken::new();
        transport.bind_cancel(cancel.clone());

        Self {
            role,
            family,
            default_code,
            protocols: vec![family.protocol.to_string()],
            ttl: None,
            registry: Arc::new(MessageRegistry::with_defaults()),
            cancel,
            problem_report: None,
            thread_id: None,
            transport,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_registry(mut self, registry: Arc<MessageRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Adds supporting protocols to the whitelist, the family protocol is always in it
    pub fn with_protocols(mut self, protocols: &[&str]) -> Self {
        for protocol in protocols {
            if !self.protocols.iter().any(|known| known == protocol) {
                self.protocols.push(protocol.to_string());
            }
        }
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn problem_report(&self) -> Option<&ProblemReport> {
        self.problem_report.as_ref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn abort(&self) {
        info!("aborting {} conversation", self.family.protocol);
        self.cancel.cancel();
    }

    pub fn abort_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Threads this conversation to the message which started it
    pub fn adopt_thread(&mut self, message: &Message) {
        self.thread_id = message.thread_id();
    }

    /// Binds the transport to the counterpart and starts the conversation deadline
    pub async fn begin(&mut self, identity: ConversationIdentity) -> Result<(), StateMachineError> {
        if self.cancel.is_cancelled() {
            return Err(StateMachineError::Aborted);
        }

        self.problem_report = None;
        self.transport.setup(identity);
        self.transport
            .start(self.protocols.clone(), self.ttl)
            .await
            .map_err(StateMachineError::from)?;

        if let Some(thid) = self.transport.thread_id() {
            self.thread_id = Some(thid);
        }
        Ok(())
    }

    /// Stops the transport and hands back the outcome
    pub async fn finish<R>(&mut self, outcome: Outcome<R>) -> Result<Outcome<R>, StateMachineError> {
        if let Err(err) = self.transport.stop().await {
            warn!("unable to stop the transport: {}", err);
        }

        Ok(outcome)
    }

    /// Fails the run with the given problem code, then stops the transport
    pub async fn reject<R>(
        &mut self,
        problem_code: &str,
        explain: impl Into<String>,
    ) -> Result<Outcome<R>, StateMachineError> {
        let report = self.fail(problem_code, explain).await;
        self.finish(Outcome::Failure(report)).await
    }

    /// Fails the run with the default problem code of the role
    pub async fn reject_default<R>(
        &mut self,
        explain: impl Into<String>,
    ) -> Result<Outcome<R>, StateMachineError> {
        self.reject(self.default_code, explain).await
    }

    pub async fn send(&mut self, message: Message) -> Result<(), StateMachineError> {
        let message = self.stamp(message);
        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(err) => Err(self.interrupted(err).await),
        }
    }

    /// `switch` runs one turn: sends the message and waits for a reply accepted by
    /// `expect`
    ///
    /// A reply classified as [`Classified::Unexpected`] is logged and the turn keeps
    /// waiting passively for the next one, bounded by the conversation TTL. A timed out
    /// turn always fails the run
    pub async fn switch<M, F>(
        &mut self,
        message: Message,
        expect: F,
    ) -> Result<Step<M>, StateMachineError>
    where
        F: Fn(Inbound) -> Classified<M> + Send,
        M: Send,
    {
        let message = self.stamp(message);
        let mut reply = match self.transport.switch(message).await {
            Ok((true, reply)) => reply,
            Ok((false, _)) => None,
            Err(err) => return self.failed_turn(err).await,
        };

        loop {
            let Some(received) = reply.take() else {
                let report = self.fail(self.default_code, TIMEOUT_EXPLAIN).await;
                return Ok(Step::Failed(report));
            };

            let inbound = match self.registry.decode(&received) {
                Ok(inbound) => inbound,
                Err(err) => {
                    let report = self.fail(self.default_code, err.to_string()).await;
                    return Ok(Step::Failed(report));
                }
            };

            match expect(inbound) {
                Classified::Expected(value) => {
                    if self.thread_id.is_none() {
                        self.thread_id = received.thread_id();
                    }
                    return Ok(Step::Reply(value));
                }
                Classified::Problem(report) => {
                    warn!(
                        "counterpart reported a problem: {} {}",
                        report.problem_code, report.explain
                    );
                    self.problem_report = Some(report.clone());
                    return Ok(Step::Failed(report));
                }
                Classified::Unexpected => {
                    warn!("unexpected message type: {}", received.type_str());
                    reply = match self.transport.get_one().await {
                        Ok((message, _, _)) => message,
                        Err(err) => return self.failed_turn(err).await,
                    };
                }
            }
        }
    }

    /// Builds the problem report, stores it and sends it to the counterpart when this
    /// side is the leader
    pub async fn fail(&mut self, problem_code: &str, explain: impl Into<String>) -> ProblemReport {
        let report = ProblemReport::new(&self.family, problem_code, explain)
            .with_thread_id(self.thread_id.clone());
        self.problem_report = Some(report.clone());

        if self.is_leader() && self.transport.identity().is_some() && !self.cancel.is_cancelled() {
            match report.to_message() {
                Ok(message) => {
                    if let Err(err) = self.transport.send(message).await {
                        warn!("unable to send the problem report: {}", err);
                    }
                }
                Err(err) => warn!("unable to build the problem report: {}", err),
            }
        }

        report
    }

    fn stamp(&mut self, mut message: Message) -> Message {
        if let Some(thid) = self.transport.thread_id() {
            self.thread_id = Some(thid);
            return message;
        }

        match message.thread() {
            Some(thread) => {
                if self.thread_id.is_none() {
                    self.thread_id = thread.thid;
                }
            }
            None => match self.thread_id.clone() {
                Some(thid) => message.set_thread(&ThreadDecorator::with_thid(thid)),
                None => self.thread_id = message.id().map(String::from),
            },
        }

        message
    }

    async fn failed_turn<M>(&mut self, err: TransportError) -> Result<Step<M>, StateMachineError> {
        match err {
            TransportError::InvalidReply(reason) => {
                let report = self.fail(self.default_code, reason).await;
                Ok(Step::Failed(report))
            }
            other => Err(self.interrupted(other).await),
        }
    }

    async fn interrupted(&mut self, err: TransportError) -> StateMachineError {
        if err == TransportError::Aborted {
            debug!("{} conversation aborted, stopping transport", self.family.protocol);
            if let Err(err) = self.transport.stop().await {
                warn!("unable to stop the transport: {}", err);
            }
        }

        StateMachineError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::with_tokio::tokio;

    use crate::coprotocol::MemoryCoProtocol;
    use crate::messaging::PROBLEM_REPORT;
    use crate::protocols::notification::{self, Ack};
    use crate::protocols::ping::Ping;

    const FAMILY: Family = Family::new("trust_ping", "1.0");

    fn expect_ack(inbound: Inbound) -> Classified<Ack> {
        match inbound {
            Inbound::Ack(ack) => Classified::Expected(ack),
            Inbound::Generic(message) if message.type_str().ends_with(PROBLEM_REPORT) => {
                match ProblemReport::from_message(&message) {
                    Ok(report) => Classified::Problem(report),
                    Err(_) => Classified::Unexpected,
                }
            }
            _ => Classified::Unexpected,
        }
    }

    fn ping() -> Message {
        Ping {
            comment: None,
            response_requested: true,
        }
        .to_message()
        .unwrap()
    }

    fn pair(ttl: Duration) -> (Conversation<MemoryCoProtocol>, MemoryCoProtocol) {
        let (alice, mut bob) = MemoryCoProtocol::pair();
        bob.setup(ConversationIdentity::new("bob-vk", "alice-vk", "http://alice"));
        let bob = bob.with_default_timeout(Duration::from_secs(2));

        let conversation = Conversation::new(alice, Role::Leader, FAMILY, "ping_processing_error")
            .with_ttl(Some(ttl))
            .with_protocols(&[notification::FAMILY.protocol]);
        (conversation, bob)
    }

    fn alice_identity() -> ConversationIdentity {
        ConversationIdentity::new("alice-vk", "bob-vk", "http://bob")
    }

    #[tokio::test]
    async fn test_switch_expected_reply() {
        let (mut conversation, mut bob) = pair(Duration::from_secs(5));
        conversation.begin(alice_identity()).await.unwrap();

        let responder = tokio::spawn(async move {
            let (message, _, _) = bob.get_one().await.unwrap();
            let thid = message.unwrap().thread_id();
            let ack = Ack::ok().to_message(&notification::FAMILY, thid).unwrap();
            bob.send(ack).await.unwrap();
        });

        let step = conversation.switch(ping(), expect_ack).await.unwrap();
        assert_eq!(step, Step::Reply(Ack::ok()));
        assert!(conversation.problem_report().is_none());
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_reply_keeps_waiting() {
        let (mut conversation, mut bob) = pair(Duration::from_secs(5));
        conversation.begin(alice_identity()).await.unwrap();

        let responder = tokio::spawn(async move {
            let (message, _, _) = bob.get_one().await.unwrap();
            let thid = message.unwrap().thread_id();
            bob.send(Message::new("https://didcomm.org/basicmessage/1.0/message"))
                .await
                .unwrap();
            let ack = Ack::ok().to_message(&notification::FAMILY, thid).unwrap();
            bob.send(ack).await.unwrap();
        });

        let step = conversation.switch(ping(), expect_ack).await.unwrap();
        assert_eq!(step, Step::Reply(Ack::ok()));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_leader_timeout_sends_problem_report() {
        let (mut conversation, mut bob) = pair(Duration::from_millis(50));
        conversation.begin(alice_identity()).await.unwrap();

        let step = conversation.switch(ping(), expect_ack).await.unwrap();
        let Step::Failed(report) = step else {
            panic!("expected failure")
        };
        assert_eq!(report.problem_code, "ping_processing_error");
        assert_eq!(conversation.problem_report(), Some(&report));

        let (first, _, _) = bob.get_one().await.unwrap();
        assert_eq!(first.unwrap().type_str(), FAMILY.message_type("ping"));

        let (second, _, _) = bob.get_one().await.unwrap();
        let received = ProblemReport::from_message(&second.unwrap()).unwrap();
        assert_eq!(received.problem_code, "ping_processing_error");
        assert_eq!(received.thread_id, conversation.thread_id().map(String::from))
    }

    #[tokio::test]
    async fn test_follower_timeout_keeps_report_local() {
        let (alice, mut bob) = MemoryCoProtocol::pair();
        bob.setup(ConversationIdentity::new("bob-vk", "alice-vk", "http://alice"));
        let mut bob = bob.with_default_timeout(Duration::from_millis(100));

        let mut conversation = Conversation::new(alice, Role::Follower, FAMILY, "ping_not_accepted")
            .with_ttl(Some(Duration::from_millis(50)));
        conversation.begin(alice_identity()).await.unwrap();

        let step = conversation.switch(ping(), expect_ack).await.unwrap();
        assert!(matches!(step, Step::Failed(report) if report.problem_code == "ping_not_accepted"));

        let (first, _, _) = bob.get_one().await.unwrap();
        assert!(first.is_some());
        let (second, _, _) = bob.get_one().await.unwrap();
        assert!(second.is_none())
    }

    #[tokio::test]
    async fn test_received_problem_report_is_stored() {
        let (mut conversation, mut bob) = pair(Duration::from_secs(5));
        conversation.begin(alice_identity()).await.unwrap();

        let responder = tokio::spawn(async move {
            let (message, _, _) = bob.get_one().await.unwrap();
            let report = ProblemReport::new(&FAMILY, "ping_not_accepted", "busy")
                .with_thread_id(message.unwrap().thread_id());
            bob.send(report.to_message().unwrap()).await.unwrap();

            let (after, _, _) = bob.get_one().await.unwrap();
            after
        });

        let step = conversation.switch(ping(), expect_ack).await.unwrap();
        assert!(matches!(&step, Step::Failed(report) if report.problem_code == "ping_not_accepted"));
        assert_eq!(
            conversation.problem_report().map(|report| report.explain.as_str()),
            Some("busy")
        );

        let after = responder.await.unwrap();
        assert!(after.is_none())
    }

    #[tokio::test]
    async fn test_aborted_before_begin() {
        let (mut conversation, _bob) = pair(Duration::from_secs(5));
        conversation.abort_handle().cancel();

        let begin = conversation.begin(alice_identity()).await;
        assert_eq!(begin, Err(StateMachineError::Aborted))
    }
}
