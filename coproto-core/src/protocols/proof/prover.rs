use std::sync::Arc;
use std::time::Duration;

use rst_common::with_logging::log::info;

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::messaging::decorators::PleaseAck;
use crate::messaging::Message;
use crate::pairwise::Pairwise;
use crate::protocols::attachment::{first_value, Attachment};
use crate::protocols::Inbound;
use crate::wallet::AnonCredsApi;

use super::messages::{Presentation, ProofMessage, RequestPresentation};
use super::{FAMILY, REQUEST_NOT_ACCEPTED};

/// `Prover` is the follower of the proof presentation protocol
pub struct Prover<T: CoProtocol, A: AnonCredsApi> {
    conversation: Conversation<T>,
    anoncreds: Arc<A>,
    master_secret_id: String,
}

impl<T: CoProtocol, A: AnonCredsApi> Prover<T, A> {
    pub fn new(transport: T, anoncreds: Arc<A>, master_secret_id: &str) -> Self {
        Self {
            conversation: Conversation::new(transport, Role::Follower, FAMILY, REQUEST_NOT_ACCEPTED),
            anoncreds,
            master_secret_id: master_secret_id.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.conversation = self.conversation.with_ttl(ttl);
        self
    }

    /// Answers a received presentation request and waits for the verifier ack
    pub async fn prove(
        &mut self,
        verifier: &Pairwise,
        request: &Message,
    ) -> Result<Outcome<()>, StateMachineError> {
        self.conversation
            .begin(ConversationIdentity::from(verifier))
            .await?;
        self.conversation.adopt_thread(request);

        let payload: RequestPresentation = match request.decode() {
            Ok(payload) => payload,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let Some(proof_request) = first_value(&payload.request_presentations_attach).cloned()
        else {
            return self
                .conversation
                .reject_default("presentation request has no attachment")
                .await;
        };

        let proof = match self
            .anoncreds
            .prover_create_proof(proof_request, self.master_secret_id.clone())
            .await
        {
            Ok(proof) => proof,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let mut presentation = Presentation {
            comment: None,
            presentations_attach: vec![Attachment::json(proof)],
        }
        .to_message()?;
        presentation.set_please_ack(&PleaseAck::on_receipt());

        let acked = self
            .conversation
            .switch(presentation, |inbound| match inbound {
                Inbound::Proof(ProofMessage::Ack(ack)) => Classified::Expected(ack),
                Inbound::Proof(ProofMessage::ProblemReport(report)) => Classified::Problem(report),
                _ => Classified::Unexpected,
            })
            .await?;

        match acked {
            Step::Reply(_) => {
                info!("proof presented to: {}", verifier.their.counterpart());
                self.conversation.finish(Outcome::Success(())).await
            }
            Step::Failed(report) => self.conversation.finish(Outcome::Failure(report)).await,
        }
    }
}

impl<T: CoProtocol, A: AnonCredsApi> StateMachine for Prover<T, A> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
