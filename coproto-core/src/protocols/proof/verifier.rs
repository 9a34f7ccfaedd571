use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json::Value;
use rst_common::with_logging::log::{info, warn};

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::pairwise::Pairwise;
use crate::protocols::attachment::{first_value, Attachment};
use crate::protocols::notification::Ack;
use crate::protocols::Inbound;
use crate::wallet::AnonCredsApi;

use super::messages::{ProofMessage, RequestPresentation};
use super::{FAMILY, RESPONSE_PROCESSING_ERROR, VERIFY_ERROR};

/// `Verifier` is the leader of the proof presentation protocol
pub struct Verifier<T: CoProtocol, A: AnonCredsApi> {
    conversation: Conversation<T>,
    anoncreds: Arc<A>,
}

impl<T: CoProtocol, A: AnonCredsApi> Verifier<T, A> {
    pub fn new(transport: T, anoncreds: Arc<A>) -> Self {
        Self {
            conversation: Conversation::new(
                transport,
                Role::Leader,
                FAMILY,
                RESPONSE_PROCESSING_ERROR,
            ),
            anoncreds,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.conversation = self.conversation.with_ttl(ttl);
        self
    }

    /// Requests a presentation of `proof_request` and verifies it, returns the
    /// verified proof
    pub async fn verify(
        &mut self,
        prover: &Pairwise,
        proof_request: Value,
        comment: Option<String>,
    ) -> Result<Outcome<Value>, StateMachineError> {
        self.conversation
            .begin(ConversationIdentity::from(prover))
            .await?;

        let request = RequestPresentation {
            comment,
            request_presentations_attach: vec![Attachment::json(proof_request.clone())],
        }
        .to_message()?;

        let presentation = match self
            .conversation
            .switch(request, |inbound| match inbound {
                Inbound::Proof(ProofMessage::Presentation(presentation)) => {
                    Classified::Expected(presentation)
                }
                Inbound::Proof(ProofMessage::ProblemReport(report)) => Classified::Problem(report),
                _ => Classified::Unexpected,
            })
            .await?
        {
            Step::Reply(presentation) => presentation,
            Step::Failed(report) => return self.conversation.finish(Outcome::Failure(report)).await,
        };

        let Some(proof) = first_value(&presentation.presentations_attach).cloned() else {
            return self
                .conversation
                .reject_default("presentation has no attachment")
                .await;
        };

        let verified = match self
            .anoncreds
            .verifier_verify_proof(proof_request, proof.clone())
            .await
        {
            Ok(verified) => verified,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        if !verified {
            warn!("proof of {} is not valid", prover.their.counterpart());
            return self
                .conversation
                .reject(VERIFY_ERROR, "proof verification failed")
                .await;
        }

        let ack = Ack::ok().to_message(&FAMILY, None)?;
        self.conversation.send(ack).await?;

        info!("proof verified for: {}", prover.their.counterpart());
        self.conversation.finish(Outcome::Success(proof)).await
    }
}

impl<T: CoProtocol, A: AnonCredsApi> StateMachine for Verifier<T, A> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
