use std::sync::Arc;
use std::time::Duration;

use rst_common::with_logging::log::info;

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::messaging::Message;
use crate::pairwise::Pairwise;
use crate::protocols::attachment::{first_value, Attachment};
use crate::protocols::notification::Ack;
use crate::protocols::Inbound;
use crate::wallet::AnonCredsApi;

use super::messages::{CredentialMessage, OfferCredential, RequestCredential};
use super::{FAMILY, REQUEST_NOT_ACCEPTED};

/// `Holder` is the follower of the credential issuance protocol
pub struct Holder<T: CoProtocol, A: AnonCredsApi> {
    conversation: Conversation<T>,
    anoncreds: Arc<A>,
    master_secret_id: String,
}

impl<T: CoProtocol, A: AnonCredsApi> Holder<T, A> {
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

    /// Accepts a received credential offer, returns the id of the stored credential
    pub async fn accept(
        &mut self,
        issuer: &Pairwise,
        offer: &Message,
        comment: Option<String>,
    ) -> Result<Outcome<String>, StateMachineError> {
        self.conversation
            .begin(ConversationIdentity::from(issuer))
            .await?;
        self.conversation.adopt_thread(offer);

        let offer_payload: OfferCredential = match offer.decode() {
            Ok(payload) => payload,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let Some(offer_value) = first_value(&offer_payload.offers_attach).cloned() else {
            return self
                .conversation
                .reject_default("credential offer has no attachment")
                .await;
        };

        let request = match self
            .anoncreds
            .prover_create_credential_req(
                issuer.me.did.clone(),
                offer_value,
                self.master_secret_id.clone(),
            )
            .await
        {
            Ok(request) => request,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let request_message = RequestCredential {
            comment,
            requests_attach: vec![Attachment::json(request.request)],
        }
        .to_message()?;

        let issued = match self
            .conversation
            .switch(request_message, |inbound| match inbound {
                Inbound::Credential(CredentialMessage::Issue(issued)) => {
                    Classified::Expected(issued)
                }
                Inbound::Credential(CredentialMessage::ProblemReport(report)) => {
                    Classified::Problem(report)
                }
                _ => Classified::Unexpected,
            })
            .await?
        {
            Step::Reply(issued) => issued,
            Step::Failed(report) => return self.conversation.finish(Outcome::Failure(report)).await,
        };

        let Some(credential) = first_value(&issued.credentials_attach).cloned() else {
            return self
                .conversation
                .reject_default("issued credential has no attachment")
                .await;
        };

        let cred_id = match self
            .anoncreds
            .prover_store_credential(request.metadata, credential)
            .await
        {
            Ok(cred_id) => cred_id,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let ack = Ack::ok().to_message(&FAMILY, None)?;
        self.conversation.send(ack).await?;

        info!("credential stored: {}", cred_id);
        self.conversation.finish(Outcome::Success(cred_id)).await
    }
}

impl<T: CoProtocol, A: AnonCredsApi> StateMachine for Holder<T, A> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
