use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json::Value;
use rst_common::with_logging::log::info;

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::messaging::decorators::PleaseAck;
use crate::pairwise::Pairwise;
use crate::protocols::attachment::{first_value, Attachment};
use crate::protocols::Inbound;
use crate::wallet::AnonCredsApi;

use super::messages::{
    CredentialMessage, CredentialPreview, IssueCredential, OfferCredential, PreviewAttribute,
};
use super::{FAMILY, OFFER_PROCESSING_ERROR};

/// `IssueParams` is what the issuer needs to know to issue one credential
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub cred_def_id: String,
    pub values: Value,
    pub preview: Vec<PreviewAttribute>,
    pub comment: Option<String>,
}

/// `Issuer` is the leader of the credential issuance protocol
pub struct Issuer<T: CoProtocol, A: AnonCredsApi> {
    conversation: Conversation<T>,
    anoncreds: Arc<A>,
}

impl<T: CoProtocol, A: AnonCredsApi> Issuer<T, A> {
    pub fn new(transport: T, anoncreds: Arc<A>) -> Self {
        Self {
            conversation: Conversation::new(transport, Role::Leader, FAMILY, OFFER_PROCESSING_ERROR),
            anoncreds,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.conversation = self.conversation.with_ttl(ttl);
        self
    }

    /// Offers the credential, waits for the holder request, issues the credential and
    /// waits for its acknowledgement
    pub async fn issue(
        &mut self,
        holder: &Pairwise,
        params: IssueParams,
    ) -> Result<Outcome<()>, StateMachineError> {
        let offer = self
            .anoncreds
            .issuer_create_credential_offer(params.cred_def_id.clone())
            .await?;

        self.conversation
            .begin(ConversationIdentity::from(holder))
            .await?;

        let preview = (!params.preview.is_empty())
            .then(|| CredentialPreview::new(params.preview.clone()));

        let offer_message = OfferCredential {
            comment: params.comment.clone(),
            credential_preview: preview,
            offers_attach: vec![Attachment::json(offer.clone())],
        }
        .to_message()?;

        let request = match self
            .conversation
            .switch(offer_message, |inbound| match inbound {
                Inbound::Credential(CredentialMessage::Request(request)) => {
                    Classified::Expected(request)
                }
                Inbound::Credential(CredentialMessage::ProblemReport(report)) => {
                    Classified::Problem(report)
                }
                _ => Classified::Unexpected,
            })
            .await?
        {
            Step::Reply(request) => request,
            Step::Failed(report) => return self.conversation.finish(Outcome::Failure(report)).await,
        };

        let Some(request_value) = first_value(&request.requests_attach).cloned() else {
            return self
                .conversation
                .reject_default("credential request has no attachment")
                .await;
        };

        let credential = match self
            .anoncreds
            .issuer_create_credential(offer, request_value, params.values)
            .await
        {
            Ok(credential) => credential,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let mut issue = IssueCredential {
            comment: params.comment,
            credentials_attach: vec![Attachment::json(credential)],
        }
        .to_message()?;
        issue.set_please_ack(&PleaseAck::on_receipt());

        let acked = self
            .conversation
            .switch(issue, |inbound| match inbound {
                Inbound::Credential(CredentialMessage::Ack(ack)) => Classified::Expected(ack),
                Inbound::Credential(CredentialMessage::ProblemReport(report)) => {
                    Classified::Problem(report)
                }
                _ => Classified::Unexpected,
            })
            .await?;

        match acked {
            Step::Reply(_) => {
                info!("credential issued for: {}", holder.their.counterpart());
                self.conversation.finish(Outcome::Success(())).await
            }
            Step::Failed(report) => self.conversation.finish(Outcome::Failure(report)).await,
        }
    }
}

impl<T: CoProtocol, A: AnonCredsApi> StateMachine for Issuer<T, A> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
