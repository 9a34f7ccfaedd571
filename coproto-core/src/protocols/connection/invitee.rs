use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json;
use rst_common::with_logging::log::{info, warn};

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::pairwise::{Me, Pairwise};
use crate::protocols::notification::{self, Ack};
use crate::protocols::Inbound;
use crate::wallet::CryptoApi;

use super::messages::{ConnectionInfo, ConnectionMessage, ConnectionRequest, Invitation};
use super::{FAMILY, RESPONSE_NOT_ACCEPTED};

/// `Invitee` is the follower of the connection protocol
pub struct Invitee<T: CoProtocol, C: CryptoApi> {
    conversation: Conversation<T>,
    crypto: Arc<C>,
    me: Me,
    my_endpoint: String,
}

impl<T: CoProtocol, C: CryptoApi> Invitee<T, C> {
    pub fn new(transport: T, crypto: Arc<C>, me: Me, my_endpoint: &str) -> Self {
        let conversation =
            Conversation::new(transport, Role::Follower, FAMILY, RESPONSE_NOT_ACCEPTED)
                .with_protocols(&[notification::FAMILY.protocol]);

        Self {
            conversation,
            crypto,
            me,
            my_endpoint: my_endpoint.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.conversation = self.conversation.with_ttl(ttl);
        self
    }

    /// Requests a connection to the inviter, the response signature must be made
    /// with the connection key of the invitation
    pub async fn create_connection(
        &mut self,
        invitation: &Invitation,
        my_label: &str,
    ) -> Result<Outcome<Pairwise>, StateMachineError> {
        let connection_key = invitation
            .connection_key()
            .ok_or_else(|| {
                StateMachineError::InvalidInput("invitation has no recipient keys".to_string())
            })?
            .to_string();

        let identity =
            ConversationIdentity::new(&self.me.verkey, &connection_key, &invitation.service_endpoint)
                .with_routing_keys(invitation.routing_keys.clone());
        self.conversation.begin(identity).await?;

        let request = ConnectionRequest {
            label: Some(my_label.to_string()),
            connection: ConnectionInfo::new(&self.me.did, &self.me.verkey, &self.my_endpoint),
        }
        .to_message()?;

        let response = match self
            .conversation
            .switch(request, |inbound| match inbound {
                Inbound::Connection(ConnectionMessage::Response(response)) => {
                    Classified::Expected(response)
                }
                Inbound::Connection(ConnectionMessage::ProblemReport(report)) => {
                    Classified::Problem(report)
                }
                _ => Classified::Unexpected,
            })
            .await?
        {
            Step::Reply(response) => response,
            Step::Failed(report) => return self.conversation.finish(Outcome::Failure(report)).await,
        };

        let signed = match self.crypto.verify_field(response.connection_sig).await {
            Ok(signed) => signed,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        if !signed.valid || signed.signer != connection_key {
            warn!("connection response signed by: {}", signed.signer);
            return self
                .conversation
                .reject_default("connection response signature is not valid")
                .await;
        }

        let connection: ConnectionInfo = match serde_json::from_value(signed.value) {
            Ok(connection) => connection,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let their = match connection
            .did_doc
            .their_endpoint(&connection.did, invitation.label.clone())
        {
            Some(their) => their,
            None => {
                return self
                    .conversation
                    .reject_default("connection response has no usable did doc service")
                    .await
            }
        };

        let ack = Ack::ok().to_message(&notification::FAMILY, None)?;
        self.conversation.send(ack).await?;

        info!("connection established with: {}", their.counterpart());
        let pairwise = Pairwise::new(self.me.clone(), their);
        self.conversation.finish(Outcome::Success(pairwise)).await
    }
}

impl<T: CoProtocol, C: CryptoApi> StateMachine for Invitee<T, C> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
