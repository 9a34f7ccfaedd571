use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json;
use rst_common::with_logging::log::{debug, info};

use crate::coprotocol::{CoProtocol, ConversationIdentity};
use crate::machine::{Classified, Conversation, Outcome, Role, StateMachine, StateMachineError, Step};
use crate::messaging::decorators::PleaseAck;
use crate::messaging::Message;
use crate::pairwise::{Me, Pairwise};
use crate::protocols::notification;
use crate::protocols::ping::{self, PingMessage, PingResponse};
use crate::protocols::Inbound;
use crate::wallet::CryptoApi;

use super::messages::{ConnectionInfo, ConnectionMessage, ConnectionRequest, ConnectionResponse};
use super::{FAMILY, REQUEST_PROCESSING_ERROR};

/// `Inviter` is the leader of the connection protocol
///
/// It answers a received connection request with its own DID, signed with the connection
/// key of the invitation, and waits for the invitee confirmation: an ack or a trust ping
pub struct Inviter<T: CoProtocol, C: CryptoApi> {
    conversation: Conversation<T>,
    crypto: Arc<C>,
    connection_key: String,
    my_endpoint: String,
}

impl<T: CoProtocol, C: CryptoApi> Inviter<T, C> {
    pub fn new(transport: T, crypto: Arc<C>, connection_key: &str, my_endpoint: &str) -> Self {
        let conversation =
            Conversation::new(transport, Role::Leader, FAMILY, REQUEST_PROCESSING_ERROR)
                .with_protocols(&[notification::FAMILY.protocol, ping::FAMILY.protocol]);

        Self {
            conversation,
            crypto,
            connection_key: connection_key.to_string(),
            my_endpoint: my_endpoint.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.conversation = self.conversation.with_ttl(ttl);
        self
    }

    pub async fn create_connection(
        &mut self,
        request: &Message,
    ) -> Result<Outcome<Pairwise>, StateMachineError> {
        self.conversation.adopt_thread(request);

        let payload: ConnectionRequest = match request.decode() {
            Ok(payload) => payload,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let their = match payload
            .connection
            .did_doc
            .their_endpoint(&payload.connection.did, payload.label.clone())
        {
            Some(their) => their,
            None => {
                return self
                    .conversation
                    .reject_default("connection request has no usable did doc service")
                    .await
            }
        };

        let (my_did, my_verkey) = self.crypto.create_and_store_my_did().await?;
        debug!("inviter created did: {}", my_did);

        let identity = ConversationIdentity::new(&self.connection_key, &their.verkey, &their.endpoint)
            .with_routing_keys(their.routing_keys.clone());
        self.conversation.begin(identity).await?;

        let connection = ConnectionInfo::new(&my_did, &my_verkey, &self.my_endpoint);
        let field = serde_json::to_value(&connection)
            .map_err(|err| StateMachineError::InvalidInput(err.to_string()))?;

        let signed = match self
            .crypto
            .sign_field(self.connection_key.clone(), field)
            .await
        {
            Ok(signed) => signed,
            Err(err) => return self.conversation.reject_default(err.to_string()).await,
        };

        let mut response = ConnectionResponse {
            connection_sig: signed,
        }
        .to_message()?;
        response.set_please_ack(&PleaseAck::on_receipt());

        let confirmed = self
            .conversation
            .switch(response, |inbound| match inbound {
                Inbound::Ack(_) => Classified::Expected(None),
                Inbound::Ping(PingMessage::Ping(ping)) => Classified::Expected(Some(ping)),
                Inbound::Connection(ConnectionMessage::ProblemReport(report)) => {
                    Classified::Problem(report)
                }
                _ => Classified::Unexpected,
            })
            .await?;

        match confirmed {
            Step::Reply(Some(ping)) if ping.response_requested => {
                let pong = PingResponse { comment: None }.to_message(None)?;
                self.conversation.send(pong).await?;
            }
            Step::Reply(_) => {}
            Step::Failed(report) => return self.conversation.finish(Outcome::Failure(report)).await,
        }

        info!("connection established with: {}", their.counterpart());
        let pairwise = Pairwise::new(Me::new(&my_did, &my_verkey), their);
        self.conversation.finish(Outcome::Success(pairwise)).await
    }
}

impl<T: CoProtocol, C: CryptoApi> StateMachine for Inviter<T, C> {
    type Transport = T;

    fn conversation(&self) -> &Conversation<T> {
        &self.conversation
    }
}
