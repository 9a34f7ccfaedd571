use std::time::Duration;

use mockall::mock;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::{json, Value};

use crate::coprotocol::{CoProtocol, ConversationIdentity, MemoryCoProtocol};
use crate::messaging::Message;
use crate::pairwise::{Me, Pairwise, TheirEndpoint};
use crate::wallet::{AnonCredsApi, CredentialRequest, CryptoApi, SignedField, WalletError};

pub const FAKE_SIGNATURE: &str = "fake-signature";

mock!(
    pub FakeCrypto{}

    #[async_trait]
    impl CryptoApi for FakeCrypto {
        async fn create_and_store_my_did(&self) -> Result<(String, String), WalletError>;
        async fn sign_field(&self, verkey: String, field: Value) -> Result<Value, WalletError>;
        async fn verify_field(&self, signed: Value) -> Result<SignedField, WalletError>;
    }
);

mock!(
    pub FakeAnonCreds{}

    #[async_trait]
    impl AnonCredsApi for FakeAnonCreds {
        async fn issuer_create_credential_offer(&self, cred_def_id: String)
            -> Result<Value, WalletError>;

        async fn issuer_create_credential(
            &self,
            offer: Value,
            request: Value,
            values: Value,
        ) -> Result<Value, WalletError>;

        async fn prover_create_credential_req(
            &self,
            prover_did: String,
            offer: Value,
            master_secret_id: String,
        ) -> Result<CredentialRequest, WalletError>;

        async fn prover_store_credential(
            &self,
            metadata: Value,
            credential: Value,
        ) -> Result<String, WalletError>;

        async fn prover_create_proof(
            &self,
            proof_request: Value,
            master_secret_id: String,
        ) -> Result<Value, WalletError>;

        async fn verifier_verify_proof(
            &self,
            proof_request: Value,
            proof: Value,
        ) -> Result<bool, WalletError>;
    }
);

/// A crypto double which "signs" by wrapping the field with the signer key
pub fn signing_crypto(did: &'static str, verkey: &'static str) -> MockFakeCrypto {
    let mut crypto = MockFakeCrypto::new();
    crypto
        .expect_create_and_store_my_did()
        .returning(move || Ok((did.to_string(), verkey.to_string())));

    crypto.expect_sign_field().returning(|signer, field| {
        Ok(json!({
            "signer": signer,
            "sig_data": field,
            "signature": FAKE_SIGNATURE
        }))
    });

    crypto.expect_verify_field().returning(|signed| {
        Ok(SignedField {
            valid: signed["signature"] == FAKE_SIGNATURE,
            signer: signed["signer"].as_str().unwrap_or_default().to_string(),
            value: signed["sig_data"].clone(),
        })
    });

    crypto
}

/// Two in-process endpoints, their passive waits are kept short
pub fn linked() -> (MemoryCoProtocol, MemoryCoProtocol) {
    let (left, right) = MemoryCoProtocol::pair();
    (
        left.with_default_timeout(Duration::from_secs(2)),
        right.with_default_timeout(Duration::from_secs(2)),
    )
}

pub fn pairwise(me: (&str, &str), their: (&str, &str), their_endpoint: &str) -> Pairwise {
    let mut endpoint = TheirEndpoint::new(their.1, their_endpoint);
    endpoint.did = Some(their.0.to_string());
    Pairwise::new(Me::new(me.0, me.1), endpoint)
}

/// Binds `transport` to the pairwise and waits for the message which starts a protocol
pub async fn receive_first(transport: &mut MemoryCoProtocol, pairwise: &Pairwise) -> Message {
    transport.setup(ConversationIdentity::from(pairwise));
    let (message, _, _) = transport.get_one().await.unwrap();
    message.unwrap()
}

/// Waits for the next message, `None` after the passive wait elapsed
pub async fn next_message(transport: &mut MemoryCoProtocol) -> Option<Message> {
    let (message, _, _) = transport.get_one().await.unwrap();
    message
}
