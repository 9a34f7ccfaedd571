use derive_more::{Display, From, Into};

use prople_coproto_core::messaging::types::{Family, MessageType};

use super::types::RpcError;

pub const ROUTER_FAMILY: Family = Family::new("prople_rpc", "1.0");
pub const CRYPTO_FAMILY: Family = Family::new("crypto", "1.0");
pub const ANONCREDS_FAMILY: Family = Family::new("anoncreds", "1.0");
pub const ADMIN_FAMILY: Family = Family::new("admin", "1.0");

/// Call families sent without point to point sealing
pub const UNAUTHENTICATED_FAMILIES: [&str; 3] = ["admin", "microledgers", "microledgers-batched"];

const METHOD_SEND_MESSAGE: &str = "send_message";
const METHOD_SEND_MESSAGE_BATCHED: &str = "send_message_batched";
const METHOD_START_PROTOCOL_WITH_THREADING: &str = "start_protocol_with_threading";
const METHOD_STOP_PROTOCOL_WITH_THREADING: &str = "stop_protocol_with_threading";
const METHOD_START_PROTOCOL_WITH_THREADS: &str = "start_protocol_with_threads";
const METHOD_STOP_PROTOCOL_WITH_THREADS: &str = "stop_protocol_with_threads";
const METHOD_START_PROTOCOL_FOR_P2P: &str = "start_protocol_for_p2p";
const METHOD_STOP_PROTOCOL_FOR_P2P: &str = "stop_protocol_for_p2p";

const METHOD_CREATE_AND_STORE_MY_DID: &str = "create_and_store_my_did";
const METHOD_SIGN_FIELD: &str = "sign_field";
const METHOD_VERIFY_FIELD: &str = "verify_field";

const METHOD_ISSUER_CREATE_CREDENTIAL_OFFER: &str = "issuer_create_credential_offer";
const METHOD_ISSUER_CREATE_CREDENTIAL: &str = "issuer_create_credential";
const METHOD_PROVER_CREATE_CREDENTIAL_REQ: &str = "prover_create_credential_req";
const METHOD_PROVER_STORE_CREDENTIAL: &str = "prover_store_credential";
const METHOD_PROVER_CREATE_PROOF: &str = "prover_create_proof";
const METHOD_VERIFIER_VERIFY_PROOF: &str = "verifier_verify_proof";

const METHOD_PING: &str = "ping";

/// `RpcMethod` is the full `@type` of a call request
#[derive(Debug, Clone, PartialEq, Eq, Display, From, Into)]
pub struct RpcMethod(String);

impl RpcMethod {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RpcMethod {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub trait RpcMethodBuilder {
    fn family(&self) -> Family;
    fn build_path(&self) -> &str;
}

pub fn build_rpc_method(method: impl RpcMethodBuilder) -> RpcMethod {
    RpcMethod::from(method.family().message_type(method.build_path()))
}

/// Whether a call must be sealed, only the unauthenticated families travel in clear
pub fn requires_encryption(method: &RpcMethod) -> bool {
    match MessageType::parse(method.as_str()) {
        Ok(typ) => !UNAUTHENTICATED_FAMILIES.contains(&typ.protocol()),
        Err(_) => true,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RouterMethod {
    SendMessage,
    SendMessageBatched,
    StartProtocolWithThreading,
    StopProtocolWithThreading,
    StartProtocolWithThreads,
    StopProtocolWithThreads,
    StartProtocolForP2P,
    StopProtocolForP2P,
}

impl RpcMethodBuilder for RouterMethod {
    fn family(&self) -> Family {
        ROUTER_FAMILY
    }

    fn build_path(&self) -> &str {
        match self {
            RouterMethod::SendMessage => METHOD_SEND_MESSAGE,
            RouterMethod::SendMessageBatched => METHOD_SEND_MESSAGE_BATCHED,
            RouterMethod::StartProtocolWithThreading => METHOD_START_PROTOCOL_WITH_THREADING,
            RouterMethod::StopProtocolWithThreading => METHOD_STOP_PROTOCOL_WITH_THREADING,
            RouterMethod::StartProtocolWithThreads => METHOD_START_PROTOCOL_WITH_THREADS,
            RouterMethod::StopProtocolWithThreads => METHOD_STOP_PROTOCOL_WITH_THREADS,
            RouterMethod::StartProtocolForP2P => METHOD_START_PROTOCOL_FOR_P2P,
            RouterMethod::StopProtocolForP2P => METHOD_STOP_PROTOCOL_FOR_P2P,
        }
    }
}

impl TryFrom<RpcMethod> for RouterMethod {
    type Error = RpcError;

    fn try_from(value: RpcMethod) -> Result<Self, Self::Error> {
        let typ = MessageType::parse(value.as_str())
            .map_err(|err| RpcError::InvalidPayload(err.to_string()))?;

        if typ.protocol() != ROUTER_FAMILY.protocol {
            return Err(RpcError::InvalidPayload(format!("unknown method: {}", value)));
        }

        match typ.name() {
            METHOD_SEND_MESSAGE => Ok(Self::SendMessage),
            METHOD_SEND_MESSAGE_BATCHED => Ok(Self::SendMessageBatched),
            METHOD_START_PROTOCOL_WITH_THREADING => Ok(Self::StartProtocolWithThreading),
            METHOD_STOP_PROTOCOL_WITH_THREADING => Ok(Self::StopProtocolWithThreading),
            METHOD_START_PROTOCOL_WITH_THREADS => Ok(Self::StartProtocolWithThreads),
            METHOD_STOP_PROTOCOL_WITH_THREADS => Ok(Self::StopProtocolWithThreads),
            METHOD_START_PROTOCOL_FOR_P2P => Ok(Self::StartProtocolForP2P),
            METHOD_STOP_PROTOCOL_FOR_P2P => Ok(Self::StopProtocolForP2P),
            _ => Err(RpcError::InvalidPayload(format!("unknown method: {}", value))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CryptoMethod {
    CreateAndStoreMyDid,
    SignField,
    VerifyField,
}

impl RpcMethodBuilder for CryptoMethod {
    fn family(&self) -> Family {
        CRYPTO_FAMILY
    }

    fn build_path(&self) -> &str {
        match self {
            CryptoMethod::CreateAndStoreMyDid => METHOD_CREATE_AND_STORE_MY_DID,
            CryptoMethod::SignField => METHOD_SIGN_FIELD,
            CryptoMethod::VerifyField => METHOD_VERIFY_FIELD,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnonCredsMethod {
    IssuerCreateCredentialOffer,
    IssuerCreateCredential,
    ProverCreateCredentialReq,
    ProverStoreCredential,
    ProverCreateProof,
    VerifierVerifyProof,
}

impl RpcMethodBuilder for AnonCredsMethod {
    fn family(&self) -> Family {
        ANONCREDS_FAMILY
    }

    fn build_path(&self) -> &str {
        match self {
            AnonCredsMethod::IssuerCreateCredentialOffer => METHOD_ISSUER_CREATE_CREDENTIAL_OFFER,
            AnonCredsMethod::IssuerCreateCredential => METHOD_ISSUER_CREATE_CREDENTIAL,
            AnonCredsMethod::ProverCreateCredentialReq => METHOD_PROVER_CREATE_CREDENTIAL_REQ,
            AnonCredsMethod::ProverStoreCredential => METHOD_PROVER_STORE_CREDENTIAL,
            AnonCredsMethod::ProverCreateProof => METHOD_PROVER_CREATE_PROOF,
            AnonCredsMethod::VerifierVerifyProof => METHOD_VERIFIER_VERIFY_PROOF,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdminMethod {
    Ping,
}

impl RpcMethodBuilder for AdminMethod {
    fn family(&self) -> Family {
        ADMIN_FAMILY
    }

    fn build_path(&self) -> &str {
        match self {
            AdminMethod::Ping => METHOD_PING,
        }
    }
}
