use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

/// `WalletError` provides all error types returned by the wallet collaborators
#[derive(Debug, PartialEq, Error, Clone)]
pub enum WalletError {
    #[error("wallet item not found: {0}")]
    ItemNotFound(String),

    #[error("wallet operation failed: {0}")]
    OperationError(String),

    #[error("invalid wallet response: {0}")]
    InvalidResponse(String),
}

/// `SignedField` is the result of verifying a signed message field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct SignedField {
    pub valid: bool,
    pub signer: String,
    pub value: Value,
}

/// `CredentialRequest` is a prover credential request with the metadata needed to
/// store the issued credential later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct CredentialRequest {
    pub request: Value,
    pub metadata: Value,
}

/// `CryptoApi` is the key management and signature surface of the wallet
#[async_trait]
pub trait CryptoApi: Send + Sync {
    /// Creates a new DID with its verkey, returns `(did, verkey)`
    async fn create_and_store_my_did(&self) -> Result<(String, String), WalletError>;

    /// Signs a JSON field with the given verkey, returns the signature decorator object
    async fn sign_field(&self, verkey: String, field: Value) -> Result<Value, WalletError>;

    /// Verifies a signature decorator object and returns the signed value
    async fn verify_field(&self, signed: Value) -> Result<SignedField, WalletError>;
}

/// `AnonCredsApi` is the credential and proof surface of the wallet
#[async_trait]
pub trait AnonCredsApi: Send + Sync {
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

    /// Stores the issued credential, returns the credential id
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
