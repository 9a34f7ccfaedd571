//! `wallet` exposes the wallet collaborators of the remote agent
use std::sync::Arc;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde_json::{self, json, Value};

use prople_coproto_core::wallet::{
    AnonCredsApi, CredentialRequest, CryptoApi, SignedField, WalletError,
};

use crate::channel::Connector;
use crate::rpc::method::{build_rpc_method, AnonCredsMethod, CryptoMethod, RpcMethodBuilder};
use crate::rpc::{AgentRpc, CallValue, Params, RemoteError, RpcError};

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(RemoteError::WalletItemNotFound(reason)) => {
                WalletError::ItemNotFound(reason)
            }
            RpcError::InvalidPayload(reason) => WalletError::InvalidResponse(reason),
            other => WalletError::OperationError(other.to_string()),
        }
    }
}

/// `RemoteWallet` implements the wallet collaborators as calls to the remote agent
pub struct RemoteWallet<TConnector>
where
    TConnector: Connector,
{
    rpc: Arc<AgentRpc<TConnector>>,
}

impl<TConnector> Clone for RemoteWallet<TConnector>
where
    TConnector: Connector,
{
    fn clone(&self) -> Self {
        Self {
            rpc: self.rpc.clone(),
        }
    }
}

impl<TConnector> RemoteWallet<TConnector>
where
    TConnector: Connector,
{
    pub fn new(rpc: Arc<AgentRpc<TConnector>>) -> Self {
        Self { rpc }
    }

    async fn call(&self, method: impl RpcMethodBuilder, params: Params) -> Result<CallValue, WalletError> {
        self.rpc
            .call(&build_rpc_method(method), params, true, true)
            .await?
            .ok_or_else(|| WalletError::InvalidResponse("call returned nothing".to_string()))
    }

    async fn call_plain<T: DeserializeOwned>(
        &self,
        method: impl RpcMethodBuilder,
        params: Params,
    ) -> Result<T, WalletError> {
        let value = self.call(method, params).await?.into_plain()?;
        serde_json::from_value(value).map_err(|err| WalletError::InvalidResponse(err.to_string()))
    }
}

fn pair(values: Vec<Value>) -> Result<(Value, Value), WalletError> {
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(WalletError::InvalidResponse(
            "expected a tuple of two values".to_string(),
        )),
    }
}

#[async_trait]
impl<TConnector> CryptoApi for RemoteWallet<TConnector>
where
    TConnector: Connector,
{
    async fn create_and_store_my_did(&self) -> Result<(String, String), WalletError> {
        let values = self
            .call(
                CryptoMethod::CreateAndStoreMyDid,
                Params::new().plain("did", json!({})),
            )
            .await?
            .into_tuple()?;

        let (did, verkey) = pair(values)?;
        match (did.as_str(), verkey.as_str()) {
            (Some(did), Some(verkey)) => Ok((did.to_string(), verkey.to_string())),
            _ => Err(WalletError::InvalidResponse(
                "did and verkey must be strings".to_string(),
            )),
        }
    }

    async fn sign_field(&self, verkey: String, field: Value) -> Result<Value, WalletError> {
        let params = Params::new()
            .plain("their_vk", json!(verkey))
            .plain("field_value", field);
        self.call_plain(CryptoMethod::SignField, params).await
    }

    async fn verify_field(&self, signed: Value) -> Result<SignedField, WalletError> {
        self.call_plain(
            CryptoMethod::VerifyField,
            Params::new().plain("signed_field", signed),
        )
        .await
    }
}

#[async_trait]
impl<TConnector> AnonCredsApi for RemoteWallet<TConnector>
where
    TConnector: Connector,
{
    async fn issuer_create_credential_offer(
        &self,
        cred_def_id: String,
    ) -> Result<Value, WalletError> {
        self.call_plain(
            AnonCredsMethod::IssuerCreateCredentialOffer,
            Params::new().plain("cred_def_id", json!(cred_def_id)),
        )
        .await
    }

    async fn issuer_create_credential(
        &self,
        offer: Value,
        request: Value,
        values: Value,
    ) -> Result<Value, WalletError> {
        let params = Params::new()
            .plain("cred_offer", offer)
            .plain("cred_req", request)
            .plain("cred_values", values);
        self.call_plain(AnonCredsMethod::IssuerCreateCredential, params)
            .await
    }

    async fn prover_create_credential_req(
        &self,
        prover_did: String,
        offer: Value,
        master_secret_id: String,
    ) -> Result<CredentialRequest, WalletError> {
        let params = Params::new()
            .plain("prover_did", json!(prover_did))
            .plain("cred_offer", offer)
            .plain("master_secret_id", json!(master_secret_id));

        let values = self
            .call(AnonCredsMethod::ProverCreateCredentialReq, params)
            .await?
            .into_tuple()?;

        let (request, metadata) = pair(values)?;
        Ok(CredentialRequest { request, metadata })
    }

    async fn prover_store_credential(
        &self,
        metadata: Value,
        credential: Value,
    ) -> Result<String, WalletError> {
        let params = Params::new()
            .plain("cred_req_metadata", metadata)
            .plain("cred", credential);
        self.call_plain(AnonCredsMethod::ProverStoreCredential, params)
            .await
    }

    async fn prover_create_proof(
        &self,
        proof_request: Value,
        master_secret_id: String,
    ) -> Result<Value, WalletError> {
        let params = Params::new()
            .plain("proof_req", proof_request)
            .plain("master_secret_id", json!(master_secret_id));
        self.call_plain(AnonCredsMethod::ProverCreateProof, params)
            .await
    }

    async fn verifier_verify_proof(
        &self,
        proof_request: Value,
        proof: Value,
    ) -> Result<bool, WalletError> {
        let params = Params::new()
            .plain("proof_request", proof_request)
            .plain("proof", proof);
        self.call_plain(AnonCredsMethod::VerifierVerifyProof, params)
            .await
    }
}
