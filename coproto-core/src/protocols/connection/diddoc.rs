use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::pairwise::TheirEndpoint;

pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";
pub const KEY_TYPE: &str = "Ed25519VerificationKey2018";
pub const SERVICE_TYPE: &str = "IndyAgent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PublicKey {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: String,

    pub controller: String,

    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Service {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub priority: u32,

    #[serde(rename = "recipientKeys", default)]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// `DidDoc` is the DID document exchanged inside the connection request and response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct DidDoc {
    #[serde(rename = "@context")]
    pub context: String,

    pub id: String,

    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKey>,

    #[serde(default)]
    pub service: Vec<Service>,
}

impl DidDoc {
    pub fn new(did: &str, verkey: &str, endpoint: &str, routing_keys: Vec<String>) -> Self {
        let key_id = format!("{}#1", did);

        Self {
            context: DID_CONTEXT.to_string(),
            id: did.to_string(),
            public_key: vec![PublicKey {
                id: key_id.clone(),
                key_type: KEY_TYPE.to_string(),
                controller: did.to_string(),
                public_key_base58: verkey.to_string(),
            }],
            service: vec![Service {
                id: format!("{};indy", did),
                service_type: SERVICE_TYPE.to_string(),
                priority: 0,
                recipient_keys: vec![verkey.to_string()],
                routing_keys,
                service_endpoint: endpoint.to_string(),
            }],
        }
    }

    fn preferred_service(&self) -> Option<&Service> {
        self.service.iter().min_by_key(|service| service.priority)
    }

    /// `verkey` resolves the first recipient key of the preferred service, a key reference
    /// is looked up at the public keys
    pub fn verkey(&self) -> Option<&str> {
        let key = self.preferred_service()?.recipient_keys.first()?;
        match self.public_key.iter().find(|public| &public.id == key) {
            Some(public) => Some(public.public_key_base58.as_str()),
            None => Some(key.as_str()),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.preferred_service()
            .map(|service| service.service_endpoint.as_str())
    }

    pub fn routing_keys(&self) -> Vec<String> {
        self.preferred_service()
            .map(|service| service.routing_keys.clone())
            .unwrap_or_default()
    }

    /// Extracts the counterpart reachability, `None` when the document has no usable service
    pub fn their_endpoint(&self, did: &str, label: Option<String>) -> Option<TheirEndpoint> {
        let verkey = self.verkey()?;
        let endpoint = self.endpoint()?;

        Some(TheirEndpoint {
            did: Some(did.to_string()),
            verkey: verkey.to_string(),
            endpoint: endpoint.to_string(),
            routing_keys: self.routing_keys(),
            label,
        })
    }
}
