//! `pairwise` holds the established relationship between two parties
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;

/// `Me` is this side of a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Me {
    pub did: String,
    pub verkey: String,
}

impl Me {
    pub fn new(did: &str, verkey: &str) -> Self {
        Self {
            did: did.to_string(),
            verkey: verkey.to_string(),
        }
    }
}

/// `TheirEndpoint` is the counterpart of a relationship: its keys and where to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct TheirEndpoint {
    pub did: Option<String>,
    pub verkey: String,
    pub endpoint: String,

    #[serde(default)]
    pub routing_keys: Vec<String>,

    #[serde(default)]
    pub label: Option<String>,
}

impl TheirEndpoint {
    pub fn new(verkey: &str, endpoint: &str) -> Self {
        Self {
            did: None,
            verkey: verkey.to_string(),
            endpoint: endpoint.to_string(),
            routing_keys: Vec::new(),
            label: None,
        }
    }

    /// `counterpart` is the key used to identify the counterpart in ordering
    /// bookkeeping: its DID when known, its verkey otherwise
    pub fn counterpart(&self) -> String {
        self.did.clone().unwrap_or_else(|| self.verkey.clone())
    }
}

/// `Pairwise` is an established relationship, usually the result of the connection protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Pairwise {
    pub me: Me,
    pub their: TheirEndpoint,

    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Pairwise {
    pub fn new(me: Me, their: TheirEndpoint) -> Self {
        Self {
            me,
            their,
            metadata: None,
        }
    }
}
