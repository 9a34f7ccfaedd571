use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Map, Value};

use super::types::RpcError;

pub const MIME_BASE64: &str = "application/base64";

/// `EncodedParam` is the wire shape of one call parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct EncodedParam {
    pub mime_type: Option<String>,
    pub payload: Value,
}

/// `Param` is one typed call parameter
///
/// The tag tells the remote side how to rebuild the value: plain JSON is passed as is,
/// raw bytes travel as base64 and typed objects (options, enums) carry their type name
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Plain(Value),
    Bytes(Vec<u8>),
    Typed { type_name: String, value: Value },
}

impl Param {
    pub fn encode(&self) -> EncodedParam {
        match self {
            Param::Plain(value) => EncodedParam {
                mime_type: None,
                payload: value.clone(),
            },
            Param::Bytes(bytes) => EncodedParam {
                mime_type: Some(MIME_BASE64.to_string()),
                payload: Value::String(STANDARD.encode(bytes)),
            },
            Param::Typed { type_name, value } => EncodedParam {
                mime_type: Some(type_name.clone()),
                payload: value.clone(),
            },
        }
    }

    pub fn decode(encoded: EncodedParam) -> Result<Self, RpcError> {
        match encoded.mime_type.as_deref() {
            None => Ok(Param::Plain(encoded.payload)),
            Some(MIME_BASE64) => {
                let raw = encoded.payload.as_str().ok_or_else(|| {
                    RpcError::InvalidPayload("base64 parameter is not a string".to_string())
                })?;

                STANDARD
                    .decode(raw)
                    .map(Param::Bytes)
                    .map_err(|err| RpcError::InvalidPayload(err.to_string()))
            }
            Some(type_name) => Ok(Param::Typed {
                type_name: type_name.to_string(),
                value: encoded.payload,
            }),
        }
    }
}

/// `Params` is the ordered, named parameter set of one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(mut self, name: &str, value: Value) -> Self {
        self.entries.push((name.to_string(), Param::Plain(value)));
        self
    }

    pub fn bytes(mut self, name: &str, value: Vec<u8>) -> Self {
        self.entries.push((name.to_string(), Param::Bytes(value)));
        self
    }

    pub fn typed(mut self, name: &str, type_name: &str, value: Value) -> Self {
        self.entries.push((
            name.to_string(),
            Param::Typed {
                type_name: type_name.to_string(),
                value,
            },
        ));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, param)| param)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Result<Value, RpcError> {
        let mut encoded = Map::new();
        for (name, param) in &self.entries {
            let value = serde_json::to_value(param.encode())
                .map_err(|err| RpcError::InvalidPayload(err.to_string()))?;
            encoded.insert(name.clone(), value);
        }

        Ok(Value::Object(encoded))
    }

    pub fn decode(value: &Value) -> Result<Self, RpcError> {
        let object = value
            .as_object()
            .ok_or_else(|| RpcError::InvalidPayload("params must be an object".to_string()))?;

        let mut params = Params::new();
        for (name, raw) in object {
            let encoded: EncodedParam = serde_json::from_value(raw.clone())
                .map_err(|err| RpcError::InvalidPayload(err.to_string()))?;
            params.entries.push((name.clone(), Param::decode(encoded)?));
        }

        Ok(params)
    }
}
