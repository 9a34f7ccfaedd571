use std::collections::HashMap;

use rst_common::standard::serde::{self, Deserialize, Serialize};

/// `ThreadDecorator` is the `~thread` decorator used to correlate and order
/// messages within one coprotocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ThreadDecorator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_order: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_orders: Option<HashMap<String, u64>>,
}

impl ThreadDecorator {
    pub fn with_thid(thid: impl Into<String>) -> Self {
        Self {
            thid: Some(thid.into()),
            ..Default::default()
        }
    }
}

/// `PleaseAck` is the `~please_ack` decorator, used to request an explicit
/// acknowledgement of a specific message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct PleaseAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default)]
    pub on: Vec<String>,
}

impl PleaseAck {
    pub fn on_receipt() -> Self {
        Self {
            message_id: None,
            on: vec!["RECEIPT".to_string()],
        }
    }
}
