use std::collections::HashMap;

use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::messaging::decorators::ThreadDecorator;

/// Identifier of a conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct ThreadId(String);

impl ThreadId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// `ThreadContext` is the ordering state of a thread based conversation
///
/// `sender_order` is the order of the next outgoing message, it starts at zero and
/// never decreases. `received_orders` keeps, per counterpart, the highest order seen.
/// It is a watermark only: replies are never reordered nor dropped
#[derive(Debug, Clone)]
pub struct ThreadContext {
    thid: ThreadId,
    pthid: Option<String>,
    sender_order: u64,
    received_orders: HashMap<String, u64>,
}

impl ThreadContext {
    pub fn new(thid: ThreadId, pthid: Option<String>) -> Self {
        Self {
            thid,
            pthid,
            sender_order: 0,
            received_orders: HashMap::new(),
        }
    }

    pub fn thid(&self) -> &ThreadId {
        &self.thid
    }

    pub fn pthid(&self) -> Option<&str> {
        self.pthid.as_deref()
    }

    pub fn sender_order(&self) -> u64 {
        self.sender_order
    }

    pub fn received_orders(&self) -> &HashMap<String, u64> {
        &self.received_orders
    }

    /// Builds the decorator of the next outgoing message and advances `sender_order`
    pub fn next_decorator(&mut self) -> ThreadDecorator {
        let decorator = ThreadDecorator {
            thid: Some(self.thid.as_str().to_string()),
            pthid: self.pthid.clone(),
            sender_order: Some(self.sender_order),
            received_orders: Some(self.received_orders.clone()),
        };

        self.sender_order += 1;
        decorator
    }

    /// Records the order carried by a counterpart reply, returns the watermark after update
    pub fn observe(&mut self, counterpart: &str, decorator: &ThreadDecorator) -> Option<u64> {
        let incoming = decorator.sender_order?;
        let watermark = self
            .received_orders
            .entry(counterpart.to_string())
            .or_insert(incoming);

        if incoming > *watermark {
            *watermark = incoming;
        }

        Some(*watermark)
    }
}
