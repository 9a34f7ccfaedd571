//! `messaging` provides the raw `DIDComm` message model
//!
//! A [`Message`] is a JSON object carrying `@id`, `@type` and decorators (`~thread`,
//! `~please_ack`). The typed payloads of each protocol are decoded from it by the
//! message registry at [`crate::protocols::registry`]
pub mod decorators;
pub mod types;

mod message;
pub use message::Message;

mod problem;
pub use problem::{ProblemReport, PROBLEM_REPORT};
