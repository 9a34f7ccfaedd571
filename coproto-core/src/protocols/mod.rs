//! `protocols` contains the concrete protocol roles built on top of [`crate::machine`]
//!
//! Each protocol family lives in its own module and exposes:
//!
//! - its message payloads and the tagged union of its messages
//! - a `register` function used to populate a [`MessageRegistry`]
//! - its roles, the leader one and the follower one
//!
//! Supported families:
//!
//! - `connections/1.0`: [`connection::Inviter`] and [`connection::Invitee`]
//! - `issue-credential/1.1`: [`credential::Issuer`] and [`credential::Holder`]
//! - `present-proof/1.1`: [`proof::Verifier`] and [`proof::Prover`]
//! - `notification/1.0` and `trust_ping/1.0` as supporting messages
pub mod attachment;
pub mod connection;
pub mod credential;
pub mod notification;
pub mod ping;
pub mod proof;
pub mod registry;

pub use registry::{Inbound, MessageRegistry};

#[cfg(test)]
pub(crate) mod testing;
