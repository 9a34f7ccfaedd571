//! `prople-coproto-core` contains the domain abstractions used to run `DIDComm` coprotocols
//!
//! A coprotocol is one logical, bounded and turn-based conversation between two parties.
//! This crate doesn't know anything about the physical connection to the remote agent, it
//! only defines:
//!
//! - `messaging`, the message model, its decorators and the problem report
//! - `coprotocol`, the conversation contract ([`coprotocol::CoProtocol`]) and its shared state:
//!   deadlines, cancellation, acknowledgement bookkeeping and thread ordering
//! - `machine`, the generic protocol state machine pattern
//! - `protocols`, the concrete roles: connection, credential issuance and proof presentation
//! - `wallet`, the external wallet collaborators consumed by the protocol roles
//!
//! The transport-facing implementation lives at `prople-coproto-rpc`
pub mod coprotocol;
pub mod machine;
pub mod messaging;
pub mod pairwise;
pub mod protocols;
pub mod wallet;
