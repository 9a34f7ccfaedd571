//! `transport` turns the router calls into the [`CoProtocol`] conversation contract
//!
//! One [`CoProtocolTransport`] drives one conversation. The [`Binding`] it is built with
//! decides how the remote router is told which incoming messages belong to it: by the
//! verkey pair of the two parties ([`P2PBinding`], built from an endpoint or from an
//! established pairwise) or by an explicit thread id ([`ThreadBinding`])
//!
//! [`CoProtocol`]: prople_coproto_core::coprotocol::CoProtocol
pub mod types;
pub use types::{Binding, TransportOptions};

mod binding;
pub use binding::{P2PBinding, ThreadBinding};

mod transport;
pub use transport::{guarded, CoProtocolTransport};
