//! `wallet` defines the external wallet, ledger and anoncreds collaborators consumed by the
//! protocol roles
//!
//! The operations themselves (signatures, credential math, proof verification) are not
//! implemented here. They are provided by a remote agent, `prople-coproto-rpc` exposes an
//! implementation reachable through the same RPC dispatcher used by the transports
pub mod types;
pub use types::{AnonCredsApi, CredentialRequest, CryptoApi, SignedField, WalletError};
