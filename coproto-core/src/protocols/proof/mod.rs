//! `proof` implements the `present-proof/1.1` protocol
//!
//! The [`Verifier`] requests a presentation and verifies it, the [`Prover`] builds the
//! proof from its stored credentials
pub mod messages;
pub use messages::{register, Presentation, ProofMessage, RequestPresentation, FAMILY};

mod prover;
pub use prover::Prover;

mod verifier;
pub use verifier::Verifier;

pub const RESPONSE_PROCESSING_ERROR: &str = "response_processing_error";
pub const REQUEST_NOT_ACCEPTED: &str = "request_not_accepted";
pub const VERIFY_ERROR: &str = "verify_error";
