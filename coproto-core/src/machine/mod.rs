//! `machine` is the generic protocol state machine pattern shared by every role
//!
//! A role owns a [`Conversation`] bound to a [`crate::coprotocol::CoProtocol`] transport.
//! It alternates turns, classifies each reply into its own tagged union and finishes with
//! an [`Outcome`]: the success value or the [`crate::messaging::ProblemReport`] which
//! terminated the run
pub mod types;
pub use types::{Classified, Outcome, Role, StateMachine, StateMachineError, Step};

mod conversation;
pub use conversation::Conversation;
