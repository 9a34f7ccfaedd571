//! `connection` implements the `connections/1.0` protocol
//!
//! The [`Inviter`] publishes an [`Invitation`] out of band and answers the connection
//! request of the [`Invitee`] with its signed connection details. Both sides end with a
//! [`crate::pairwise::Pairwise`]
pub mod diddoc;
pub mod messages;

pub use diddoc::DidDoc;
pub use messages::{
    register, ConnectionInfo, ConnectionMessage, ConnectionRequest, ConnectionResponse,
    Invitation, FAMILY,
};

mod invitee;
pub use invitee::Invitee;

mod inviter;
pub use inviter::Inviter;

pub const REQUEST_PROCESSING_ERROR: &str = "request_processing_error";
pub const REQUEST_NOT_ACCEPTED: &str = "request_not_accepted";
pub const RESPONSE_NOT_ACCEPTED: &str = "response_not_accepted";
pub const RESPONSE_PROCESSING_ERROR: &str = "response_processing_error";
