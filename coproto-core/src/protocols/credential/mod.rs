//! `credential` implements the `issue-credential/1.1` protocol
//!
//! The [`Issuer`] offers a credential, the [`Holder`] requests it and stores the issued
//! credential, then acknowledges it
pub mod messages;
pub use messages::{
    register, CredentialMessage, CredentialPreview, IssueCredential, OfferCredential,
    PreviewAttribute, RequestCredential, FAMILY,
};

mod holder;
pub use holder::Holder;

mod issuer;
pub use issuer::{IssueParams, Issuer};

pub const OFFER_PROCESSING_ERROR: &str = "offer_processing_error";
pub const REQUEST_NOT_ACCEPTED: &str = "request_not_accepted";
