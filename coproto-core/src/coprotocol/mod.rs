//! `coprotocol` defines the conversation contract shared by every protocol role
//!
//! The [`CoProtocol`] trait is implemented by the remote transports at `prople-coproto-rpc`
//! and by the in-process [`MemoryCoProtocol`]. The state each transport owns exclusively
//! is modeled here too:
//!
//! - [`Deadline`], the conversation `die_timestamp`
//! - [`CancelToken`], cooperative cancellation checked at blocking boundaries
//! - [`AckRegistry`], the outstanding acknowledgement interests
//! - [`ThreadContext`], the thread ordering bookkeeping
pub mod types;
pub use types::{
    CoProtocol, ConversationIdentity, Delivered, Event, Received, Switched, TransportError,
};

mod ack;
pub use ack::AckRegistry;

mod cancel;
pub use cancel::CancelToken;

mod deadline;
pub use deadline::{Deadline, Remaining};

mod memory;
pub use memory::MemoryCoProtocol;

mod thread;
pub use thread::{ThreadContext, ThreadId};
