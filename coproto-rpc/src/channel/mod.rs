//! `channel` owns the physical connection to the remote agent
//!
//! One [`Connector`] opens a [`Link`], the [`Multiplexer`] reads every incoming frame
//! from it and routes the frame to the subscriber of its address. An [`AddressedTunnel`]
//! is one logical sub-channel: every frame it writes is tagged with its address and every
//! frame it reads was routed to it
pub mod types;
pub use types::{ChannelError, Connector, Frame, Link, Packer, PROTECTED_FIELD};

mod memory;
pub use memory::{memory_connector, MemoryConnector, MemoryListener};

mod multiplexer;
pub use multiplexer::Multiplexer;

mod tunnel;
pub use tunnel::AddressedTunnel;
