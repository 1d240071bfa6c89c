//! Mutually-authenticated, forward-secret framed byte stream used for group
//! synchronization between nodes.
//!
//! [`handshake::client_handshake`]/[`handshake::server_handshake`] run the
//! single-round-trip `hello`/`welcome` exchange and produce a
//! [`session::SecureSession`] with independently keyed send/receive
//! directions; every record after that is a strictly-ordered, replay-resistant
//! ChaCha20-Poly1305 envelope.

#![warn(missing_docs)]

pub mod error;
pub mod framing;
pub mod handshake;
pub mod messages;
pub mod session;

pub use error::ChannelError;
pub use framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
pub use handshake::{client_handshake, server_handshake};
pub use messages::PROTOCOL_TAG;
pub use session::SecureSession;
