//! Shared protocol definitions for the `chatsync` wire format.
//!
//! Frames are JSON text. Inbound frames are resolved once, at the parse
//! boundary, into the [`envelope::Inbound`] tagged union; outbound frames are
//! built as [`envelope::OutboundEnvelope`] or [`envelope::IdentityAnnouncement`].

pub mod channel;
pub mod codec;
pub mod command;
pub mod envelope;
pub mod identity;
pub mod message;
pub mod time;
