//! `chatsync`: client engine for a realtime channel chat.
//!
//! Keeps one websocket connection alive across drops, dispatches the
//! server's typed envelopes into local session state, and reconciles the
//! channel roster against server pushes.

pub mod api;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod encoder;
pub mod endpoint;
pub mod engine;
pub mod render;
pub mod session;
pub mod supervisor;
pub mod transport;
