//! WebSocket feed of sync results.
//!
//! The application's data layer connects once and is pushed a
//! `sync_complete` message after every pass, instead of polling the status
//! endpoint. It can also ask for status or trigger a pass over the socket.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
