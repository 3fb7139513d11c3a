//! # stream
//!
//! Everything between the remote price feed and the dispatcher: the
//! transport seam, frame decoding and the reconnecting state machine.

pub mod connection;
pub mod feed;
pub mod transport;

pub use connection::{ConnectionHandle, ReconnectPolicy, StreamConfig, StreamConnection};
pub use transport::{Transport, WsTransport};
