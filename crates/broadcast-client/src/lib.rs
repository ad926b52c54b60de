//! Tokio UDP client for the Assetto Corsa Competizione broadcasting
//! protocol.
//!
//! Wraps the I/O-free [`acc_broadcast_protocol::ClientSession`] with a UDP
//! transport, registration retries and an event channel.

#![deny(static_mut_refs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod runner;
pub mod transport;

pub use config::{ClientConfig, DEFAULT_BROADCAST_PORT};
pub use error::ClientError;
pub use runner::{BroadcastHandle, BroadcastRunner, ClientEvent, spawn};
pub use transport::{DatagramTransport, MAX_DATAGRAM_SIZE, UdpTransport};
