//! A bichannel transport: every connection pairs a TCP stream for reliable messages with a UDP
//!  association for unreliable messages.
//!
//! ## Handshake
//!
//! The server binds a client's UDP endpoint to an accepted TCP stream without the client
//!  announcing its UDP endpoint up front:
//!
//! ```ascii
//! client                                        server
//!   | ---- TCP connect ----------------------------> |  accept, generate token, start expiry
//!   | <--- TCP: [version: u8][token: i64] ---------- |
//!   | ---- UDP: the same 9 bytes -------------------> |  source endpoint := connection's UDP endpoint
//!   | <--- UDP: [token: i64][0u8; 4] --------------- |  connection established
//! ```
//!
//! A pending handshake that does not complete within the configured timeout (default 5s) is
//!  closed on the server. The client waits for each of the server's messages with the same
//!  timeout.
//!
//! ## Framing
//!
//! TCP frames are a 4 byte big-endian length followed by the body, a message as described in
//!  the `wire` crate. UDP datagrams hold a message body without a length. A server strikes
//!  (disconnects) a peer that declares a body length at or above its configured maximum.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod rtt;
pub mod server;

pub use config::{ClientConfig, ListenerConfig, ListenerStrategy};
pub use connection::state::ConnectionState;
pub use connection::stats::ConnectionStats;
pub use connection::{BichannelConnection, ConnectionAcceptor, ConnectionHandler};
pub use error::{ConnectionError, SocketError};
pub use server::listener::BichannelListener;
