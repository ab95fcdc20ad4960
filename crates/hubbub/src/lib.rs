//! A small multi-user chat server speaking a CRLF-delimited ASCII protocol
//! over a single TCP port. One thread, one poll loop, bounded memory: all
//! outbound data lives in a fixed pool of 173-byte blocks and every client
//! socket is multiplexed through the same `mio::Poll`.

mod clock;
mod conn;
mod error;
mod framer;
mod history;
mod outbox;
mod pool;
mod proto;
mod server;

pub use clock::{Clock, Stamp};
pub use error::FatalError;
pub use server::Server;

/// Widest rendered timestamp, `[HH:MM:SS] ` included.
pub const TIMESTAMP_LEN: usize = 10;
/// Longest accepted nickname, in bytes.
pub const NICK_MAX: usize = 20;
/// Longest accepted message body, in bytes.
pub const MSG_MAX: usize = 140;
/// Upper bound on any line in either direction: a fully rendered history
/// entry plus separators.
pub const MAX_LINE: usize = TIMESTAMP_LEN + NICK_MAX + MSG_MAX + 3;
/// Number of outbound blocks shared by all connections.
pub const POOL_SIZE: usize = 16;
/// Entries retained in the rolling message history.
pub const HISTORY_MAX: usize = 50;
/// Listener slot plus the maximum number of simultaneous peers.
pub const MAX_CONN: usize = 1024;
