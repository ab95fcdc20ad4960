use std::{
    io,
    net::{Shutdown, SocketAddr},
};

use mio::{Interest, Registry, Token, net::TcpStream};
use tracing::debug;

use crate::{
    MAX_CONN,
    clock::Stamp,
    framer::LineFramer,
    history::Nick,
    outbox::Outbox,
    pool::BlockPool,
};

/// Token of the listening socket. Peer tokens start at 1 and equal their
/// table slot plus one.
pub const LISTENER: Token = Token(0);

const DEFAULT_NICK: &[u8] = b"anonym";

#[inline]
pub fn token_of(slot: usize) -> Token {
    Token(slot + 1)
}

#[inline]
pub fn slot_of(token: Token) -> usize {
    token.0 - 1
}

/// Everything the server tracks for one peer socket.
pub struct Connection {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub closed: bool,
    pub nick: Nick,
    /// Monotonic stamp of the client's last `new`; history entries at or
    /// before it count as seen.
    pub cursor: Stamp,
    pub framer: LineFramer,
    pub outbox: Outbox,
    interest: Interest,
}

impl Connection {
    fn new(stream: TcpStream, peer_addr: SocketAddr, cursor: Stamp) -> Self {
        Self {
            stream,
            peer_addr,
            closed: false,
            nick: Nick::try_from(DEFAULT_NICK).expect("default nick fits"),
            cursor,
            framer: LineFramer::new(),
            outbox: Outbox::new(),
            interest: Interest::READABLE,
        }
    }

    /// Re-registers only on an actual flip; a connection is interested in
    /// reads or writes, never both.
    pub fn set_interest(
        &mut self,
        registry: &Registry,
        token: Token,
        want: Interest,
    ) -> io::Result<()> {
        if self.interest != want {
            registry.reregister(&mut self.stream, token, want)?;
            self.interest = want;
        }
        Ok(())
    }

    fn teardown(mut self, registry: &Registry, pool: &mut BlockPool) {
        self.outbox.clear(pool);
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(Shutdown::Both);
        debug!(peer_addr = ?self.peer_addr, "connection closed");
    }
}

/// Dense table of live peers in accept order. Slots shift down when
/// closed connections are compacted away, and a shifted survivor is
/// re-registered under its new token so event dispatch stays by index.
pub struct ConnTable {
    peers: Vec<Connection>,
}

impl ConnTable {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    #[inline]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Listener slot included, like the poll table it mirrors.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.peers.len() + 1 >= MAX_CONN
    }

    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Connection> {
        self.peers.get_mut(slot)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.peers.iter()
    }

    /// Registers a freshly accepted stream and appends its record.
    pub fn accept_one(
        &mut self,
        registry: &Registry,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        cursor: Stamp,
    ) -> io::Result<Token> {
        let token = token_of(self.peers.len());
        stream.set_nodelay(true)?;
        registry.register(&mut stream, token, Interest::READABLE)?;
        self.peers.push(Connection::new(stream, peer_addr, cursor));
        Ok(token)
    }

    /// Removes closed slots in place, preserving the relative order of
    /// survivors. Runs once per loop iteration, after dispatch, so no
    /// token handed out by the current poll round dangles mid-turn.
    pub fn compact(&mut self, registry: &Registry, pool: &mut BlockPool) {
        if self.peers.iter().all(|conn| !conn.closed) {
            return;
        }

        let peers = std::mem::take(&mut self.peers);
        for (old_slot, mut conn) in peers.into_iter().enumerate() {
            if conn.closed {
                conn.teardown(registry, pool);
                continue;
            }
            let new_slot = self.peers.len();
            if new_slot != old_slot {
                if let Err(err) =
                    registry.reregister(&mut conn.stream, token_of(new_slot), conn.interest)
                {
                    debug!(?err, "reregister after compaction failed");
                    conn.teardown(registry, pool);
                    continue;
                }
            }
            self.peers.push(conn);
        }
    }
}

impl Default for ConnTable {
    fn default() -> Self {
        Self::new()
    }
}
